//! Staged construction of a [`SimEnvironment`].
use super::{EnvState, Ownership, SimEnvironment, ENVIRONMENT_CONTROLLER};
use crate::{
    base::{Environment, InstanceIds, Parameters},
    pipeline::NoPipeline,
    scene::{ControllerRole, Engine, Event, Node, SceneObject, StepEngine},
    BridgeError,
};
use log::{debug, info};

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Entry point of the lifecycle of an environment.
///
/// Each stage consumes the previous one, so lifecycle calls cannot be
/// reordered:
///
/// ```mermaid
/// graph LR
///     A[EnvironmentBuilder]-->|root|B[Rooted]
///     B -->|build|C[Constructed]
///     C -->|recv_parameters|C
///     C -->|create|D[Created]
///     D -->|init|E[SimEnvironment]
/// ```
///
/// The root node is given before the environment is built, and the
/// environment registers itself as a controller of that root exactly once.
#[derive(Debug, Clone)]
pub struct EnvironmentBuilder {
    ids: InstanceIds,
    ownership: Ownership,
    simulations_per_step: usize,
}

impl EnvironmentBuilder {
    /// Starts the lifecycle of an environment.
    pub fn new(ids: InstanceIds, ownership: Ownership) -> Self {
        Self {
            ids,
            ownership,
            simulations_per_step: 1,
        }
    }

    /// Sets the number of animation steps computed by each environment step.
    pub fn simulations_per_step(mut self, v: usize) -> Self {
        self.simulations_per_step = v.max(1);
        self
    }

    /// Sets the root node of the scene graph.
    pub fn root(self, root: Node) -> Rooted {
        Rooted {
            builder: self,
            root,
        }
    }
}

/// The root node is set; the environment can be built.
#[derive(Debug)]
pub struct Rooted {
    builder: EnvironmentBuilder,
    root: Node,
}

impl Rooted {
    /// Builds the environment on a [`StepEngine`].
    pub fn build<E: Environment>(
        self,
        config: &E::Config,
    ) -> Result<Constructed<E, StepEngine>, BridgeError> {
        self.build_with_engine(config, StepEngine::default())
    }

    /// Builds the environment and attaches it to the root node.
    pub fn build_with_engine<E: Environment, G: Engine>(
        self,
        config: &E::Config,
        engine: G,
    ) -> Result<Constructed<E, G>, BridgeError> {
        let Self { builder, mut root } = self;
        if root.count_controller(ControllerRole::Environment) != 0 {
            return Err(BridgeError::Configuration(format!(
                "root node '{}' already holds an environment",
                root.name()
            )));
        }

        let env = E::build(config, builder.ids).map_err(|e| {
            BridgeError::Configuration(format!("cannot build environment: {:#}", e))
        })?;
        root.add_object(SceneObject::controller(
            ENVIRONMENT_CONTROLLER,
            ControllerRole::Environment,
        ))
        .map_err(|e| BridgeError::Configuration(e.to_string()))?;
        debug!("Built environment {}/{}", builder.ids.instance_id, builder.ids.instance_nb);

        Ok(Constructed {
            builder,
            state: EnvState::new(env, root),
            engine,
        })
    }
}

/// The environment is built and attached to its root node.
pub struct Constructed<E: Environment, G: Engine = StepEngine> {
    builder: EnvironmentBuilder,
    state: EnvState<E>,
    engine: G,
}

impl<E: Environment, G: Engine> Constructed<E, G> {
    /// Passes parameters to the environment.
    pub fn recv_parameters(mut self, params: &Parameters) -> Result<Self, BridgeError> {
        self.state
            .env
            .recv_parameters(params)
            .map_err(BridgeError::Runtime)?;
        Ok(self)
    }

    /// The environment.
    pub fn env(&self) -> &E {
        &self.state.env
    }

    /// The root node.
    pub fn root(&self) -> &Node {
        &self.state.root
    }

    /// Creates the scene graph.
    pub fn create(mut self) -> Result<Created<E, G>, BridgeError> {
        let EnvState { env, root, .. } = &mut self.state;
        env.create(root).map_err(BridgeError::Runtime)?;
        Ok(Created {
            builder: self.builder,
            state: self.state,
            engine: self.engine,
        })
    }
}

/// The scene graph is created; the engine can initialize it.
pub struct Created<E: Environment, G: Engine = StepEngine> {
    builder: EnvironmentBuilder,
    state: EnvState<E>,
    engine: G,
}

impl<E: Environment, G: Engine> Created<E, G> {
    /// The environment.
    pub fn env(&self) -> &E {
        &self.state.env
    }

    /// The root node.
    pub fn root(&self) -> &Node {
        &self.state.root
    }

    /// Initializes the scene graph and delivers [`Event::SimulationInitDone`].
    pub fn init(mut self) -> Result<SimEnvironment<E, G>, BridgeError> {
        self.engine
            .init(&mut self.state.root)
            .map_err(BridgeError::Runtime)?;
        self.state
            .dispatch(Event::SimulationInitDone, &mut NoPipeline)?;
        info!(
            "Initialized environment {}/{}",
            self.builder.ids.instance_id, self.builder.ids.instance_nb
        );

        Ok(SimEnvironment::new(
            self.state,
            self.engine,
            self.builder.ids,
            self.builder.ownership,
            self.builder.simulations_per_step,
        ))
    }
}
