//! Steppable environment.
use super::{EnvState, Ownership, Position, ENVIRONMENT_CONTROLLER};
use crate::{
    base::{Environment, InstanceIds, Parameters, Prediction, Sample, SampleBuffer},
    pipeline::{Controller, Network, NoPipeline},
    scene::{ControllerRole, Engine, Event, Node, SceneObject, StepEngine},
    BridgeError, VisualFactory, VisualUpdate,
};
use log::{info, trace};
use ndarray::ArrayD;

/// An initialized environment, bound to its scene graph and engine.
///
/// Obtained from [`EnvironmentBuilder`](crate::EnvironmentBuilder). A step
/// computes `simulations_per_step` animations, each delivering
/// [`Event::AnimateBegin`] and [`Event::AnimateEnd`] to the controllers of the
/// root node, and then awaits [`Environment::on_step`]. The animations always
/// complete before the hook starts.
pub struct SimEnvironment<E: Environment, G: Engine = StepEngine> {
    state: EnvState<E>,
    engine: G,
    ids: InstanceIds,
    ownership: Ownership,
    simulations_per_step: usize,
    factory: Option<VisualFactory>,
    parameters: Parameters,
    closed: bool,
}

impl<E: Environment, G: Engine> SimEnvironment<E, G> {
    pub(super) fn new(
        state: EnvState<E>,
        engine: G,
        ids: InstanceIds,
        ownership: Ownership,
        simulations_per_step: usize,
    ) -> Self {
        Self {
            state,
            engine,
            ids,
            ownership,
            simulations_per_step,
            factory: None,
            parameters: Parameters::new(),
            closed: false,
        }
    }

    /// Instance ids.
    pub fn ids(&self) -> InstanceIds {
        self.ids
    }

    /// Owner of the environment.
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// The user environment.
    pub fn env(&self) -> &E {
        &self.state.env
    }

    /// The user environment.
    pub fn env_mut(&mut self) -> &mut E {
        &mut self.state.env
    }

    /// Root node of the scene graph.
    pub fn root(&self) -> &Node {
        &self.state.root
    }

    /// Data buffers.
    pub fn buffer(&self) -> &SampleBuffer {
        &self.state.buffer
    }

    /// Environment, scene graph and buffers.
    pub fn state_mut(&mut self) -> &mut EnvState<E> {
        &mut self.state
    }

    /// The engine.
    pub fn engine(&self) -> &G {
        &self.engine
    }

    /// Number of animations per step.
    pub fn simulations_per_step(&self) -> usize {
        self.simulations_per_step
    }

    /// Returns `true` once [`SimEnvironment::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Lets the environment declare its dataset fields.
    pub fn init_database(&mut self) -> Result<(), BridgeError> {
        self.state
            .env
            .init_database(&mut self.state.fields)
            .map_err(BridgeError::Runtime)
    }

    /// Lets the environment declare its visual objects in `factory`.
    pub fn init_visualization(&mut self, mut factory: VisualFactory) -> Result<(), BridgeError> {
        self.state
            .env
            .init_visualization(&mut factory)
            .map_err(BridgeError::Runtime)?;
        self.factory = Some(factory);
        Ok(())
    }

    /// The visualization factory, if visualization was initialized.
    pub fn visualization(&self) -> Option<&VisualFactory> {
        self.factory.as_ref()
    }

    /// Removes and returns the visualization updates stored so far.
    ///
    /// Empty if visualization was not initialized or does not store updates.
    pub fn take_visual_frames(&mut self) -> Vec<Vec<VisualUpdate>> {
        self.factory
            .as_mut()
            .map(VisualFactory::take_frames)
            .unwrap_or_default()
    }

    /// Reads the declared visual objects from the scene graph.
    pub fn update_visualization(&mut self) -> Result<Vec<VisualUpdate>, BridgeError> {
        let factory = self.factory.as_mut().ok_or_else(|| {
            BridgeError::Lifecycle("visualization is not initialized".to_string())
        })?;
        factory
            .render(&self.state.root)
            .map_err(BridgeError::Runtime)
    }

    /// Stores a set of parameters.
    pub fn save_parameters(&mut self, params: Parameters) {
        self.parameters.extend(params);
    }

    /// Returns the stored parameters.
    pub fn load_parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Parameters the environment sends back to the manager.
    pub fn send_parameters(&self) -> Parameters {
        self.state.env.send_parameters()
    }

    /// Places a pipeline controller relative to the environment controller.
    ///
    /// At most one pipeline can be attached.
    pub fn attach(&mut self, name: &str, position: Position) -> Result<(), BridgeError> {
        let root = &mut self.state.root;
        if root.count_controller(ControllerRole::Pipeline) != 0 {
            return Err(BridgeError::Configuration(
                "a pipeline is already attached to the environment".to_string(),
            ));
        }
        let env_ix = root
            .objects()
            .iter()
            .position(|o| o.name() == ENVIRONMENT_CONTROLLER)
            .ok_or_else(|| BridgeError::Lifecycle("environment is detached".to_string()))?;
        let ix = match position {
            Position::Before => env_ix,
            Position::After => env_ix + 1,
        };
        root.insert_object(ix, SceneObject::controller(name, ControllerRole::Pipeline))
            .map_err(|e| BridgeError::Configuration(e.to_string()))?;
        info!("Attached pipeline '{}' {:?} the environment", name, position);
        Ok(())
    }

    /// Removes a pipeline controller. Returns `false` if it was not attached.
    pub fn detach(&mut self, name: &str) -> bool {
        match self.state.root.object(name).and_then(|o| o.role()) {
            Some(ControllerRole::Pipeline) => self.state.root.remove_object(name).is_some(),
            _ => false,
        }
    }

    /// Computes one animation step.
    pub fn animate(&mut self) -> Result<(), BridgeError> {
        self.animate_with(&mut NoPipeline)
    }

    /// Computes one animation step, delivering pipeline events to `pipeline`.
    pub fn animate_with<C: Controller<E>>(&mut self, pipeline: &mut C) -> Result<(), BridgeError> {
        self.check_open()?;
        self.state.dispatch(Event::AnimateBegin, pipeline)?;
        let dt = self.state.root.dt();
        self.engine
            .animate(&mut self.state.root, dt)
            .map_err(BridgeError::Runtime)?;
        self.state.dispatch(Event::AnimateEnd, pipeline)?;
        trace!(
            "Instance {} animated to t = {}",
            self.ids.instance_id,
            self.state.root.time()
        );
        Ok(())
    }

    /// Computes `simulations_per_step` animations, then runs the post-step hook.
    pub async fn step(&mut self) -> Result<(), BridgeError> {
        self.step_with(&mut NoPipeline).await
    }

    /// Same as [`SimEnvironment::step`], delivering pipeline events to `pipeline`.
    pub async fn step_with<C: Controller<E>>(
        &mut self,
        pipeline: &mut C,
    ) -> Result<(), BridgeError> {
        for _ in 0..self.simulations_per_step {
            self.animate_with(pipeline)?;
        }
        let (env, ctx) = self.state.split();
        env.on_step(ctx).await.map_err(BridgeError::Runtime)
    }

    /// Sets the network answering [`StepContext::get_prediction`] requests.
    ///
    /// [`StepContext::get_prediction`]: crate::StepContext::get_prediction
    pub fn set_network<N: Network + 'static>(&mut self, network: N) {
        self.state.network = Some(Box::new(network));
    }

    /// Requests a prediction of the network for `input`.
    pub fn get_prediction(&mut self, input: &ArrayD<f32>) -> Result<Prediction, BridgeError> {
        let (_, mut ctx) = self.state.split();
        ctx.get_prediction(input).map_err(BridgeError::Runtime)
    }

    /// Sets the network input and the ground truth of the current sample.
    pub fn set_training_data(&mut self, input: ArrayD<f32>, ground_truth: ArrayD<f32>) {
        self.state.buffer.set_training_data(input, ground_truth);
    }

    /// Sets additional data of the current sample.
    pub fn set_additional_data(&mut self, name: &str, data: ArrayD<f32>) -> Result<(), BridgeError> {
        let (_, mut ctx) = self.state.split();
        ctx.set_additional_data(name, data)
            .map_err(|e| BridgeError::Configuration(e.to_string()))
    }

    /// Returns `true` if the current data can be used for training.
    pub fn check_sample(&self) -> bool {
        self.state.env.check_sample(&self.state.buffer)
    }

    /// The current sample.
    pub fn sample(&self) -> Sample {
        self.state.buffer.to_sample()
    }

    /// Applies a network prediction to the scene.
    pub fn apply_prediction(&mut self, prediction: &Prediction) -> Result<(), BridgeError> {
        self.state
            .apply_prediction(prediction)
            .map_err(BridgeError::Runtime)
    }

    /// Closes the environment. Further steps fail.
    pub fn close(&mut self) -> Result<(), BridgeError> {
        self.check_open()?;
        self.closed = true;
        info!("Closing environment {}", self.ids.instance_id);
        self.state.env.close().map_err(BridgeError::Runtime)
    }

    fn check_open(&self) -> Result<(), BridgeError> {
        if self.closed {
            Err(BridgeError::Lifecycle(format!(
                "environment {} is closed",
                self.ids.instance_id
            )))
        } else {
            Ok(())
        }
    }
}
