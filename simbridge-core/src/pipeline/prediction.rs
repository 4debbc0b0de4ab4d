use super::{runner::Cycle, RunManager};
use crate::{
    base::Environment,
    scene::{Engine, StepEngine},
    BridgeError, EnvironmentConfig, Position, SimEnvironment,
};
use log::info;

/// Name of the prediction controller in the root node.
const PREDICTION: &str = "prediction";

/// Runs predictions on an environment, optionally replaying dataset samples.
///
/// With `load_samples`, the pipeline is placed before the environment and
/// loads a dataset sample into the environment buffers at the beginning of
/// each animation step. Otherwise it is placed after the environment. In both
/// cases, a prediction cycle runs at the end of each animation step while the
/// manager's running condition holds.
pub struct PredictionPipeline<E: Environment, M: RunManager<E>, G: Engine = StepEngine> {
    env: SimEnvironment<E, G>,
    cycle: Cycle<E, M>,
}

impl<E: Environment, M: RunManager<E>, G: Engine> PredictionPipeline<E, M, G> {
    /// Binds the pipeline to an initialized environment.
    pub fn new(
        mut env: SimEnvironment<E, G>,
        manager: M,
        load_samples: bool,
    ) -> Result<Self, BridgeError> {
        let position = if load_samples {
            Position::Before
        } else {
            Position::After
        };
        env.attach(PREDICTION, position)?;
        Ok(Self {
            env,
            cycle: Cycle::new(manager, load_samples),
        })
    }

    /// Computes one environment step.
    pub async fn step(&mut self) -> Result<(), BridgeError> {
        self.env.step_with(&mut self.cycle).await
    }

    /// Steps the environment until the run ends and returns the number of cycles.
    pub async fn execute(&mut self) -> Result<usize, BridgeError> {
        info!("Prediction starts");
        while !self.cycle.finished {
            self.step().await?;
        }
        Ok(self.cycle.cycles)
    }

    /// Returns `true` if dataset samples are replayed.
    pub fn load_samples(&self) -> bool {
        self.cycle.load_samples
    }

    /// Returns `true` once the run ended.
    pub fn is_finished(&self) -> bool {
        self.cycle.finished
    }

    /// Number of completed prediction cycles.
    pub fn cycles(&self) -> usize {
        self.cycle.cycles
    }

    /// The environment.
    pub fn env(&self) -> &SimEnvironment<E, G> {
        &self.env
    }

    /// The manager.
    pub fn manager(&self) -> &M {
        &self.cycle.manager
    }

    /// Ends the run, closes the environment and returns the manager.
    pub fn close(mut self) -> Result<M, BridgeError> {
        self.cycle.finish();
        self.env.close()?;
        Ok(self.cycle.manager)
    }
}

impl<E: Environment, M: RunManager<E>> PredictionPipeline<E, M> {
    /// Creates the environment described by `config` and binds the pipeline to it.
    ///
    /// Dataset samples are replayed if `load_samples` is set in `config`.
    pub fn from_config(config: &EnvironmentConfig<E>, manager: M) -> Result<Self, BridgeError> {
        let env = config.create_environment()?;
        Self::new(env, manager, config.load_samples)
    }
}
