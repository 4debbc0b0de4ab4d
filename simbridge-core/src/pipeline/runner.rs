use super::{Controller, RunManager};
use crate::{
    base::Environment,
    scene::{Engine, Event, StepEngine},
    BridgeError, EnvState, Position, SimEnvironment,
};
use anyhow::Result;
use log::info;
use std::marker::PhantomData;

/// Name of the runner controller in the root node.
const RUNNER: &str = "runner";

/// Sample cycle run by pipelines at animation events.
pub(super) struct Cycle<E: Environment, M: RunManager<E>> {
    pub(super) manager: M,
    pub(super) load_samples: bool,
    pub(super) finished: bool,
    pub(super) cycles: usize,
    phantom: PhantomData<E>,
}

impl<E: Environment, M: RunManager<E>> Cycle<E, M> {
    pub(super) fn new(manager: M, load_samples: bool) -> Self {
        Self {
            manager,
            load_samples,
            finished: false,
            cycles: 0,
            phantom: PhantomData,
        }
    }

    pub(super) fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.manager.run_end();
        }
    }
}

impl<E: Environment, M: RunManager<E>> Controller<E> for Cycle<E, M> {
    fn on_event(&mut self, event: Event, state: &mut EnvState<E>) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        match event {
            Event::AnimateBegin if self.load_samples => self.manager.load_sample(state),
            Event::AnimateEnd => {
                if self.manager.running_condition() {
                    self.manager.sample_begin();
                    let prediction = self.manager.predict(state)?;
                    self.manager.sample_end(&prediction);
                    self.cycles += 1;
                } else {
                    self.finish();
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Runs one sample cycle at the end of each animation step of an environment.
///
/// The runner is placed after the environment controller, so it sees the
/// data produced by the step. When the manager's running condition fails,
/// the run ends and further events are ignored.
pub struct Runner<E: Environment, M: RunManager<E>, G: Engine = StepEngine> {
    env: SimEnvironment<E, G>,
    cycle: Cycle<E, M>,
}

impl<E: Environment, M: RunManager<E>, G: Engine> Runner<E, M, G> {
    /// Binds a runner to an initialized environment.
    pub fn new(mut env: SimEnvironment<E, G>, manager: M) -> Result<Self, BridgeError> {
        env.attach(RUNNER, Position::After)?;
        Ok(Self {
            env,
            cycle: Cycle::new(manager, false),
        })
    }

    /// Computes one environment step.
    pub async fn step(&mut self) -> Result<(), BridgeError> {
        self.env.step_with(&mut self.cycle).await
    }

    /// Steps the environment until the run ends and returns the number of cycles.
    pub async fn execute(&mut self) -> Result<usize, BridgeError> {
        info!("Runner starts");
        while !self.cycle.finished {
            self.step().await?;
        }
        info!("Runner completed {} cycles", self.cycle.cycles);
        Ok(self.cycle.cycles)
    }

    /// Returns `true` once the run ended.
    pub fn is_finished(&self) -> bool {
        self.cycle.finished
    }

    /// Number of completed sample cycles.
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

    /// Closes the environment and returns the manager.
    pub fn close(mut self) -> Result<M, BridgeError> {
        self.cycle.finish();
        self.env.close()?;
        Ok(self.cycle.manager)
    }
}
