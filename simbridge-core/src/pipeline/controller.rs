use crate::{base::Environment, scene::Event, EnvState};
use anyhow::Result;

/// An object receiving the animation events of an environment.
pub trait Controller<E: Environment> {
    /// Called once per event, in graph order relative to the environment.
    fn on_event(&mut self, event: Event, state: &mut EnvState<E>) -> Result<()>;
}

/// Stands for the absence of a pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPipeline;

impl<E: Environment> Controller<E> for NoPipeline {
    fn on_event(&mut self, _event: Event, _state: &mut EnvState<E>) -> Result<()> {
        Ok(())
    }
}
