use super::Node;
use anyhow::{bail, Result};
use log::trace;

/// Entry points of the simulation engine.
///
/// Implementations wrap an actual physics engine. The adapter calls
/// [`Engine::init`] once after the scene graph has been created and
/// [`Engine::animate`] once per animation step.
pub trait Engine {
    /// Initializes the scene graph under `root`.
    fn init(&mut self, root: &mut Node) -> Result<()>;

    /// Computes one animation step of length `dt`.
    fn animate(&mut self, root: &mut Node, dt: f64) -> Result<()>;
}

/// Engine without physics, advancing the simulation time only.
///
/// Animating a graph that was never initialized is an error.
#[derive(Debug, Default, Clone)]
pub struct StepEngine {
    steps: usize,
}

impl StepEngine {
    /// Number of animation steps computed so far.
    pub fn steps(&self) -> usize {
        self.steps
    }
}

impl Engine for StepEngine {
    fn init(&mut self, root: &mut Node) -> Result<()> {
        if root.is_initialized() {
            bail!("node '{}' is already initialized", root.name());
        }
        root.set_initialized(true);
        Ok(())
    }

    fn animate(&mut self, root: &mut Node, dt: f64) -> Result<()> {
        if !root.is_initialized() {
            bail!("cannot animate node '{}' before initialization", root.name());
        }
        root.advance(dt);
        self.steps += 1;
        trace!("Animated '{}' to t = {}", root.name(), root.time());
        Ok(())
    }
}
