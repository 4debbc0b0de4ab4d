//! Pipelines bound to the animation events of an environment.
//!
//! A pipeline registers itself as a controller of the root node of an
//! environment, before or after the environment controller. At each animation
//! event, it asks its [`RunManager`] whether the run continues and, if so,
//! runs one sample cycle: `sample_begin`, `predict`, `sample_end`.
//!
//! * [`Runner`] is placed after the environment and runs a cycle at the end of
//!   each animation step.
//! * [`PredictionPipeline`] may also replay dataset samples, in which case it is
//!   placed before the environment and loads a sample at the beginning of
//!   each animation step.
mod controller;
mod manager;
mod prediction;
mod runner;
pub use controller::{Controller, NoPipeline};
pub use manager::{Network, RunManager, StepLimit};
pub use prediction::PredictionPipeline;
pub use runner::Runner;
