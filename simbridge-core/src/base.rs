//! Core types shared by environments, pipelines and workers.
mod database;
mod env;
mod parameters;
mod sample;
pub use database::{DatabaseFields, FieldKind};
pub use env::{Environment, StepContext};
pub use parameters::{ParamValue, Parameters};
pub use sample::{Prediction, Sample, SampleBuffer};
use serde::{Deserialize, Serialize};

/// Identifies an environment among simultaneously launched instances.
///
/// Instance ids start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceIds {
    /// Id of this instance.
    pub instance_id: usize,

    /// Number of simultaneously launched instances.
    pub instance_nb: usize,
}

impl InstanceIds {
    /// Constructs ids.
    pub fn new(instance_id: usize, instance_nb: usize) -> Self {
        Self {
            instance_id,
            instance_nb,
        }
    }
}

impl Default for InstanceIds {
    fn default() -> Self {
        Self::new(1, 1)
    }
}
