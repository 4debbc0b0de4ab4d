use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use simbridge_core::{Parameters, Prediction, Sample};
pub use simbridge_core::WorkerSetup;

/// Messages that workers receive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ManagerMessage {
    /// Creates the environment.
    Setup(WorkerSetup),

    /// Produces one sample.
    Step,

    /// Applies a network prediction, or answers a
    /// [`WorkerMessage::PredictionRequest`] during a step.
    Prediction(Prediction),

    /// Answers a [`WorkerMessage::PredictionRequest`] when the manager has no
    /// network.
    PredictionUnavailable,

    /// Closes the environment and disconnects.
    Exit,
}

/// Messages that the manager receives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkerMessage {
    /// First message of a worker after connecting.
    Hello {
        /// Id of the worker.
        instance_id: usize,

        /// Number of workers.
        instance_nb: usize,
    },

    /// Parameters sent back once the environment is initialized.
    Parameters(Parameters),

    /// Asks the network of the manager for a prediction on this input.
    PredictionRequest(ArrayD<f32>),

    /// A valid sample.
    Sample(Sample),

    /// Every sample of the step was rejected.
    WrongSample,

    /// The environment was closed.
    Closed,
}
