//! Errors raised at the adapter boundary.
use thiserror::Error;

/// Errors in the library.
///
/// Failures are classified by origin: a bad configuration, a malformed
/// command line, a lifecycle call made in the wrong state, or an error
/// raised by user hooks or the simulation engine.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The environment could not be instantiated from its configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed command line arguments.
    #[error("usage error: {0}")]
    Usage(String),

    /// A lifecycle operation was called in a state that does not allow it.
    #[error("lifecycle error: {0}")]
    Lifecycle(String),

    /// An error raised by an environment hook or by the simulation engine.
    #[error("runtime error: {0}")]
    Runtime(#[source] anyhow::Error),

    /// I/O failure, e.g. while spawning a worker or reading a config file.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Unexpected or malformed message exchanged with a worker.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl BridgeError {
    /// Wraps an error raised by user code or the engine.
    pub fn runtime(e: impl Into<anyhow::Error>) -> Self {
        Self::Runtime(e.into())
    }

    /// Returns `true` if the error was raised by user code or the engine.
    pub fn is_runtime(&self) -> bool {
        matches!(self, Self::Runtime(_))
    }
}
