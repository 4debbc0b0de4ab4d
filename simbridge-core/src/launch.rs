//! Worker subprocess launch.
//!
//! A worker is a separate process running one environment connected to the
//! manager over TCP. The manager passes it a fixed list of positional
//! arguments, described by [`LaunchArgs`].
mod args;
mod process;
pub use args::{LaunchArgs, USAGE};
pub use process::{ProcessLauncher, SubprocessLauncher, WorkerCommand};
