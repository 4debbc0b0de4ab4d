use super::LaunchArgs;
use crate::BridgeError;
use anyhow::anyhow;
use log::info;
use std::{
    path::PathBuf,
    process::{Command, ExitStatus},
};

/// A worker program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    /// Worker executable.
    pub program: PathBuf,

    /// Positional arguments.
    pub args: LaunchArgs,
}

impl WorkerCommand {
    /// Builds the process command.
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(self.args.to_args());
        command
    }
}

/// Launches worker processes.
pub trait ProcessLauncher {
    /// Runs a worker until it exits.
    ///
    /// Fails if the process cannot be spawned or exits unsuccessfully.
    fn launch(&self, command: &WorkerCommand) -> Result<ExitStatus, BridgeError>;
}

/// Runs workers as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubprocessLauncher;

impl ProcessLauncher for SubprocessLauncher {
    fn launch(&self, command: &WorkerCommand) -> Result<ExitStatus, BridgeError> {
        info!(
            "Launching worker {} with {:?}",
            command.args.instance_id, command.program
        );
        let status = command.to_command().status()?;
        if status.success() {
            Ok(status)
        } else {
            Err(BridgeError::Runtime(anyhow!(
                "worker {} exited with {}",
                command.args.instance_id,
                status
            )))
        }
    }
}
