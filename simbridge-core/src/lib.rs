#![warn(missing_docs)]
//! Bridges a host-controlled simulation scene graph and a training framework.
//!
//! The physics engine owns the scene graph and drives animation events; the
//! training framework expects an *environment* producing input/ground-truth
//! samples. This crate provides the adapter between the two:
//!
//! * [`scene`] models the parts of the engine the adapter talks to: a [`Node`]
//!   tree, scene objects and the [`Engine`] trait.
//! * [`Environment`] is the contract a user environment implements.
//! * [`EnvironmentBuilder`] walks an environment through its lifecycle
//!   (root, construction, parameters, creation, initialization) and yields a
//!   steppable [`SimEnvironment`].
//! * [`EnvironmentConfig`] instantiates environments in-process or spawns
//!   worker subprocesses through a [`ProcessLauncher`].
//! * [`pipeline`] binds a runner or a prediction pipeline to animation events.
pub mod error;
pub mod pipeline;
pub mod scene;

mod base;
pub use base::{
    DatabaseFields, Environment, FieldKind, InstanceIds, ParamValue, Parameters, Prediction,
    Sample, SampleBuffer, StepContext,
};

mod environment;
pub use environment::{
    Constructed, Created, EnvState, EnvironmentBuilder, Ownership, Position, Rooted,
    SimEnvironment,
};

mod config;
pub use config::{EnvironmentConfig, WorkerSetup};

mod launch;
pub use launch::{LaunchArgs, ProcessLauncher, SubprocessLauncher, WorkerCommand, USAGE};

mod manager;
pub use manager::EnvironmentManager;

mod visualization;
pub use visualization::{VisualFactory, VisualObject, VisualUpdate};

pub use error::BridgeError;

#[cfg(test)]
mod testing;
pub use scene::{ControllerRole, Data, Engine, Event, Node, SceneObject, StepEngine};
