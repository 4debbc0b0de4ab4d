//! Lets a host-controlled physics simulation produce samples for a training
//! framework.
//!
//! This crate gathers the following crates:
//!
//! * [simbridge-core](simbridge_core) provides the scene graph abstraction,
//!   the [`Environment`](simbridge_core::Environment) trait, the staged
//!   lifecycle of environments, their configuration, the in-process manager
//!   and the pipelines bound to animation events.
//! * [simbridge-tcp](simbridge_tcp) runs environments in worker processes
//!   connected to the manager over TCP.
//!
//! [`demo`] has a small environment used by the `mean_env` example and the
//! `simbridge-worker` binary.
pub mod demo;

pub use simbridge_core as core;
pub use simbridge_tcp as tcp;
