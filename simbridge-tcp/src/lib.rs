//! TCP transport between simulation workers and a sample manager.
//!
//! The manager binds a [`TcpIpServer`] and launches worker processes, each
//! running [`run_launcher`] with the command line built by
//! [`EnvironmentConfig::worker_command`]. A worker connects a [`TcpIpClient`],
//! creates its environment with the [`WorkerSetup`] sent by the manager, and
//! then produces one sample per [`ManagerMessage::Step`]. While a step is
//! computed, the environment may send [`WorkerMessage::PredictionRequest`]s,
//! answered by the network set with [`TcpIpServer::set_network`].
//!
//! Messages are framed by [`codec`].
//!
//! [`EnvironmentConfig::worker_command`]: simbridge_core::EnvironmentConfig::worker_command
mod client;
pub mod codec;
mod launcher;
mod messages;
mod server;
pub use client::{run_worker, TcpIpClient};
pub use launcher::{run_launcher, WorkerRegistry};
pub use messages::{ManagerMessage, WorkerMessage, WorkerSetup};
pub use server::TcpIpServer;
