//! Environment lifecycle adapter.
mod adapter;
mod builder;
#[cfg(test)]
mod tests;
pub use adapter::SimEnvironment;
pub use builder::{Constructed, Created, EnvironmentBuilder, Rooted};

use crate::{
    base::{DatabaseFields, Environment, Prediction, SampleBuffer, StepContext},
    pipeline::{Controller, Network},
    scene::{ControllerRole, Event, Node},
    BridgeError,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Name of the environment controller in the root node.
pub(crate) const ENVIRONMENT_CONTROLLER: &str = "environment";

/// Who owns an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ownership {
    /// The environment runs in a worker process and talks to the manager over TCP.
    TcpIpClient,

    /// The environment is owned by an in-process manager.
    Manager,
}

impl Ownership {
    /// Converts the `as_tcp_ip_client` flag of a configuration.
    pub fn from_flag(as_tcp_ip_client: bool) -> Self {
        if as_tcp_ip_client {
            Self::TcpIpClient
        } else {
            Self::Manager
        }
    }
}

/// Where a pipeline controller is placed relative to the environment
/// controller.
///
/// Controllers receive events in graph order: a pipeline placed before the
/// environment sees the data of the previous step at [`Event::AnimateBegin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Receives events before the environment.
    Before,

    /// Receives events after the environment.
    After,
}

/// The user environment together with its scene graph and data buffers.
pub struct EnvState<E: Environment> {
    /// The user environment.
    pub env: E,

    /// Root node, exclusively owned by the environment.
    pub root: Node,

    /// Data buffers.
    pub buffer: SampleBuffer,

    /// Declared dataset fields.
    pub fields: DatabaseFields,

    network: Option<Box<dyn Network>>,
}

impl<E: Environment> EnvState<E> {
    fn new(env: E, root: Node) -> Self {
        Self {
            env,
            root,
            buffer: SampleBuffer::default(),
            fields: DatabaseFields::default(),
            network: None,
        }
    }

    /// Splits the state into the environment and a context over the rest.
    pub fn split(&mut self) -> (&mut E, StepContext<'_>) {
        (
            &mut self.env,
            StepContext {
                root: &mut self.root,
                buffer: &mut self.buffer,
                fields: &self.fields,
                network: &mut self.network,
            },
        )
    }

    /// Applies a network prediction to the scene.
    pub fn apply_prediction(&mut self, prediction: &Prediction) -> Result<()> {
        self.env.apply_prediction(&mut self.root, prediction)
    }

    /// Delivers an event to the controllers of the root node in graph order.
    pub(crate) fn dispatch<C: Controller<E>>(
        &mut self,
        event: Event,
        pipeline: &mut C,
    ) -> Result<(), BridgeError> {
        for (_, role) in self.root.controllers() {
            let res = match role {
                ControllerRole::Environment => {
                    let (env, ctx) = self.split();
                    env.handle_event(event, ctx)
                }
                ControllerRole::Pipeline => pipeline.on_event(event, self),
            };
            res.map_err(BridgeError::Runtime)?;
        }
        Ok(())
    }
}
