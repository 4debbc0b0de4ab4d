//! Scene graph of the simulation engine.
//!
//! The engine itself (solvers, force fields, topologies) lives outside this
//! crate. What is modelled here is the surface the adapter relies on: a tree of
//! [`Node`]s holding named [`SceneObject`]s, the animation [`Event`]s delivered
//! to controllers, and the [`Engine`] entry points `init` and `animate`.
mod data;
mod engine;
mod node;
pub use data::Data;
pub use engine::{Engine, StepEngine};
pub use node::{Node, SceneObject};

/// Role of a controller object attached to a root node.
///
/// Controllers receive animation events in the order they appear among the
/// objects of the root node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerRole {
    /// The environment adapter.
    Environment,

    /// A pipeline (runner or prediction) bound to the environment.
    Pipeline,
}

/// Events the engine delivers to controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The scene graph has been initialized.
    SimulationInitDone,

    /// An animation step is about to be computed.
    AnimateBegin,

    /// An animation step has been computed.
    AnimateEnd,
}
