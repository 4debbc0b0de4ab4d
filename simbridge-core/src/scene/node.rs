use super::{ControllerRole, Data};
use anyhow::{bail, Result};
use std::collections::BTreeMap;

/// Kind name of controller objects.
const CONTROLLER: &str = "Controller";

/// An object in the scene graph, e.g. a `MechanicalObject` or a controller.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    kind: String,
    name: String,
    role: Option<ControllerRole>,
    data: BTreeMap<String, Data>,
}

impl SceneObject {
    /// Creates an object of the given kind.
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            role: None,
            data: BTreeMap::new(),
        }
    }

    /// Creates a controller object.
    pub fn controller(name: impl Into<String>, role: ControllerRole) -> Self {
        Self {
            role: Some(role),
            ..Self::new(CONTROLLER, name)
        }
    }

    /// Sets a field.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Data>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Kind of the object.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Name of the object, unique within its node.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Role if the object is a controller.
    pub fn role(&self) -> Option<ControllerRole> {
        self.role
    }

    /// Returns a field.
    pub fn get(&self, key: &str) -> Option<&Data> {
        self.data.get(key)
    }

    /// Sets a field, replacing the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Data>) {
        self.data.insert(key.into(), value.into());
    }

    /// All fields.
    pub fn data(&self) -> &BTreeMap<String, Data> {
        &self.data
    }
}

/// A node of the scene graph.
///
/// The root node of an environment carries the time step and the simulation
/// time, and holds the controller objects receiving animation events.
#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    dt: f64,
    time: f64,
    initialized: bool,
    children: Vec<Node>,
    objects: Vec<SceneObject>,
}

impl Node {
    /// Creates an empty node with `dt = 0.01`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dt: 0.01,
            time: 0.0,
            initialized: false,
            children: vec![],
            objects: vec![],
        }
    }

    /// Sets the time step.
    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    /// Name of the node.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Time step.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Sets the time step.
    pub fn set_dt(&mut self, dt: f64) {
        self.dt = dt;
    }

    /// Simulation time.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Advances the simulation time. Called by [`Engine`](super::Engine)s.
    pub fn advance(&mut self, dt: f64) {
        self.time += dt;
    }

    /// Returns `true` once an [`Engine`](super::Engine) initialized the graph.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Marks the graph as initialized. Called by [`Engine`](super::Engine)s.
    pub fn set_initialized(&mut self, v: bool) {
        self.initialized = v;
    }

    /// Adds a child node and returns it.
    pub fn add_child(&mut self, name: impl Into<String>) -> Result<&mut Node> {
        let name = name.into();
        if self.child(&name).is_some() {
            bail!("node '{}' already has a child '{}'", self.name, name);
        }
        let ix = self.children.len();
        self.children.push(Node::new(name));
        Ok(&mut self.children[ix])
    }

    /// Returns a child node.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Returns a child node.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// Child nodes in insertion order.
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Appends an object and returns it.
    pub fn add_object(&mut self, object: SceneObject) -> Result<&mut SceneObject> {
        let ix = self.objects.len();
        self.insert_object(ix, object)
    }

    /// Inserts an object at position `ix` among the objects of this node.
    pub fn insert_object(&mut self, ix: usize, object: SceneObject) -> Result<&mut SceneObject> {
        if self.objects.iter().any(|o| o.name == object.name) {
            bail!("node '{}' already has an object '{}'", self.name, object.name);
        }
        let ix = ix.min(self.objects.len());
        self.objects.insert(ix, object);
        Ok(&mut self.objects[ix])
    }

    /// Removes an object of this node.
    pub fn remove_object(&mut self, name: &str) -> Option<SceneObject> {
        let ix = self.objects.iter().position(|o| o.name == name)?;
        Some(self.objects.remove(ix))
    }

    /// Objects of this node in insertion order.
    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    /// Returns an object by path, e.g. `"input/MO"`.
    ///
    /// A leading `@` is accepted.
    pub fn object(&self, path: &str) -> Option<&SceneObject> {
        let (nodes, name) = split_path(path);
        let mut node = self;
        for n in nodes {
            node = node.child(n)?;
        }
        node.objects.iter().find(|o| o.name == name)
    }

    /// Returns an object by path, e.g. `"input/MO"`.
    pub fn object_mut(&mut self, path: &str) -> Option<&mut SceneObject> {
        let (nodes, name) = split_path(path);
        let mut node = self;
        for n in nodes {
            node = node.child_mut(n)?;
        }
        node.objects.iter_mut().find(|o| o.name == name)
    }

    /// Controller objects of this node in event order.
    pub fn controllers(&self) -> Vec<(String, ControllerRole)> {
        self.objects
            .iter()
            .filter_map(|o| o.role.map(|r| (o.name.clone(), r)))
            .collect()
    }

    /// Number of controllers with the given role.
    pub fn count_controller(&self, role: ControllerRole) -> usize {
        self.objects.iter().filter(|o| o.role == Some(role)).count()
    }
}

fn split_path(path: &str) -> (Vec<&str>, &str) {
    let path = path.trim_start_matches('@');
    let mut parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let name = parts.pop().unwrap_or("");
    (parts, name)
}
