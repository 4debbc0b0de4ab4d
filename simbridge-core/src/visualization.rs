//! Visualization factory.
//!
//! Environments declare the scene objects to be rendered in
//! [`Environment::init_visualization`](crate::Environment::init_visualization).
//! At each update, the factory reads the `position` field of those objects and
//! produces [`VisualUpdate`]s for a visualizer.
use crate::scene::{Data, Node};
use anyhow::{anyhow, Result};
use ndarray::{ArrayD, IxDyn};

/// Position field read from the scene objects.
const POSITION: &str = "position";

/// An object declared to the visualizer.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualObject {
    /// Id of the object, in declaration order.
    pub id: usize,

    /// Path of the scene object holding the positions, e.g. `"input/MO"`.
    pub position_object: String,

    /// Index of the viewer window, the instance id by default.
    pub at: usize,

    /// Color name or RGBA string.
    pub color: String,

    /// Size of rendered points.
    pub point_size: f64,
}

/// Positions of a [`VisualObject`] at one update.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualUpdate {
    /// Id of the object.
    pub id: usize,

    /// Index of the viewer window.
    pub at: usize,

    /// Positions read from the scene.
    pub positions: ArrayD<f64>,
}

/// Collects visual objects and produces updates from the scene graph.
#[derive(Debug, Clone)]
pub struct VisualFactory {
    instance_id: usize,
    non_storing: bool,
    objects: Vec<VisualObject>,
    frames: Vec<Vec<VisualUpdate>>,
}

impl VisualFactory {
    /// Creates a factory for the given instance.
    ///
    /// If `non_storing` is `true`, updates are not kept in [`VisualFactory::frames`].
    pub fn new(instance_id: usize, non_storing: bool) -> Self {
        Self {
            instance_id,
            non_storing,
            objects: vec![],
            frames: vec![],
        }
    }

    /// Declares a point cloud read from `position_object` and returns its id.
    pub fn add_points(
        &mut self,
        position_object: impl Into<String>,
        color: impl Into<String>,
        point_size: f64,
    ) -> usize {
        let id = self.objects.len();
        self.objects.push(VisualObject {
            id,
            position_object: position_object.into(),
            at: self.instance_id,
            color: color.into(),
            point_size,
        });
        id
    }

    /// Declared objects.
    pub fn objects(&self) -> &[VisualObject] {
        &self.objects
    }

    /// Stored updates, one entry per call to [`VisualFactory::render`].
    pub fn frames(&self) -> &[Vec<VisualUpdate>] {
        &self.frames
    }

    /// Removes and returns the stored updates.
    pub fn take_frames(&mut self) -> Vec<Vec<VisualUpdate>> {
        std::mem::take(&mut self.frames)
    }

    /// Reads the positions of all declared objects.
    pub fn render(&mut self, root: &Node) -> Result<Vec<VisualUpdate>> {
        let updates = self
            .objects
            .iter()
            .map(|o| {
                let object = root
                    .object(&o.position_object)
                    .ok_or_else(|| anyhow!("no scene object at '{}'", o.position_object))?;
                let positions = match object.get(POSITION) {
                    Some(Data::Array(a)) => a.clone(),
                    Some(Data::Vector(v)) => ArrayD::from_shape_vec(IxDyn(&[v.len()]), v.clone())?,
                    _ => return Err(anyhow!("'{}' has no positions", o.position_object)),
                };
                Ok(VisualUpdate {
                    id: o.id,
                    at: o.at,
                    positions,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if !self.non_storing {
            self.frames.push(updates.clone());
        }
        Ok(updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneObject;

    #[test]
    fn render_reads_positions() {
        let mut root = Node::new("root");
        root.add_child("input")
            .unwrap()
            .add_object(SceneObject::new("MechanicalObject", "MO").with("position", vec![1.0, 2.0]))
            .unwrap();

        let mut factory = VisualFactory::new(3, false);
        assert_eq!(factory.add_points("@input/MO", "blue", 5.0), 0);
        let updates = factory.render(&root).unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].at, 3);
        assert_eq!(updates[0].positions.as_slice().unwrap(), &[1.0, 2.0]);
        assert_eq!(factory.frames().len(), 1);
        assert_eq!(factory.take_frames()[0], updates);
        assert!(factory.frames().is_empty());

        factory.add_points("output/MO", "green", 10.0);
        assert!(factory.render(&root).is_err());
    }

    #[test]
    fn non_storing_factory_keeps_no_frames() {
        let mut factory = VisualFactory::new(1, true);
        factory.render(&Node::new("root")).unwrap();
        assert!(factory.frames().is_empty());
    }
}
