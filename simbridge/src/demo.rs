//! Environment computing the mean of random point clouds.
//!
//! At each animation step, [`MeanEnvironment`] draws a point cloud of shape
//! `data_size` with coordinates in `[0, π)`. The point cloud is the input of
//! the network and its center is the ground truth. [`MeanNetwork`] computes
//! that center exactly, which makes the demo usable without a trained model.
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::info;
use ndarray::{Array2, ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};
use simbridge_core::{
    pipeline::Network, DatabaseFields, Environment, Event, FieldKind, InstanceIds, Node,
    Prediction, SceneObject, StepContext, VisualFactory,
};
use std::f64::consts::PI;

/// Name under which workers register [`MeanEnvironment`].
pub const MEAN_ENVIRONMENT: &str = "MeanEnvironment";

/// Configuration of [`MeanEnvironment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanEnvironmentConfig {
    /// Keeps the first point cloud if `true`.
    pub constant: bool,

    /// Number of points and dimension of the point clouds.
    pub data_size: [usize; 2],

    /// Seed of the random generator. The instance id is added to it.
    pub seed: Option<u64>,

    /// Requests a prediction of the center at the end of each animation.
    pub online_prediction: bool,
}

impl Default for MeanEnvironmentConfig {
    fn default() -> Self {
        Self {
            constant: false,
            data_size: [30, 3],
            seed: None,
            online_prediction: false,
        }
    }
}

impl MeanEnvironmentConfig {
    /// Sets the constant mode.
    pub fn constant(mut self, v: bool) -> Self {
        self.constant = v;
        self
    }

    /// Sets the shape of the point clouds.
    pub fn data_size(mut self, n_points: usize, dim: usize) -> Self {
        self.data_size = [n_points, dim];
        self
    }

    /// Sets the seed of the random generator.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets whether predictions are requested during the animations.
    pub fn online_prediction(mut self, v: bool) -> Self {
        self.online_prediction = v;
        self
    }
}

/// See the [module](self) documentation.
pub struct MeanEnvironment {
    config: MeanEnvironmentConfig,
    ids: InstanceIds,
    rng: fastrand::Rng,
    pcd: Array2<f64>,
    center: Array2<f64>,
}

impl MeanEnvironment {
    fn draw(&mut self) {
        let rng = &self.rng;
        let [n, d] = self.config.data_size;
        self.pcd = Array2::from_shape_fn((n, d), |_| PI * rng.f64());
        self.center = mean(&self.pcd);
    }

    fn write_scene(&self, root: &mut Node) -> Result<()> {
        let scene = [("input/MO", &self.pcd), ("output/MO", &self.center)];
        for (path, value) in scene.iter().copied() {
            root.object_mut(path)
                .ok_or_else(|| anyhow!("no scene object at '{}'", path))?
                .set("position", value.clone().into_dyn());
        }
        Ok(())
    }

    fn push_training_data(&self, ctx: &mut StepContext<'_>) {
        ctx.set_training_data(
            self.pcd.mapv(|v| v as f32).into_dyn(),
            self.center.mapv(|v| v as f32).into_dyn(),
        );
    }

    /// Current point cloud.
    pub fn point_cloud(&self) -> &Array2<f64> {
        &self.pcd
    }

    /// Center of the current point cloud.
    pub fn center(&self) -> &Array2<f64> {
        &self.center
    }
}

fn mean(pcd: &Array2<f64>) -> Array2<f64> {
    match pcd.mean_axis(Axis(0)) {
        Some(m) => m.insert_axis(Axis(0)),
        None => Array2::zeros((1, pcd.ncols())),
    }
}

#[async_trait(?Send)]
impl Environment for MeanEnvironment {
    type Config = MeanEnvironmentConfig;

    fn build(config: &Self::Config, ids: InstanceIds) -> Result<Self> {
        let [n, d] = config.data_size;
        if n == 0 || d == 0 {
            return Err(anyhow!("empty data size {:?}", config.data_size));
        }
        let rng = match config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed.wrapping_add(ids.instance_id as u64)),
            None => fastrand::Rng::new(),
        };
        Ok(Self {
            config: config.clone(),
            ids,
            rng,
            pcd: Array2::zeros((n, d)),
            center: Array2::zeros((1, d)),
        })
    }

    fn create(&mut self, root: &mut Node) -> Result<()> {
        self.draw();
        let d = self.config.data_size[1];
        root.add_child("input")?.add_object(
            SceneObject::new("MechanicalObject", "MO")
                .with("position", self.pcd.clone().into_dyn())
                .with("showObject", true),
        )?;
        root.add_child("output")?.add_object(
            SceneObject::new("MechanicalObject", "MO")
                .with("position", self.center.clone().into_dyn())
                .with("showColor", "0 200 0 255"),
        )?;
        root.add_child("predict")?.add_object(
            SceneObject::new("MechanicalObject", "MO")
                .with("position", ArrayD::<f64>::zeros(IxDyn(&[1, d])))
                .with("showColor", "100 0 200 255"),
        )?;
        Ok(())
    }

    fn init_database(&mut self, fields: &mut DatabaseFields) -> Result<()> {
        fields.create_field("input", FieldKind::Input)?;
        fields.create_field("ground_truth", FieldKind::GroundTruth)
    }

    fn init_visualization(&mut self, factory: &mut VisualFactory) -> Result<()> {
        factory.add_points("input/MO", "blue", 5.);
        factory.add_points("output/MO", "green", 10.);
        factory.add_points("predict/MO", "pink", 10.);
        Ok(())
    }

    fn handle_event(&mut self, event: Event, mut ctx: StepContext<'_>) -> Result<()> {
        match event {
            Event::AnimateBegin => {
                if !self.config.constant {
                    self.draw();
                    self.write_scene(&mut *ctx.root)?;
                }
                // Pipelines placed after the environment see the new data.
                self.push_training_data(&mut ctx);
            }
            Event::AnimateEnd if self.config.online_prediction => {
                let input = self.pcd.mapv(|v| v as f32).into_dyn();
                let prediction = ctx.get_prediction(&input)?;
                self.apply_prediction(&mut *ctx.root, &prediction)?;
            }
            _ => {}
        }
        Ok(())
    }

    async fn on_step(&mut self, mut ctx: StepContext<'_>) -> Result<()> {
        self.push_training_data(&mut ctx);
        Ok(())
    }

    fn apply_prediction(&mut self, root: &mut Node, prediction: &Prediction) -> Result<()> {
        let center = prediction
            .get("prediction")
            .ok_or_else(|| anyhow!("prediction is missing"))?;
        root.object_mut("predict/MO")
            .ok_or_else(|| anyhow!("no scene object at 'predict/MO'"))?
            .set("position", center.mapv(|v| v as f64));
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        info!("Closing mean environment {}", self.ids.instance_id);
        Ok(())
    }
}

/// Computes the center of a point cloud of shape `(n, d)`.
#[derive(Debug, Clone, Default)]
pub struct MeanNetwork;

impl Network for MeanNetwork {
    fn predict(&mut self, input: &ArrayD<f32>) -> Result<Prediction> {
        let center = match input.ndim() {
            2 => input
                .mean_axis(Axis(0))
                .ok_or_else(|| anyhow!("empty input"))?
                .insert_axis(Axis(0)),
            n => return Err(anyhow!("expected a 2-d input, got {} dimensions", n)),
        };
        let mut prediction = Prediction::new();
        prediction.insert("prediction".to_string(), center);
        Ok(prediction)
    }
}
