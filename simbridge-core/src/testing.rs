//! Environment recording its lifecycle calls, for tests.
use crate::{
    base::{
        DatabaseFields, Environment, FieldKind, InstanceIds, ParamValue, Parameters, Prediction,
        SampleBuffer, StepContext,
    },
    scene::{Event, Node, SceneObject},
    VisualFactory,
};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use ndarray::arr1;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Number of leading samples rejected by `check_sample`.
    pub reject: usize,
    pub fail_build: bool,
    pub fail_create: bool,
    pub fail_on_step: bool,
    /// Requests a prediction for `[steps + 1]` at the end of each animation.
    pub predict_on_end: bool,
}

#[derive(Debug, Default)]
pub struct Tracker {
    pub config: TrackerConfig,
    pub ids: InstanceIds,
    pub created: bool,
    pub init_done: bool,
    pub animate_begin: bool,
    pub steps: usize,
    pub params: Parameters,
    pub log: Vec<String>,
}

impl Tracker {
    pub fn count(&self, entry: &str) -> usize {
        self.log.iter().filter(|e| *e == entry).count()
    }
}

#[async_trait(?Send)]
impl Environment for Tracker {
    type Config = TrackerConfig;

    fn build(config: &Self::Config, ids: InstanceIds) -> Result<Self> {
        if config.fail_build {
            bail!("bad config");
        }
        Ok(Self {
            config: config.clone(),
            ids,
            ..Self::default()
        })
    }

    fn recv_parameters(&mut self, params: &Parameters) -> Result<()> {
        self.log.push("recv_parameters".into());
        self.params = params.clone();
        Ok(())
    }

    /// Integer values are multiplied by the last digit of their key.
    fn send_parameters(&self) -> Parameters {
        self.params
            .iter()
            .map(|(k, v)| {
                let digit = k.chars().last().and_then(|c| c.to_digit(10));
                let v = match (v, digit) {
                    (ParamValue::Int(i), Some(d)) => ParamValue::Int(i * d as i64),
                    _ => v.clone(),
                };
                (k.clone(), v)
            })
            .collect()
    }

    fn create(&mut self, root: &mut Node) -> Result<()> {
        if self.config.fail_create {
            bail!("cannot create scene");
        }
        root.add_child("input")?.add_object(
            SceneObject::new("MechanicalObject", "MO").with("position", vec![0.0, 0.0, 0.0]),
        )?;
        self.created = true;
        self.log.push("create".into());
        Ok(())
    }

    fn init_database(&mut self, fields: &mut DatabaseFields) -> Result<()> {
        fields.create_field("input", FieldKind::Input)?;
        fields.create_field("ground_truth", FieldKind::GroundTruth)?;
        fields.create_field("step", FieldKind::Additional)
    }

    fn init_visualization(&mut self, factory: &mut VisualFactory) -> Result<()> {
        factory.add_points("input/MO", "blue", 1.0);
        Ok(())
    }

    fn handle_event(&mut self, event: Event, mut ctx: StepContext<'_>) -> Result<()> {
        match event {
            Event::SimulationInitDone => self.init_done = true,
            Event::AnimateBegin => self.animate_begin = true,
            Event::AnimateEnd if self.config.predict_on_end => {
                let input = arr1(&[self.steps as f32 + 1.]).into_dyn();
                let prediction = ctx.get_prediction(&input)?;
                self.apply_prediction(&mut *ctx.root, &prediction)?;
            }
            Event::AnimateEnd => {}
        }
        self.log.push(format!("{:?}", event));
        Ok(())
    }

    async fn on_step(&mut self, mut ctx: StepContext<'_>) -> Result<()> {
        if self.config.fail_on_step {
            bail!("step failed");
        }
        self.steps += 1;
        let step = self.steps as f32;
        ctx.set_training_data(arr1(&[step]).into_dyn(), arr1(&[2. * step]).into_dyn());
        ctx.set_additional_data("step", arr1(&[step]).into_dyn())?;
        self.log.push("on_step".into());
        Ok(())
    }

    fn check_sample(&self, buffer: &SampleBuffer) -> bool {
        buffer
            .input
            .iter()
            .next()
            .map_or(false, |v| *v > self.config.reject as f32)
    }

    fn apply_prediction(&mut self, root: &mut Node, prediction: &Prediction) -> Result<()> {
        let p = prediction
            .get("prediction")
            .ok_or_else(|| anyhow!("no prediction"))?;
        let position: Vec<f64> = p.iter().map(|v| *v as f64).collect();
        root.object_mut("input/MO")
            .ok_or_else(|| anyhow!("no input/MO"))?
            .set("position", position);
        self.log.push("apply_prediction".into());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.log.push("close".into());
        Ok(())
    }
}
