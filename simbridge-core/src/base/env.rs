//! Environment.
use super::{DatabaseFields, InstanceIds, Parameters, Prediction, SampleBuffer};
use crate::{
    pipeline::Network,
    scene::{Event, Node},
    VisualFactory,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ndarray::ArrayD;
use serde::{de::DeserializeOwned, Serialize};

/// Access to the scene graph and the data buffers during an event or a step.
pub struct StepContext<'a> {
    /// Root node of the environment.
    pub root: &'a mut Node,

    /// Data buffers.
    pub buffer: &'a mut SampleBuffer,

    /// Declared dataset fields.
    pub fields: &'a DatabaseFields,

    pub(crate) network: &'a mut Option<Box<dyn Network>>,
}

impl<'a> StepContext<'a> {
    /// Sets the network input and the ground truth of the current sample.
    pub fn set_training_data(&mut self, input: ArrayD<f32>, ground_truth: ArrayD<f32>) {
        self.buffer.set_training_data(input, ground_truth);
    }

    /// Sets additional data of the current sample.
    ///
    /// Fails if fields were declared and `name` is not an additional field.
    pub fn set_additional_data(&mut self, name: &str, data: ArrayD<f32>) -> Result<()> {
        self.fields.check_additional(name)?;
        self.buffer.additional_fields.insert(name.to_string(), data);
        Ok(())
    }

    /// Requests a prediction of the network for `input`.
    ///
    /// The network is the one given to
    /// [`SimEnvironment::set_network`](crate::SimEnvironment::set_network), or
    /// the network of the manager when the environment runs in a worker.
    pub fn get_prediction(&mut self, input: &ArrayD<f32>) -> Result<Prediction> {
        self.network
            .as_mut()
            .ok_or_else(|| anyhow!("no network is available for predictions"))?
            .predict(input)
    }
}

/// A simulation producing samples for the training framework.
///
/// Implementations are driven through the following lifecycle, in this order:
///
/// 1. [`Environment::build`], after the root node has been created.
/// 2. [`Environment::recv_parameters`] (optional).
/// 3. [`Environment::create`], populating the scene graph.
/// 4. Engine initialization, delivering [`Event::SimulationInitDone`].
/// 5. [`Environment::init_database`] and [`Environment::init_visualization`]
///    (optional).
/// 6. Steps: animation events through [`Environment::handle_event`], then
///    [`Environment::on_step`].
/// 7. [`Environment::close`].
///
/// The order is enforced by [`EnvironmentBuilder`](crate::EnvironmentBuilder).
/// Only [`Environment::build`] and [`Environment::create`] are mandatory.
#[async_trait(?Send)]
pub trait Environment: Sized {
    /// Constructor arguments.
    type Config: Clone + Serialize + DeserializeOwned;

    /// Builds the environment.
    fn build(config: &Self::Config, ids: InstanceIds) -> Result<Self>;

    /// Receives parameters from the manager before [`Environment::create`].
    fn recv_parameters(&mut self, _params: &Parameters) -> Result<()> {
        Ok(())
    }

    /// Parameters sent back to the manager once the environment is initialized.
    fn send_parameters(&self) -> Parameters {
        Parameters::new()
    }

    /// Creates the scene graph under `root`.
    fn create(&mut self, root: &mut Node) -> Result<()>;

    /// Declares the fields of the training dataset.
    fn init_database(&mut self, _fields: &mut DatabaseFields) -> Result<()> {
        Ok(())
    }

    /// Declares the objects to be rendered by the visualizer.
    fn init_visualization(&mut self, _factory: &mut VisualFactory) -> Result<()> {
        Ok(())
    }

    /// Called for every engine event delivered to the environment controller.
    fn handle_event(&mut self, _event: Event, _ctx: StepContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Called after the animation steps of [`SimEnvironment::step`].
    ///
    /// [`SimEnvironment::step`]: crate::SimEnvironment::step
    async fn on_step(&mut self, _ctx: StepContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Returns `true` if the current data can be used for training.
    fn check_sample(&self, _buffer: &SampleBuffer) -> bool {
        true
    }

    /// Applies a network prediction to the scene.
    fn apply_prediction(&mut self, _root: &mut Node, _prediction: &Prediction) -> Result<()> {
        Ok(())
    }

    /// Releases resources when the environment is shut down.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
