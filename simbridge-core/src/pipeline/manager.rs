use crate::{
    base::{Environment, Prediction, Sample},
    EnvState,
};
use anyhow::{bail, Result};
use log::info;
use ndarray::ArrayD;

/// Decides whether a run continues and produces predictions.
///
/// This is the contract of the manager a pipeline delegates to. The
/// pipeline only calls these methods in order at each animation event.
pub trait RunManager<E: Environment> {
    /// Returns `true` while the run continues.
    fn running_condition(&mut self) -> bool;

    /// Called before a prediction.
    fn sample_begin(&mut self) {}

    /// Computes a prediction from the current data of the environment.
    fn predict(&mut self, state: &mut EnvState<E>) -> Result<Prediction>;

    /// Called after a prediction.
    fn sample_end(&mut self, _prediction: &Prediction) {}

    /// Called once when the run ends.
    fn run_end(&mut self) {}

    /// Loads a dataset sample into the buffers of the environment.
    fn load_sample(&mut self, _state: &mut EnvState<E>) -> Result<()> {
        bail!("this manager has no dataset")
    }
}

/// A trained model.
pub trait Network {
    /// Computes a prediction for a network input.
    fn predict(&mut self, input: &ArrayD<f32>) -> Result<Prediction>;
}

/// A [`RunManager`] running a fixed number of sample cycles.
///
/// Each cycle feeds the current input of the environment to the network and
/// applies the prediction to the environment.
pub struct StepLimit<N: Network> {
    network: N,
    nb_steps: Option<usize>,
    step: usize,
    record_inputs: bool,
    record_outputs: bool,
    inputs: Vec<ArrayD<f32>>,
    outputs: Vec<ArrayD<f32>>,
    dataset: Vec<Sample>,
    dataset_ix: usize,
    ended: bool,
}

impl<N: Network> StepLimit<N> {
    /// Runs `nb_steps` cycles, or forever with `None`.
    pub fn new(network: N, nb_steps: Option<usize>) -> Self {
        Self {
            network,
            nb_steps,
            step: 0,
            record_inputs: false,
            record_outputs: false,
            inputs: vec![],
            outputs: vec![],
            dataset: vec![],
            dataset_ix: 0,
            ended: false,
        }
    }

    /// Keeps the network inputs of each cycle.
    pub fn record_inputs(mut self, v: bool) -> Self {
        self.record_inputs = v;
        self
    }

    /// Keeps the ground truth of each cycle.
    pub fn record_outputs(mut self, v: bool) -> Self {
        self.record_outputs = v;
        self
    }

    /// Samples replayed by [`RunManager::load_sample`], in order and cyclically.
    pub fn dataset(mut self, samples: Vec<Sample>) -> Self {
        self.dataset = samples;
        self
    }

    /// Number of completed cycles.
    pub fn steps(&self) -> usize {
        self.step
    }

    /// Returns `true` once the run ended.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Recorded network inputs.
    pub fn inputs(&self) -> &[ArrayD<f32>] {
        &self.inputs
    }

    /// Recorded ground truth.
    pub fn outputs(&self) -> &[ArrayD<f32>] {
        &self.outputs
    }

    /// The network.
    pub fn network(&self) -> &N {
        &self.network
    }
}

impl<E: Environment, N: Network> RunManager<E> for StepLimit<N> {
    fn running_condition(&mut self) -> bool {
        self.nb_steps.map_or(true, |n| self.step < n)
    }

    fn predict(&mut self, state: &mut EnvState<E>) -> Result<Prediction> {
        let input = state.buffer.current_input().clone();
        let prediction = self.network.predict(&input)?;
        state.apply_prediction(&prediction)?;
        if self.record_inputs {
            self.inputs.push(input);
        }
        if self.record_outputs {
            self.outputs.push(state.buffer.current_output().clone());
        }
        Ok(prediction)
    }

    fn sample_end(&mut self, _prediction: &Prediction) {
        self.step += 1;
    }

    fn run_end(&mut self) {
        self.ended = true;
        info!("Run ended after {} steps", self.step);
    }

    fn load_sample(&mut self, state: &mut EnvState<E>) -> Result<()> {
        if self.dataset.is_empty() {
            bail!("the dataset is empty");
        }
        let sample = &self.dataset[self.dataset_ix % self.dataset.len()];
        state
            .buffer
            .load_sample(sample.input.clone(), sample.ground_truth.clone());
        state.buffer.additional_fields = sample.additional_fields.clone();
        self.dataset_ix += 1;
        Ok(())
    }
}
