use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Output of a network, keyed by name (e.g. `"prediction"`).
pub type Prediction = BTreeMap<String, ArrayD<f32>>;

/// A training sample produced by an environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Input of the network.
    pub input: ArrayD<f32>,

    /// Ground truth.
    pub ground_truth: ArrayD<f32>,

    /// Additional data.
    pub additional_fields: BTreeMap<String, ArrayD<f32>>,
}

/// Data buffers of an environment.
///
/// `input` and `output` are written by the environment at every step.
/// `sample_in` and `sample_out` hold a sample loaded from a dataset; when set,
/// they take precedence over the produced data.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    /// Produced network input.
    pub input: ArrayD<f32>,

    /// Produced ground truth.
    pub output: ArrayD<f32>,

    /// Loaded network input.
    pub sample_in: Option<ArrayD<f32>>,

    /// Loaded ground truth.
    pub sample_out: Option<ArrayD<f32>>,

    /// Additional data.
    pub additional_fields: BTreeMap<String, ArrayD<f32>>,
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self {
            input: ArrayD::zeros(IxDyn(&[0])),
            output: ArrayD::zeros(IxDyn(&[0])),
            sample_in: None,
            sample_out: None,
            additional_fields: BTreeMap::new(),
        }
    }
}

impl SampleBuffer {
    /// Sets the produced input and ground truth.
    pub fn set_training_data(&mut self, input: ArrayD<f32>, ground_truth: ArrayD<f32>) {
        self.input = input;
        self.output = ground_truth;
    }

    /// Sets a sample loaded from a dataset.
    pub fn load_sample(&mut self, input: ArrayD<f32>, ground_truth: ArrayD<f32>) {
        self.sample_in = Some(input);
        self.sample_out = Some(ground_truth);
    }

    /// Drops the loaded sample.
    pub fn clear_loaded(&mut self) {
        self.sample_in = None;
        self.sample_out = None;
    }

    /// Network input, preferring the loaded sample.
    pub fn current_input(&self) -> &ArrayD<f32> {
        self.sample_in.as_ref().unwrap_or(&self.input)
    }

    /// Ground truth, preferring the loaded sample.
    pub fn current_output(&self) -> &ArrayD<f32> {
        self.sample_out.as_ref().unwrap_or(&self.output)
    }

    /// Returns the current content as a [`Sample`].
    pub fn to_sample(&self) -> Sample {
        Sample {
            input: self.current_input().clone(),
            ground_truth: self.current_output().clone(),
            additional_fields: self.additional_fields.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn loaded_sample_takes_precedence() {
        let mut buffer = SampleBuffer::default();
        assert_eq!(buffer.input.shape(), &[0]);
        assert_eq!(buffer.output.shape(), &[0]);
        assert!(buffer.sample_in.is_none() && buffer.sample_out.is_none());
        assert!(buffer.additional_fields.is_empty());

        buffer.set_training_data(arr1(&[1f32, 2.]).into_dyn(), arr1(&[1.5f32]).into_dyn());
        buffer.load_sample(arr1(&[3f32]).into_dyn(), arr1(&[4f32]).into_dyn());
        let sample = buffer.to_sample();
        assert_eq!(sample.input, arr1(&[3f32]).into_dyn());
        assert_eq!(sample.ground_truth, arr1(&[4f32]).into_dyn());

        buffer.clear_loaded();
        assert_eq!(buffer.to_sample().input, arr1(&[1f32, 2.]).into_dyn());
    }
}
