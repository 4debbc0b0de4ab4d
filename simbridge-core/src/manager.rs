//! In-process environment manager.
use crate::{
    base::{Environment, Parameters, Prediction, Sample},
    pipeline::Network,
    scene::{Engine, StepEngine},
    BridgeError, EnvironmentConfig, SimEnvironment,
};
use anyhow::anyhow;
use log::{info, trace, warn};

/// Owns an environment created in the manager process and pulls samples from it.
///
/// Use worker processes (see `simbridge-tcp`) when `as_tcp_ip_client` is set.
pub struct EnvironmentManager<E: Environment, G: Engine = StepEngine> {
    env: SimEnvironment<E, G>,
    max_wrong_samples_per_step: usize,
    record_wrong_samples: bool,
    produced: usize,
}

impl<E: Environment> EnvironmentManager<E> {
    /// Creates the environment described by `config` on a [`StepEngine`].
    pub fn new(config: &EnvironmentConfig<E>) -> Result<Self, BridgeError> {
        Self::with_engine(config, StepEngine::default())
    }
}

impl<E: Environment, G: Engine> EnvironmentManager<E, G> {
    /// Creates the environment described by `config` on `engine`.
    pub fn with_engine(config: &EnvironmentConfig<E>, engine: G) -> Result<Self, BridgeError> {
        if config.as_tcp_ip_client {
            return Err(BridgeError::Configuration(
                "an in-process manager requires 'as_tcp_ip_client' to be false".to_string(),
            ));
        }
        let env = config.create_environment_with_engine(engine)?;
        info!("Created in-process environment");
        Ok(Self {
            env,
            max_wrong_samples_per_step: config.max_wrong_samples_per_step,
            record_wrong_samples: config.record_wrong_samples,
            produced: 0,
        })
    }

    /// Steps the environment until it produces a valid sample.
    ///
    /// Fails after `max_wrong_samples_per_step` rejected samples.
    pub async fn get_data(&mut self) -> Result<Sample, BridgeError> {
        let mut wrong = 0;
        loop {
            self.env.step().await?;
            if self.env.check_sample() {
                break;
            }
            wrong += 1;
            warn!("Rejected sample ({}/{})", wrong, self.max_wrong_samples_per_step);
            if self.record_wrong_samples && self.env.visualization().is_some() {
                self.env.update_visualization()?;
            }
            if wrong >= self.max_wrong_samples_per_step {
                return Err(BridgeError::runtime(anyhow!(
                    "{} wrong samples in a single step",
                    wrong
                )));
            }
        }

        if self.env.visualization().is_some() {
            self.env.update_visualization()?;
        }
        self.produced += 1;
        trace!("Produced sample {}", self.produced);
        Ok(self.env.sample())
    }

    /// Collects `n` valid samples.
    pub async fn get_samples(&mut self, n: usize) -> Result<Vec<Sample>, BridgeError> {
        let mut samples = Vec::with_capacity(n);
        for _ in 0..n {
            samples.push(self.get_data().await?);
        }
        Ok(samples)
    }

    /// Sets the network answering the prediction requests of the environment.
    pub fn set_network<N: Network + 'static>(&mut self, network: N) {
        self.env.set_network(network);
    }

    /// Applies a network prediction to the environment.
    pub fn apply_prediction(&mut self, prediction: &Prediction) -> Result<(), BridgeError> {
        self.env.apply_prediction(prediction)
    }

    /// Parameters sent back by the environment.
    pub fn parameters(&self) -> Parameters {
        self.env.send_parameters()
    }

    /// Number of valid samples produced so far.
    pub fn produced(&self) -> usize {
        self.produced
    }

    /// The environment.
    pub fn environment(&self) -> &SimEnvironment<E, G> {
        &self.env
    }

    /// The environment.
    pub fn environment_mut(&mut self) -> &mut SimEnvironment<E, G> {
        &mut self.env
    }

    /// Closes the environment.
    pub fn close(mut self) -> Result<SimEnvironment<E, G>, BridgeError> {
        self.env.close()?;
        Ok(self.env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        testing::{Tracker, TrackerConfig},
        Data,
    };
    use ndarray::ArrayD;
    use test_log::test;

    struct Doubler;

    impl Network for Doubler {
        fn predict(&mut self, input: &ArrayD<f32>) -> anyhow::Result<Prediction> {
            let mut prediction = Prediction::new();
            prediction.insert("prediction".to_string(), input * 2.);
            Ok(prediction)
        }
    }

    fn config(reject: usize) -> EnvironmentConfig<Tracker> {
        EnvironmentConfig::new(TrackerConfig {
            reject,
            ..TrackerConfig::default()
        })
        .as_tcp_ip_client(false)
        .max_wrong_samples_per_step(3)
    }

    #[test]
    fn client_config_is_rejected() {
        let config = config(0).as_tcp_ip_client(true);
        let err = EnvironmentManager::new(&config).err().unwrap();
        assert!(matches!(err, BridgeError::Configuration(_)));
    }

    #[test(tokio::test)]
    async fn wrong_samples_are_skipped() {
        let mut manager = EnvironmentManager::new(&config(2)).unwrap();
        let sample = manager.get_data().await.unwrap();
        // Steps 1 and 2 are rejected.
        assert_eq!(sample.input.as_slice().unwrap(), &[3.0]);
        assert_eq!(sample.ground_truth.as_slice().unwrap(), &[6.0]);
        assert_eq!(manager.produced(), 1);

        let samples = manager.get_samples(2).await.unwrap();
        assert_eq!(samples[1].input.as_slice().unwrap(), &[5.0]);
    }

    #[test(tokio::test)]
    async fn too_many_wrong_samples_fail() {
        let mut manager = EnvironmentManager::new(&config(5)).unwrap();
        let err = manager.get_data().await.unwrap_err();
        assert!(err.is_runtime());
        assert_eq!(manager.environment().env().steps, 3);
    }

    #[test(tokio::test)]
    async fn environment_requests_predictions() {
        let config = EnvironmentConfig::<Tracker>::new(TrackerConfig {
            predict_on_end: true,
            ..TrackerConfig::default()
        })
        .as_tcp_ip_client(false);

        let mut manager = EnvironmentManager::new(&config).unwrap();
        assert!(manager.get_data().await.unwrap_err().is_runtime());

        let mut manager = EnvironmentManager::new(&config).unwrap();
        manager.set_network(Doubler);
        manager.get_samples(2).await.unwrap();
        let env = manager.environment();
        assert_eq!(env.env().count("apply_prediction"), 2);
        let position = env.root().object("input/MO").unwrap().get("position");
        assert_eq!(position, Some(&Data::from(vec![4.0])));

        let prediction = manager
            .environment_mut()
            .get_prediction(&ndarray::arr1(&[1.5f32]).into_dyn())
            .unwrap();
        assert_eq!(prediction["prediction"], ndarray::arr1(&[3f32]).into_dyn());
    }

    #[test(tokio::test)]
    async fn visualization_follows_samples() {
        let config = config(0)
            .visualizer(Some("tracker".to_string()))
            .store_visualization(true);
        let mut manager = EnvironmentManager::new(&config).unwrap();
        manager.get_samples(2).await.unwrap();
        assert_eq!(manager.environment_mut().take_visual_frames().len(), 2);
        manager.get_data().await.unwrap();

        let env = manager.close().unwrap();
        assert_eq!(env.visualization().unwrap().frames().len(), 1);
        assert!(env.is_closed());
    }

    #[test(tokio::test)]
    async fn visualization_updates_are_not_kept_by_default() {
        let config = config(0).visualizer(Some("tracker".to_string()));
        let mut manager = EnvironmentManager::new(&config).unwrap();
        manager.get_samples(50).await.unwrap();
        let env = manager.environment_mut();
        assert!(env.visualization().unwrap().frames().is_empty());
        assert!(env.take_visual_frames().is_empty());
    }

    #[test(tokio::test)]
    async fn rejected_samples_are_visualized_on_request() {
        let config = config(2)
            .visualizer(Some("tracker".to_string()))
            .store_visualization(true)
            .record_wrong_samples(true);
        let mut manager = EnvironmentManager::new(&config).unwrap();
        manager.get_data().await.unwrap();
        assert_eq!(manager.environment_mut().take_visual_frames().len(), 3);
    }
}
