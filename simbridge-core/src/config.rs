//! Configuration of environments.
use crate::{
    base::{Environment, InstanceIds, Parameters},
    scene::{Engine, Node, StepEngine},
    BridgeError, EnvironmentBuilder, LaunchArgs, Ownership, ProcessLauncher, SimEnvironment,
    VisualFactory, WorkerCommand,
};
use anyhow::Result;
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
    process::ExitStatus,
};

/// Settings a manager sends to a worker before its environment is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSetup {
    /// Passed to `recv_parameters` of the environment.
    pub parameters: Parameters,

    /// Number of animations per environment step.
    pub simulations_per_step: usize,

    /// Maximum number of rejected samples in a step.
    pub max_wrong_samples_per_step: usize,

    /// Time step of the root node.
    pub dt: f64,
}

impl Default for WorkerSetup {
    fn default() -> Self {
        Self {
            parameters: Parameters::new(),
            simulations_per_step: 1,
            max_wrong_samples_per_step: 10,
            dt: 0.01,
        }
    }
}

/// Configuration to create an environment in-process or in worker processes.
///
/// `env_config` holds the constructor arguments of the environment. Worker
/// processes read them from `environment_file`, see
/// [`EnvironmentConfig::save_env_config`].
#[derive(Deserialize, Serialize)]
#[serde(bound(
    serialize = "E::Config: Serialize",
    deserialize = "E::Config: DeserializeOwned"
))]
pub struct EnvironmentConfig<E: Environment> {
    /// Constructor arguments of the environment.
    pub env_config: E::Config,

    /// Name under which worker processes register the environment.
    pub environment_class: String,

    /// YAML file holding `env_config` for worker processes.
    pub environment_file: Option<PathBuf>,

    /// Worker executable.
    pub worker_program: Option<PathBuf>,

    /// Environments run in worker processes if `true`, in-process otherwise.
    pub as_tcp_ip_client: bool,

    /// Number of worker processes.
    pub number_of_thread: usize,

    /// Address of the manager.
    pub ip_address: String,

    /// Port of the manager.
    pub port: u16,

    /// Number of animation steps computed at each environment step.
    pub simulations_per_step: usize,

    /// Maximum number of rejected samples in a step.
    pub max_wrong_samples_per_step: usize,

    /// If `true`, dataset samples are replayed in the environment.
    pub load_samples: bool,

    /// Visualizer backend. Visualization is initialized when set.
    pub visualizer: Option<String>,

    /// If `true`, visualization updates are kept until
    /// [`SimEnvironment::take_visual_frames`] drains them.
    pub store_visualization: bool,

    /// If `true`, rejected samples are sent to the visualizer.
    pub record_wrong_samples: bool,

    /// Time step of the root node.
    pub dt: f64,

    /// Parameters passed to [`Environment::recv_parameters`].
    pub parameters: Parameters,
}

impl<E: Environment> Clone for EnvironmentConfig<E> {
    fn clone(&self) -> Self {
        Self {
            env_config: self.env_config.clone(),
            environment_class: self.environment_class.clone(),
            environment_file: self.environment_file.clone(),
            worker_program: self.worker_program.clone(),
            as_tcp_ip_client: self.as_tcp_ip_client,
            number_of_thread: self.number_of_thread,
            ip_address: self.ip_address.clone(),
            port: self.port,
            simulations_per_step: self.simulations_per_step,
            max_wrong_samples_per_step: self.max_wrong_samples_per_step,
            load_samples: self.load_samples,
            visualizer: self.visualizer.clone(),
            store_visualization: self.store_visualization,
            record_wrong_samples: self.record_wrong_samples,
            dt: self.dt,
            parameters: self.parameters.clone(),
        }
    }
}

impl<E: Environment> Default for EnvironmentConfig<E>
where
    E::Config: Default,
{
    fn default() -> Self {
        Self::new(E::Config::default())
    }
}

impl<E: Environment> EnvironmentConfig<E> {
    /// Creates a configuration with default values.
    pub fn new(env_config: E::Config) -> Self {
        Self {
            env_config,
            environment_class: String::new(),
            environment_file: None,
            worker_program: None,
            as_tcp_ip_client: true,
            number_of_thread: 1,
            ip_address: "localhost".to_string(),
            port: 10000,
            simulations_per_step: 1,
            max_wrong_samples_per_step: 10,
            load_samples: false,
            visualizer: None,
            store_visualization: false,
            record_wrong_samples: false,
            dt: 0.01,
            parameters: Parameters::new(),
        }
    }

    /// Sets the registered name of the environment.
    pub fn environment_class(mut self, v: impl Into<String>) -> Self {
        self.environment_class = v.into();
        self
    }

    /// Sets the file workers read the environment configuration from.
    pub fn environment_file(mut self, v: impl Into<PathBuf>) -> Self {
        self.environment_file = Some(v.into());
        self
    }

    /// Sets the worker executable.
    pub fn worker_program(mut self, v: impl Into<PathBuf>) -> Self {
        self.worker_program = Some(v.into());
        self
    }

    /// Sets whether environments run in worker processes.
    pub fn as_tcp_ip_client(mut self, v: bool) -> Self {
        self.as_tcp_ip_client = v;
        self
    }

    /// Sets the number of worker processes.
    pub fn number_of_thread(mut self, v: usize) -> Self {
        self.number_of_thread = v;
        self
    }

    /// Sets the address of the manager.
    pub fn ip_address(mut self, v: impl Into<String>) -> Self {
        self.ip_address = v.into();
        self
    }

    /// Sets the port of the manager.
    pub fn port(mut self, v: u16) -> Self {
        self.port = v;
        self
    }

    /// Sets the number of animation steps per environment step.
    pub fn simulations_per_step(mut self, v: usize) -> Self {
        self.simulations_per_step = v;
        self
    }

    /// Sets the maximum number of rejected samples in a step.
    pub fn max_wrong_samples_per_step(mut self, v: usize) -> Self {
        self.max_wrong_samples_per_step = v;
        self
    }

    /// Sets whether dataset samples are replayed in the environment.
    pub fn load_samples(mut self, v: bool) -> Self {
        self.load_samples = v;
        self
    }

    /// Sets the visualizer backend.
    pub fn visualizer(mut self, v: Option<String>) -> Self {
        self.visualizer = v;
        self
    }

    /// Sets whether visualization updates are kept.
    pub fn store_visualization(mut self, v: bool) -> Self {
        self.store_visualization = v;
        self
    }

    /// Sets whether rejected samples are sent to the visualizer.
    pub fn record_wrong_samples(mut self, v: bool) -> Self {
        self.record_wrong_samples = v;
        self
    }

    /// Sets the time step of the root node.
    pub fn dt(mut self, v: f64) -> Self {
        self.dt = v;
        self
    }

    /// Sets the parameters passed to the environment.
    pub fn parameters(mut self, v: Parameters) -> Self {
        self.parameters = v;
        self
    }

    /// Constructs [`EnvironmentConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`EnvironmentConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }

    /// Writes `env_config` to `environment_file` for worker processes.
    pub fn save_env_config(&self) -> Result<(), BridgeError> {
        let path = self.environment_file.as_ref().ok_or_else(|| {
            BridgeError::Configuration("'environment_file' is not set".to_string())
        })?;
        let yaml = serde_yaml::to_string(&self.env_config)
            .map_err(|e| BridgeError::Configuration(e.to_string()))?;
        File::create(path)?.write_all(yaml.as_bytes())?;
        Ok(())
    }

    /// Checks the values of the configuration.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.simulations_per_step == 0 {
            return Err(BridgeError::Configuration(
                "'simulations_per_step' must be at least 1".to_string(),
            ));
        }
        if self.number_of_thread == 0 {
            return Err(BridgeError::Configuration(
                "'number_of_thread' must be at least 1".to_string(),
            ));
        }
        if self.dt.is_nan() || self.dt <= 0.0 {
            return Err(BridgeError::Configuration(format!(
                "'dt' must be positive, got {}",
                self.dt
            )));
        }
        Ok(())
    }

    /// Creates an environment owned by an in-process manager, on a [`StepEngine`].
    pub fn create_environment(&self) -> Result<SimEnvironment<E>, BridgeError> {
        self.create_environment_with_engine(StepEngine::default())
    }

    /// Creates an environment owned by an in-process manager.
    ///
    /// Runs the lifecycle up to dataset (and visualization) initialization.
    pub fn create_environment_with_engine<G: Engine>(
        &self,
        engine: G,
    ) -> Result<SimEnvironment<E, G>, BridgeError> {
        self.validate()?;
        let ids = InstanceIds::default();
        let mut env = EnvironmentBuilder::new(ids, Ownership::Manager)
            .simulations_per_step(self.simulations_per_step)
            .root(Node::new("root").with_dt(self.dt))
            .build_with_engine::<E, G>(&self.env_config, engine)?
            .recv_parameters(&self.parameters)?
            .create()?
            .init()?;
        env.init_database()?;
        if let Some(visualizer) = &self.visualizer {
            info!("Initializing visualization for '{}'", visualizer);
            let factory = VisualFactory::new(ids.instance_id, !self.store_visualization);
            env.init_visualization(factory)?;
        }
        Ok(env)
    }

    /// Settings sent to worker processes before they create their environments.
    pub fn worker_setup(&self) -> WorkerSetup {
        WorkerSetup {
            parameters: self.parameters.clone(),
            simulations_per_step: self.simulations_per_step,
            max_wrong_samples_per_step: self.max_wrong_samples_per_step,
            dt: self.dt,
        }
    }

    /// Command running worker `idx`.
    pub fn worker_command(&self, idx: usize) -> Result<WorkerCommand, BridgeError> {
        let missing = |name: &str| BridgeError::Configuration(format!("'{}' is not set", name));
        let program = self
            .worker_program
            .clone()
            .ok_or_else(|| missing("worker_program"))?;
        let environment_file = self
            .environment_file
            .clone()
            .ok_or_else(|| missing("environment_file"))?;
        Ok(WorkerCommand {
            program,
            args: LaunchArgs {
                environment_file,
                environment_class: self.environment_class.clone(),
                ip_address: self.ip_address.clone(),
                port: self.port,
                instance_id: idx,
                number_of_threads: self.number_of_thread,
            },
        })
    }

    /// Runs worker `idx` with `launcher` until it exits.
    pub fn start_client(
        &self,
        idx: usize,
        launcher: &dyn ProcessLauncher,
    ) -> Result<ExitStatus, BridgeError> {
        self.validate()?;
        let command = self.worker_command(idx)?;
        launcher.launch(&command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        testing::{Tracker, TrackerConfig},
        ParamValue,
    };
    use std::cell::RefCell;
    use tempdir::TempDir;

    #[cfg(unix)]
    fn success() -> ExitStatus {
        <ExitStatus as std::os::unix::process::ExitStatusExt>::from_raw(0)
    }

    #[cfg(windows)]
    fn success() -> ExitStatus {
        <ExitStatus as std::os::windows::process::ExitStatusExt>::from_raw(0)
    }

    /// Records the commands instead of running them.
    #[derive(Default)]
    struct Recorder(RefCell<Vec<WorkerCommand>>);

    impl ProcessLauncher for Recorder {
        fn launch(&self, command: &WorkerCommand) -> Result<ExitStatus, BridgeError> {
            self.0.borrow_mut().push(command.clone());
            Ok(success())
        }
    }

    fn config() -> EnvironmentConfig<Tracker> {
        let mut params = Parameters::new();
        params.insert("param1".to_string(), ParamValue::Int(10));
        EnvironmentConfig::new(TrackerConfig::default())
            .environment_class("Tracker")
            .number_of_thread(2)
            .port(10001)
            .parameters(params)
    }

    #[test]
    fn yaml_round_trip() -> Result<()> {
        let dir = TempDir::new("environment_config")?;
        let path = dir.path().join("config.yaml");
        let config = config().visualizer(Some("vedo".to_string())).dt(0.05);
        config.save(&path)?;

        let loaded = EnvironmentConfig::<Tracker>::load(&path)?;
        assert_eq!(loaded.environment_class, "Tracker");
        assert_eq!(loaded.number_of_thread, 2);
        assert_eq!(loaded.port, 10001);
        assert_eq!(loaded.visualizer.as_deref(), Some("vedo"));
        assert_eq!(loaded.parameters, config.parameters);
        assert_eq!(loaded.dt, 0.05);
        assert!(loaded.as_tcp_ip_client);
        Ok(())
    }

    #[test]
    fn defaults() {
        let config = EnvironmentConfig::<Tracker>::default();
        assert!(config.as_tcp_ip_client);
        assert_eq!(config.ip_address, "localhost");
        assert_eq!(config.port, 10000);
        assert_eq!(config.number_of_thread, 1);
        assert_eq!(config.simulations_per_step, 1);
        assert_eq!(config.max_wrong_samples_per_step, 10);
        assert!(!config.load_samples && !config.store_visualization);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(config().simulations_per_step(0).validate().is_err());
        assert!(config().number_of_thread(0).validate().is_err());
        assert!(config().dt(0.).validate().is_err());
        assert!(config().dt(f64::NAN).create_environment().is_err());
    }

    #[test]
    fn create_environment_runs_the_lifecycle() {
        let config = config().as_tcp_ip_client(false).simulations_per_step(2);
        let env = config.create_environment().unwrap();
        assert_eq!(env.ownership(), Ownership::Manager);
        assert_eq!(env.simulations_per_step(), 2);
        assert_eq!(env.env().log, vec!["recv_parameters", "create", "SimulationInitDone"]);
        assert_eq!(env.send_parameters(), config.parameters);
        assert!(env.visualization().is_none());

        let config = TrackerConfig {
            fail_build: true,
            ..TrackerConfig::default()
        };
        let err = EnvironmentConfig::<Tracker>::new(config)
            .create_environment()
            .err()
            .unwrap();
        assert!(matches!(err, BridgeError::Configuration(_)));
    }

    #[test]
    fn key_digit_scales_integer_parameters() {
        let mut params = Parameters::new();
        params.insert("param2".to_string(), ParamValue::Int(10));
        params.insert("param3".to_string(), ParamValue::Float(1.5));
        params.insert("name".to_string(), ParamValue::Int(7));
        let env = config()
            .as_tcp_ip_client(false)
            .parameters(params)
            .create_environment()
            .unwrap();

        let sent = env.send_parameters();
        assert_eq!(sent["param2"], ParamValue::Int(20));
        assert_eq!(sent["param3"], ParamValue::Float(1.5));
        assert_eq!(sent["name"], ParamValue::Int(7));
    }

    #[test]
    fn worker_setup_carries_the_step_settings() {
        let setup = config()
            .simulations_per_step(3)
            .max_wrong_samples_per_step(4)
            .dt(0.5)
            .worker_setup();
        assert_eq!(setup.simulations_per_step, 3);
        assert_eq!(setup.max_wrong_samples_per_step, 4);
        assert_eq!(setup.dt, 0.5);
        assert_eq!(setup.parameters["param1"], ParamValue::Int(10));
        assert_eq!(WorkerSetup::default().dt, EnvironmentConfig::<Tracker>::default().dt);
    }

    #[test]
    fn worker_command_needs_program_and_file() {
        let err = config().worker_command(1).unwrap_err();
        assert!(matches!(err, BridgeError::Configuration(_)));
        let err = config().worker_program("worker").worker_command(1).unwrap_err();
        assert!(matches!(err, BridgeError::Configuration(_)));

        let command = config()
            .worker_program("worker")
            .environment_file("env.yaml")
            .worker_command(2)
            .unwrap();
        assert_eq!(
            command.args.to_args(),
            vec!["env.yaml", "Tracker", "localhost", "10001", "2", "2"]
        );
    }

    #[test]
    fn start_client_hands_the_command_to_the_launcher() -> Result<()> {
        let dir = TempDir::new("start_client")?;
        let env_file = dir.path().join("tracker.yaml");
        let cfg = config()
            .worker_program("worker")
            .environment_file(&env_file);
        cfg.save_env_config()?;
        let saved: TrackerConfig = serde_yaml::from_reader(File::open(&env_file)?)?;
        assert_eq!(saved.reject, 0);

        let launcher = Recorder::default();
        assert!(cfg.start_client(1, &launcher)?.success());
        cfg.start_client(2, &launcher)?;
        let ids: Vec<_> = launcher.0.borrow().iter().map(|c| c.args.instance_id).collect();
        assert_eq!(ids, vec![1, 2]);

        let err = config().start_client(1, &launcher).unwrap_err();
        assert!(matches!(err, BridgeError::Configuration(_)));
        Ok(())
    }
}
