//! Entry point of worker processes.
use crate::client::run_worker;
use log::{error, info};
use simbridge_core::{BridgeError, Environment, LaunchArgs};
use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

type WorkerMain = Box<dyn Fn(&LaunchArgs) -> Result<(), BridgeError>>;

/// Maps environment class names to worker entry points.
#[derive(Default)]
pub struct WorkerRegistry {
    workers: BTreeMap<String, WorkerMain>,
}

impl WorkerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers environment `E` under `name`.
    ///
    /// The worker reads the configuration of `E` from the environment file
    /// given on the command line.
    pub fn register<E: Environment + 'static>(mut self, name: impl Into<String>) -> Self {
        self.workers.insert(name.into(), Box::new(run::<E>));
        self
    }

    /// Registered class names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.workers.keys().map(String::as_str)
    }

    fn get(&self, name: &str) -> Option<&WorkerMain> {
        self.workers.get(name)
    }
}

fn load_env_config<E: Environment>(path: &Path) -> Result<E::Config, BridgeError> {
    let rdr = BufReader::new(File::open(path)?);
    serde_yaml::from_reader(rdr).map_err(|e| {
        BridgeError::Configuration(format!("cannot read {}: {}", path.display(), e))
    })
}

fn run<E: Environment>(args: &LaunchArgs) -> Result<(), BridgeError> {
    let config = load_env_config::<E>(&args.environment_file)?;
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(run_worker::<E>(&args.address(), args.ids(), &config))
}

/// Runs the worker described by the command line `argv`.
///
/// `argv` holds the program name followed by the environment file, the
/// environment class, the address and port of the manager, the instance id
/// and the number of workers. Returns the exit status of the process.
pub fn run_launcher(argv: &[String], registry: &WorkerRegistry) -> i32 {
    let args = match LaunchArgs::parse(argv) {
        Ok(args) => args,
        Err(e) => {
            println!("{}", e);
            return 1;
        }
    };

    let worker = match registry.get(&args.environment_class) {
        Some(worker) => worker,
        None => {
            error!(
                "Unknown environment class '{}', expected one of {:?}",
                args.environment_class,
                registry.names().collect::<Vec<_>>()
            );
            return 1;
        }
    };

    info!(
        "Starting worker {}/{} of '{}'",
        args.instance_id, args.number_of_threads, args.environment_class
    );
    match worker(&args) {
        Ok(()) => 0,
        Err(e) => {
            error!("Worker {} failed: {}", args.instance_id, e);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn missing_arguments_exit_with_one() {
        let registry = WorkerRegistry::new();
        assert_eq!(run_launcher(&argv(&["worker", "env.yaml"]), &registry), 1);
    }

    #[test]
    fn unknown_class_exits_with_one() {
        let registry = WorkerRegistry::new();
        let argv = argv(&["worker", "env.yaml", "Beam", "localhost", "10000", "1", "1"]);
        assert_eq!(run_launcher(&argv, &registry), 1);
    }
}
