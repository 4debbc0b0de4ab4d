//! Worker process running a registered environment.
//!
//! ```text
//! simbridge-worker <environment_file> <environment_class> <ip_address> <port> <instance_id> <number_of_threads>
//! ```
use simbridge::{
    demo::{MeanEnvironment, MEAN_ENVIRONMENT},
    tcp::{run_launcher, WorkerRegistry},
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let argv: Vec<String> = std::env::args().collect();
    let registry = WorkerRegistry::new().register::<MeanEnvironment>(MEAN_ENVIRONMENT);
    std::process::exit(run_launcher(&argv, &registry));
}
