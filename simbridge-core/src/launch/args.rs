use crate::{base::InstanceIds, BridgeError};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr};

/// Usage message of worker launchers.
pub const USAGE: &str = "<environment_file> <environment_class> <ip_address> <port> \
                         <instance_id> <number_of_threads>";

/// Number of positional arguments, including the program name.
const N_ARGS: usize = 7;

/// Positional arguments of a worker process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchArgs {
    /// YAML file with the configuration of the environment.
    pub environment_file: PathBuf,

    /// Name under which the environment is registered in the worker.
    pub environment_class: String,

    /// Address of the manager.
    pub ip_address: String,

    /// Port of the manager.
    pub port: u16,

    /// Id of the worker, starting at 1.
    pub instance_id: usize,

    /// Number of simultaneously launched workers.
    pub number_of_threads: usize,
}

impl LaunchArgs {
    /// Arguments in launch order, without the program name.
    pub fn to_args(&self) -> Vec<String> {
        vec![
            self.environment_file.display().to_string(),
            self.environment_class.clone(),
            self.ip_address.clone(),
            self.port.to_string(),
            self.instance_id.to_string(),
            self.number_of_threads.to_string(),
        ]
    }

    /// Parses a command line, program name included.
    ///
    /// Exactly seven items are expected.
    pub fn parse<I, S>(argv: I) -> Result<Self, BridgeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let argv: Vec<String> = argv.into_iter().map(|s| s.as_ref().to_string()).collect();
        if argv.len() != N_ARGS {
            let program = argv.first().map(String::as_str).unwrap_or("launcher");
            return Err(BridgeError::Usage(format!("{} {}", program, USAGE)));
        }

        Ok(Self {
            environment_file: PathBuf::from(&argv[1]),
            environment_class: argv[2].clone(),
            ip_address: argv[3].clone(),
            port: parse_arg(&argv[4], "port")?,
            instance_id: parse_arg(&argv[5], "instance_id")?,
            number_of_threads: parse_arg(&argv[6], "number_of_threads")?,
        })
    }

    /// Address of the manager, `ip:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip_address, self.port)
    }

    /// Instance ids of the worker.
    pub fn ids(&self) -> InstanceIds {
        InstanceIds::new(self.instance_id, self.number_of_threads)
    }
}

fn parse_arg<T: FromStr>(s: &str, name: &str) -> Result<T, BridgeError> {
    s.parse()
        .map_err(|_| BridgeError::Usage(format!("invalid {}: '{}'", name, s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv() -> Vec<&'static str> {
        vec!["worker", "env.yaml", "MeanEnvironment", "localhost", "10000", "2", "4"]
    }

    #[test]
    fn parse_round_trip() {
        let args = LaunchArgs::parse(argv()).unwrap();
        assert_eq!(args.port, 10000);
        assert_eq!(args.ids(), InstanceIds::new(2, 4));
        assert_eq!(args.address(), "localhost:10000");
        assert_eq!(args.to_args(), argv()[1..].to_vec());
    }

    #[test]
    fn wrong_count_is_a_usage_error() {
        let err = LaunchArgs::parse(&argv()[..6]).unwrap_err();
        assert!(matches!(err, BridgeError::Usage(ref m) if m.starts_with("worker ")));
        let mut long = argv();
        long.push("extra");
        assert!(matches!(LaunchArgs::parse(long), Err(BridgeError::Usage(_))));
    }

    #[test]
    fn port_must_be_a_number() {
        let mut bad = argv();
        bad[4] = "http";
        assert!(matches!(LaunchArgs::parse(bad), Err(BridgeError::Usage(_))));
    }
}
