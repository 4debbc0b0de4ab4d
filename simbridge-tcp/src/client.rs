//! Worker side of the connection.
use crate::{
    codec::{read_frame, write_frame},
    ManagerMessage, WorkerMessage, WorkerSetup,
};
use anyhow::anyhow;
use log::{debug, info, warn};
use ndarray::ArrayD;
use simbridge_core::{
    pipeline::Network, BridgeError, Engine, Environment, EnvironmentBuilder, InstanceIds, Node,
    Ownership, Prediction, SimEnvironment, StepEngine,
};
use std::net::{TcpStream, ToSocketAddrs};

/// Forwards the prediction requests of the environment to the manager.
///
/// Requests are only made while a step is computed, when the manager waits
/// for the reply of the worker.
struct ManagerNetwork {
    stream: TcpStream,
}

impl Network for ManagerNetwork {
    fn predict(&mut self, input: &ArrayD<f32>) -> anyhow::Result<Prediction> {
        write_frame(&mut self.stream, &WorkerMessage::PredictionRequest(input.clone()))?;
        match read_frame(&mut self.stream)? {
            ManagerMessage::Prediction(prediction) => Ok(prediction),
            ManagerMessage::PredictionUnavailable => Err(anyhow!("the manager has no network")),
            msg => Err(anyhow!("expected a prediction, got {:?}", msg)),
        }
    }
}

/// Runs an environment in a worker process on behalf of a [`TcpIpServer`].
///
/// The lifecycle is:
/// 1. [`TcpIpClient::connect`] sends the instance ids.
/// 2. [`TcpIpClient::initialize`] receives the [`WorkerSetup`], creates the
///    environment and sends back its parameters.
/// 3. [`TcpIpClient::launch`] serves requests until the manager sends
///    [`ManagerMessage::Exit`].
///
/// [`TcpIpServer`]: crate::TcpIpServer
pub struct TcpIpClient<E: Environment, G: Engine = StepEngine> {
    stream: TcpStream,
    ids: InstanceIds,
    env: Option<SimEnvironment<E, G>>,
    max_wrong_samples_per_step: usize,
}

impl<E: Environment, G: Engine> TcpIpClient<E, G> {
    /// Connects to the manager and introduces the worker.
    pub fn connect(addr: impl ToSocketAddrs, ids: InstanceIds) -> Result<Self, BridgeError> {
        let mut stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        write_frame(
            &mut stream,
            &WorkerMessage::Hello {
                instance_id: ids.instance_id,
                instance_nb: ids.instance_nb,
            },
        )?;
        info!("Worker {}/{} connected", ids.instance_id, ids.instance_nb);
        Ok(Self {
            stream,
            ids,
            env: None,
            max_wrong_samples_per_step: 10,
        })
    }

    /// Instance ids of the worker.
    pub fn ids(&self) -> InstanceIds {
        self.ids
    }

    /// The environment, once initialized.
    pub fn environment(&self) -> Option<&SimEnvironment<E, G>> {
        self.env.as_ref()
    }

    /// Creates the environment on `engine` with the setup sent by the manager.
    pub fn initialize_with_engine(
        &mut self,
        config: &E::Config,
        engine: G,
    ) -> Result<(), BridgeError> {
        if self.env.is_some() {
            return Err(BridgeError::Lifecycle(format!(
                "worker {} is already initialized",
                self.ids.instance_id
            )));
        }
        let setup = match read_frame(&mut self.stream)? {
            ManagerMessage::Setup(setup) => setup,
            msg => {
                return Err(BridgeError::Protocol(format!(
                    "expected a setup, got {:?}",
                    msg
                )))
            }
        };
        let WorkerSetup {
            parameters,
            simulations_per_step,
            max_wrong_samples_per_step,
            dt,
        } = setup;

        let mut env = EnvironmentBuilder::new(self.ids, Ownership::TcpIpClient)
            .simulations_per_step(simulations_per_step)
            .root(Node::new("root").with_dt(dt))
            .build_with_engine::<E, G>(config, engine)?
            .recv_parameters(&parameters)?
            .create()?
            .init()?;
        env.init_database()?;
        env.save_parameters(parameters);
        env.set_network(ManagerNetwork {
            stream: self.stream.try_clone()?,
        });
        write_frame(&mut self.stream, &WorkerMessage::Parameters(env.send_parameters()))?;

        self.max_wrong_samples_per_step = max_wrong_samples_per_step;
        self.env = Some(env);
        info!("Worker {} initialized", self.ids.instance_id);
        Ok(())
    }

    /// Serves the requests of the manager until it sends [`ManagerMessage::Exit`].
    pub async fn launch(&mut self) -> Result<(), BridgeError> {
        let env = self.env.as_mut().ok_or_else(|| {
            BridgeError::Lifecycle("the worker must be initialized before launch".to_string())
        })?;

        loop {
            match read_frame(&mut self.stream)? {
                ManagerMessage::Step => {
                    let reply = Self::produce(env, self.max_wrong_samples_per_step).await?;
                    write_frame(&mut self.stream, &reply)?;
                }
                ManagerMessage::Prediction(prediction) => env.apply_prediction(&prediction)?,
                ManagerMessage::Exit => {
                    env.close()?;
                    write_frame(&mut self.stream, &WorkerMessage::Closed)?;
                    info!("Worker {} closed", self.ids.instance_id);
                    return Ok(());
                }
                ManagerMessage::Setup(_) => {
                    return Err(BridgeError::Protocol(format!(
                        "worker {} received a second setup",
                        self.ids.instance_id
                    )))
                }
                ManagerMessage::PredictionUnavailable => {
                    return Err(BridgeError::Protocol(format!(
                        "worker {} received an answer to no request",
                        self.ids.instance_id
                    )))
                }
            }
        }
    }

    /// Steps until a valid sample is produced or too many are rejected.
    async fn produce(
        env: &mut SimEnvironment<E, G>,
        max_wrong: usize,
    ) -> Result<WorkerMessage, BridgeError> {
        let mut wrong = 0;
        loop {
            env.step().await?;
            if env.check_sample() {
                debug!("Worker {} produced a sample", env.ids().instance_id);
                return Ok(WorkerMessage::Sample(env.sample()));
            }
            wrong += 1;
            warn!(
                "Worker {} rejected a sample ({}/{})",
                env.ids().instance_id,
                wrong,
                max_wrong
            );
            if wrong >= max_wrong {
                return Ok(WorkerMessage::WrongSample);
            }
        }
    }
}

impl<E: Environment> TcpIpClient<E> {
    /// Creates the environment with the setup sent by the manager.
    pub fn initialize(&mut self, config: &E::Config) -> Result<(), BridgeError> {
        self.initialize_with_engine(config, StepEngine::default())
    }
}

/// Connects, initializes and serves a worker until the manager releases it.
pub async fn run_worker<E: Environment>(
    addr: &str,
    ids: InstanceIds,
    config: &E::Config,
) -> Result<(), BridgeError> {
    let mut client = TcpIpClient::<E>::connect(addr, ids)?;
    client.initialize(config)?;
    client.launch().await.map_err(|e| match e {
        BridgeError::Io(e) => BridgeError::runtime(anyhow!("connection to the manager lost: {}", e)),
        e => e,
    })
}
