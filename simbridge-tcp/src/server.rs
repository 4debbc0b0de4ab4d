//! Manager side of the connection.
use crate::{
    codec::{read_frame, write_frame},
    ManagerMessage, WorkerMessage, WorkerSetup,
};
use anyhow::anyhow;
use crossbeam_channel::unbounded;
use log::{info, trace, warn};
use ndarray::ArrayD;
use simbridge_core::{pipeline::Network, BridgeError, Parameters, Prediction, Sample};
use std::{
    collections::BTreeMap,
    net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
};

/// Connection to one worker.
struct WorkerLink {
    instance_id: usize,
    stream: TcpStream,
}

/// Serves samples produced by [`TcpIpClient`]s running in worker processes.
///
/// [`TcpIpClient`]: crate::TcpIpClient
pub struct TcpIpServer {
    listener: TcpListener,
    workers: Vec<WorkerLink>,
    network: Option<Box<dyn Network>>,
}

impl TcpIpServer {
    /// Binds the listening socket.
    pub fn bind(addr: impl ToSocketAddrs) -> Result<Self, BridgeError> {
        let listener = TcpListener::bind(addr)?;
        info!("Manager listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            workers: vec![],
            network: None,
        })
    }

    /// Address of the listening socket.
    pub fn local_addr(&self) -> Result<SocketAddr, BridgeError> {
        Ok(self.listener.local_addr()?)
    }

    /// Number of connected workers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Returns `true` if no worker is connected.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Accepts `n` workers and sends them `setup`.
    ///
    /// Returns the parameters sent back by the workers, ordered by instance id.
    pub fn connect(
        &mut self,
        n: usize,
        setup: &WorkerSetup,
    ) -> Result<Vec<(usize, Parameters)>, BridgeError> {
        for _ in 0..n {
            let (mut stream, addr) = self.listener.accept()?;
            stream.set_nodelay(true)?;
            let instance_id = match read_frame(&mut stream)? {
                WorkerMessage::Hello { instance_id, .. } => instance_id,
                msg => {
                    return Err(BridgeError::Protocol(format!(
                        "expected a greeting from {}, got {:?}",
                        addr, msg
                    )))
                }
            };
            if self.workers.iter().any(|w| w.instance_id == instance_id) {
                return Err(BridgeError::Protocol(format!(
                    "worker {} is already connected",
                    instance_id
                )));
            }
            info!("Worker {} connected from {}", instance_id, addr);
            self.workers.push(WorkerLink {
                instance_id,
                stream,
            });
        }
        self.workers.sort_by_key(|w| w.instance_id);

        for w in self.workers.iter_mut() {
            write_frame(&mut w.stream, &ManagerMessage::Setup(setup.clone()))?;
        }
        self.workers
            .iter_mut()
            .map(|w| match read_frame(&mut w.stream)? {
                WorkerMessage::Parameters(params) => Ok((w.instance_id, params)),
                msg => Err(BridgeError::Protocol(format!(
                    "expected parameters from worker {}, got {:?}",
                    w.instance_id, msg
                ))),
            })
            .collect()
    }

    /// Sets the network answering the prediction requests of the workers.
    pub fn set_network<N: Network + 'static>(&mut self, network: N) {
        self.network = Some(Box::new(network));
    }

    /// Requests one sample from every worker.
    ///
    /// Workers produce their samples concurrently and may request predictions
    /// meanwhile. Samples are ordered by instance id. Every worker that was
    /// asked is read before returning, and workers whose connection is lost
    /// are dropped.
    pub fn get_samples(&mut self) -> Result<Vec<Sample>, BridgeError> {
        let mut replies = BTreeMap::new();
        let mut asked = vec![];
        for w in self.workers.iter_mut() {
            let res = write_frame(&mut w.stream, &ManagerMessage::Step)
                .and_then(|_| Ok(w.stream.try_clone()?));
            match res {
                Ok(stream) => asked.push((w.instance_id, stream)),
                Err(e) => {
                    replies.insert(w.instance_id, Err(e));
                }
            }
        }

        let (s, r) = unbounded();
        let threads = asked
            .into_iter()
            .map(|(instance_id, mut stream)| {
                let sender = s.clone();
                std::thread::spawn(move || loop {
                    let reply = read_frame::<_, WorkerMessage>(&mut stream);
                    let done = !matches!(reply, Ok(WorkerMessage::PredictionRequest(_)));
                    // The receiver outlives the threads.
                    let _ = sender.send((instance_id, reply));
                    if done {
                        break;
                    }
                })
            })
            .collect::<Vec<_>>();
        drop(s);

        for (id, reply) in r.iter() {
            match reply {
                Ok(WorkerMessage::PredictionRequest(input)) => {
                    if let Err(e) = self.answer(id, &input) {
                        replies.insert(id, Err(e));
                    }
                }
                reply => {
                    replies.entry(id).or_insert(reply);
                }
            }
        }
        for t in threads {
            t.join()
                .map_err(|_| BridgeError::runtime(anyhow!("a receiving thread panicked")))?;
        }

        let lost = replies
            .iter()
            .filter(|(_, reply)| matches!(reply, Err(BridgeError::Io(_))))
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        if !lost.is_empty() {
            warn!("Lost the connection to workers {:?}", lost);
            self.workers.retain(|w| !lost.contains(&w.instance_id));
        }

        replies
            .into_iter()
            .map(|(id, reply)| match reply? {
                WorkerMessage::Sample(sample) => {
                    trace!("Received a sample from worker {}", id);
                    Ok(sample)
                }
                WorkerMessage::WrongSample => Err(BridgeError::runtime(anyhow!(
                    "worker {} produced only wrong samples",
                    id
                ))),
                msg => Err(BridgeError::Protocol(format!(
                    "expected a sample from worker {}, got {:?}",
                    id, msg
                ))),
            })
            .collect()
    }

    /// Answers a prediction request of worker `instance_id`.
    fn answer(&mut self, instance_id: usize, input: &ArrayD<f32>) -> Result<(), BridgeError> {
        let reply = match self.network.as_mut().map(|n| n.predict(input)) {
            Some(Ok(prediction)) => ManagerMessage::Prediction(prediction),
            Some(Err(e)) => {
                warn!("Prediction for worker {} failed: {}", instance_id, e);
                ManagerMessage::PredictionUnavailable
            }
            None => {
                warn!("Worker {} requested a prediction without network", instance_id);
                ManagerMessage::PredictionUnavailable
            }
        };
        write_frame(&mut self.worker_mut(instance_id)?.stream, &reply)
    }

    fn worker_mut(&mut self, instance_id: usize) -> Result<&mut WorkerLink, BridgeError> {
        self.workers
            .iter_mut()
            .find(|w| w.instance_id == instance_id)
            .ok_or_else(|| BridgeError::Configuration(format!("no worker with id {}", instance_id)))
    }

    /// Sends a prediction to be applied by worker `instance_id`.
    pub fn send_prediction(
        &mut self,
        instance_id: usize,
        prediction: &Prediction,
    ) -> Result<(), BridgeError> {
        let w = self.worker_mut(instance_id)?;
        write_frame(&mut w.stream, &ManagerMessage::Prediction(prediction.clone()))
    }

    /// Releases all workers and waits for them to close their environments.
    pub fn close(&mut self) -> Result<(), BridgeError> {
        for w in self.workers.iter_mut() {
            write_frame(&mut w.stream, &ManagerMessage::Exit)?;
        }
        for mut w in self.workers.drain(..) {
            match read_frame(&mut w.stream)? {
                WorkerMessage::Closed => info!("Worker {} closed", w.instance_id),
                msg => {
                    return Err(BridgeError::Protocol(format!(
                        "expected worker {} to close, got {:?}",
                        w.instance_id, msg
                    )))
                }
            }
        }
        Ok(())
    }
}
