use anyhow::{anyhow, Result};
use clap::Parser;
use log::info;
use simbridge::{
    core::{
        pipeline::{Runner, StepLimit},
        EnvironmentConfig, EnvironmentManager, SubprocessLauncher,
    },
    demo::{MeanEnvironment, MeanEnvironmentConfig, MeanNetwork, MEAN_ENVIRONMENT},
    tcp::TcpIpServer,
};
use std::path::PathBuf;
use tempdir::TempDir;

const N_POINTS: usize = 30;
const DIM: usize = 3;

/// Produces samples of the mean of random point clouds.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Generate data with worker processes
    #[arg(short, long, default_value_t = false)]
    data: bool,

    /// Record visualization snapshots
    #[arg(short, long, default_value_t = false)]
    visualize: bool,

    /// Number of worker processes
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Number of samples, or of batches with worker processes
    #[arg(long, default_value_t = 10)]
    samples: usize,

    /// Worker executable, next to the examples directory by default
    #[arg(long)]
    worker_program: Option<PathBuf>,
}

fn env_config() -> MeanEnvironmentConfig {
    MeanEnvironmentConfig::default().data_size(N_POINTS, DIM)
}

fn default_worker_program() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe
        .parent()
        .and_then(|p| p.parent())
        .ok_or_else(|| anyhow!("cannot locate the target directory"))?;
    Ok(dir.join(format!("simbridge-worker{}", std::env::consts::EXE_SUFFIX)))
}

/// Runs the mean network on an in-process environment.
async fn predict(n_steps: usize) -> Result<f32> {
    let config = EnvironmentConfig::<MeanEnvironment>::new(env_config()).as_tcp_ip_client(false);
    let env = config.create_environment()?;
    let manager = StepLimit::new(MeanNetwork, Some(n_steps))
        .record_inputs(true)
        .record_outputs(true);
    let mut runner = Runner::new(env, manager)?;
    runner.execute().await?;
    let manager = runner.close()?;

    let mut error = 0f32;
    for (input, truth) in manager.inputs().iter().zip(manager.outputs()) {
        let center = input
            .mean_axis(ndarray::Axis(0))
            .ok_or_else(|| anyhow!("empty input"))?;
        error += (&center - &truth.index_axis(ndarray::Axis(0), 0))
            .mapv(f32::abs)
            .sum();
    }
    let error = error / n_steps.max(1) as f32;
    info!("Mean absolute error over {} steps: {}", n_steps, error);
    Ok(error)
}

/// Produces samples in-process and keeps visualization snapshots.
async fn visualize(n_samples: usize) -> Result<usize> {
    let config = EnvironmentConfig::<MeanEnvironment>::new(env_config())
        .as_tcp_ip_client(false)
        .visualizer(Some("snapshot".to_string()))
        .store_visualization(true);
    let mut manager = EnvironmentManager::new(&config)?;
    manager.get_samples(n_samples).await?;

    let mut env = manager.close()?;
    let frames = env.take_visual_frames();
    for (i, frame) in frames.iter().enumerate() {
        for update in frame {
            info!(
                "Frame {}, object {}: {} positions",
                i,
                update.id,
                update.positions.len() / DIM
            );
        }
    }
    Ok(frames.len())
}

/// Produces batches of samples with worker processes.
fn generate(args: &Args) -> Result<()> {
    let dir = TempDir::new("mean_env")?;
    let mut server = TcpIpServer::bind("127.0.0.1:0")?;
    let worker_program = match &args.worker_program {
        Some(p) => p.clone(),
        None => default_worker_program()?,
    };
    let config = EnvironmentConfig::<MeanEnvironment>::new(env_config())
        .environment_class(MEAN_ENVIRONMENT)
        .environment_file(dir.path().join("mean_env.yaml"))
        .worker_program(worker_program)
        .ip_address("127.0.0.1")
        .port(server.local_addr()?.port())
        .number_of_thread(args.workers);
    config.validate()?;
    config.save_env_config()?;

    let clients = (1..=args.workers)
        .map(|idx| {
            let config = config.clone();
            std::thread::spawn(move || config.start_client(idx, &SubprocessLauncher))
        })
        .collect::<Vec<_>>();

    server.connect(args.workers, &config.worker_setup())?;
    for batch in 0..args.samples {
        let samples = server.get_samples()?;
        info!("Batch {}: {} samples", batch, samples.len());
    }
    server.close()?;

    for client in clients {
        let status = client
            .join()
            .map_err(|_| anyhow!("a client thread panicked"))??;
        info!("Worker exited with {}", status);
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.data {
        generate(&args)?;
    } else if args.visualize {
        visualize(args.samples).await?;
    } else {
        predict(args.samples).await?;
    }

    Ok(())
}
