//! Agent lifecycle.
//!
//! Three long-lived tasks share one storage: the runtime poller, the host
//! poller and the reporter, each driven by its own ticker. A signal closes a
//! broadcast channel; every task exits at its next tick boundary and the run
//! loop joins all three before returning.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::info;

use pulse_core::{crypto, Result};

use crate::config::{AgentConfig, TransportTarget};
use crate::reporter::Reporter;
use crate::sampler::{HostSampler, RuntimeSampler};
use crate::storage::Storage;
use crate::transport::{GrpcTransport, HttpTransport, Transport};

/// The metric agent.
pub struct Agent {
    config: AgentConfig,
    storage: Arc<Storage>,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        Self { config, storage: Arc::new(Storage::new()) }
    }

    async fn build_transport(&self) -> Result<Box<dyn Transport>> {
        let public_key = match &self.config.crypto_key {
            Some(path) => {
                let pem = std::fs::read_to_string(path)?;
                Some(crypto::load_public_key(&pem)?)
            }
            None => None,
        };

        match &self.config.target {
            TransportTarget::Http(address) => {
                let transport = HttpTransport::new(address, self.config.key.clone(), public_key)?;
                Ok(Box::new(transport))
            }
            TransportTarget::Grpc(address) => {
                let transport = GrpcTransport::connect(address).await?;
                Ok(Box::new(transport))
            }
        }
    }

    /// Run the agent until a termination signal arrives.
    pub async fn run(self) -> Result<()> {
        info!("agent started");

        let transport = self.build_transport().await?;
        let reporter = Reporter::new(Arc::clone(&self.storage), transport);

        let shutdown = shutdown_signal();

        let runtime_task = spawn_runtime_poller(
            RuntimeSampler::new(Arc::clone(&self.storage)),
            self.config.poll_interval,
            shutdown.subscribe(),
        );
        let host_task = spawn_host_poller(
            HostSampler::new(Arc::clone(&self.storage)),
            self.config.poll_interval,
            shutdown.subscribe(),
        );
        let report_task = spawn_reporter(reporter, self.config.report_interval, shutdown.subscribe());

        for task in [runtime_task, host_task, report_task] {
            let _ = task.await;
        }

        info!("agent terminated");
        Ok(())
    }
}

fn spawn_runtime_poller(
    mut sampler: RuntimeSampler,
    period: std::time::Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => sampler.poll(),
                _ = shutdown.recv() => {
                    info!("poller terminated");
                    return;
                }
            }
        }
    })
}

fn spawn_host_poller(
    mut sampler: HostSampler,
    period: std::time::Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => sampler.poll(),
                _ = shutdown.recv() => {
                    info!("host poller terminated");
                    return;
                }
            }
        }
    })
}

fn spawn_reporter(
    reporter: Reporter,
    period: std::time::Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.tick().await;

        loop {
            tokio::select! {
                // An in-flight request finishes before the shutdown branch
                // can be taken; the task exits at the next loop turn.
                _ = ticker.tick() => reporter.report().await,
                _ = shutdown.recv() => {
                    info!("reporter terminated");
                    return;
                }
            }
        }
    })
}

/// Broadcast a shutdown signal on SIGINT, SIGTERM or SIGQUIT.
fn shutdown_signal() -> broadcast::Sender<()> {
    let (tx, _) = broadcast::channel(1);
    let sender = tx.clone();

    tokio::spawn(async move {
        let ctrl_c = async {
            tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(unix)]
        let quit = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::quit())
                .expect("failed to install SIGQUIT handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        #[cfg(not(unix))]
        let quit = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("received SIGINT"),
            _ = terminate => info!("received SIGTERM"),
            _ = quit => info!("received SIGQUIT"),
        }

        let _ = sender.send(());
    });

    tx
}
