use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer};
use anyhow::Context;
use tracing::{info, warn};

use pulse_core::{buildinfo, crypto, PulseError};

mod config;
mod grpc;
mod http;
mod service;
mod shutdown;
mod storage;

use config::DaemonConfig;
use http::HttpConfig;
use service::MetricsService;
use storage::{MemoryStorage, PostgresStorage, Repository};

const SHUTDOWN_TIMEOUT_SECS: u64 = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    buildinfo::print_build_info();

    let config = DaemonConfig::load()?;
    pulse_core::init_observability(&config.log_level)?;

    info!("server started");

    let private_key = match &config.crypto_key {
        Some(path) => {
            let pem = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read private key {path:?}"))?;
            Some(Arc::new(crypto::load_private_key(&pem)?))
        }
        None => None,
    };

    // A non-empty DSN selects the relational backend; the memory backend
    // keeps an extra handle for the final snapshot.
    let mut memory: Option<Arc<MemoryStorage>> = None;
    let mut postgres: Option<Arc<PostgresStorage>> = None;

    let repo: Arc<dyn Repository> = match &config.database_dsn {
        Some(dsn) => {
            let storage = PostgresStorage::new(dsn)?;
            storage.initialize().await?;

            let storage = Arc::new(storage);
            postgres = Some(Arc::clone(&storage));
            storage
        }
        None => {
            let storage = Arc::new(MemoryStorage::new(config.storage.clone())?);
            memory = Some(Arc::clone(&storage));
            storage
        }
    };

    let service = MetricsService::new(repo);
    let http_config = HttpConfig {
        key: config.key.clone(),
        private_key,
        trusted_subnet: config.trusted_subnet,
    };

    let shutdown = shutdown::shutdown_signal();

    let server = {
        let service = service.clone();
        let http_config = http_config.clone();

        HttpServer::new(move || {
            App::new().configure(http::configure(service.clone(), http_config.clone()))
        })
        .bind(&config.address)
        .with_context(|| format!("failed to bind {}", config.address))?
        .shutdown_timeout(SHUTDOWN_TIMEOUT_SECS)
        .run()
    };

    info!(address = %config.address, "http listener ready");

    {
        let handle = server.handle();
        let mut rx = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = rx.recv().await;
            handle.stop(true).await;
        });
    }

    let grpc_task = match &config.grpc_address {
        Some(address) => {
            let addr: SocketAddr = address.parse().map_err(|e| PulseError::InvalidConfig {
                reason: format!("bad grpc address {address:?}: {e}"),
            })?;

            let svc = grpc::MetricsGrpc::new(service.clone()).into_server();
            let mut rx = shutdown.subscribe();

            info!(address = %addr, "grpc listener ready");

            Some(tokio::spawn(async move {
                tonic::transport::Server::builder()
                    .add_service(svc)
                    .serve_with_shutdown(addr, async move {
                        let _ = rx.recv().await;
                    })
                    .await
            }))
        }
        None => None,
    };

    server.await.context("http server failed")?;

    // The gRPC listener gets the same 5 s drain deadline as the HTTP one; a
    // stuck in-flight RPC must not hang shutdown.
    if let Some(task) = grpc_task {
        match tokio::time::timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), task).await {
            Ok(result) => result?.context("grpc server failed")?,
            Err(_) => warn!("grpc listener did not drain within the shutdown deadline"),
        }
    }

    if let Some(storage) = postgres {
        storage.close().await;
    }

    // Drain the snapshot worker, then persist once more. A failed final
    // snapshot is fatal and yields a non-zero exit.
    if let Some(storage) = memory {
        storage.wait().await;
        storage.save().await.context("final snapshot failed")?;
    }

    info!("server terminated");
    Ok(())
}
