//! Graceful shutdown handling for pulsed.
//!
//! Listeners subscribe to a broadcast channel that fires when the process
//! receives SIGINT, SIGTERM or SIGQUIT.

use tokio::sync::broadcast;
use tracing::info;

/// Create a shutdown signal sender.
///
/// Every listener subscribes; the channel fires once on the first signal.
pub fn shutdown_signal() -> broadcast::Sender<()> {
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
