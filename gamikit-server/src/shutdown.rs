//! Signal handling for graceful shutdown.

use tokio::signal::unix::{SignalKind, signal};

/// Creates a future that completes when a shutdown signal is received.
///
/// Listens for SIGTERM and SIGINT (Ctrl+C). If the SIGTERM handler cannot
/// be installed, only Ctrl+C is awaited.
pub async fn shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => Some(sigterm),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install SIGTERM handler");
            None
        }
    };

    let terminate = async {
        match sigterm.as_mut() {
            Some(sigterm) => {
                sigterm.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => tracing::info!("Received SIGINT, initiating graceful shutdown"),
                Err(e) => tracing::error!(error = %e, "Failed to listen for SIGINT, shutting down"),
            }
        }
    }
}
