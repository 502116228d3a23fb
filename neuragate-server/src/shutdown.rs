//! Lifecycle (C13): graceful shutdown on SIGTERM or Ctrl-C, bounded
//! by `shutdown.drain_timeout_ms` so a stuck connection never wedges
//! the process past its drain window.

use std::time::Duration;
use tracing::info;

/// Resolves once either signal fires; `axum::serve(..).with_graceful_shutdown`
/// stops accepting new connections and starts draining in-flight ones
/// the moment this future completes.
pub async fn signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, starting graceful shutdown"),
        _ = terminate => info!("received SIGTERM, starting graceful shutdown"),
    }
}

/// A future that completes after `drain_timeout_ms`, used to bound how
/// long `with_graceful_shutdown` is allowed to wait for in-flight
/// requests before the process exits anyway.
pub async fn drain_deadline(drain_timeout_ms: u64) {
    tokio::time::sleep(Duration::from_millis(drain_timeout_ms)).await;
    tracing::warn!(drain_timeout_ms, "drain timeout elapsed, forcing shutdown");
}
