//! Dispatcher HTTP server lifecycle management.
//!
//! [`start_server`] binds the listener and serves until the `shutdown`
//! token is cancelled. In-flight requests then get the configured grace
//! period to finish; after that the state's request token is cancelled so
//! any index call still running aborts with a retryable error.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ServerSection;
use crate::router::build_router;
use crate::state::AppState;

/// Errors that can occur when starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}

/// Start the dispatcher HTTP server.
///
/// Returns `Ok(())` once shutdown completes, whether or not every
/// in-flight request finished within the grace period.
///
/// # Errors
///
/// Returns [`ServerError`] if the listener cannot bind or serving fails.
pub async fn start_server(
    config: &ServerSection,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;

    info!(%addr, environment = %state.environment, "HTTP server is listening");

    let requests = state.shutdown.clone();
    let router = build_router(state);
    let stop = shutdown.clone();
    let serve = axum::serve(listener, router)
        .with_graceful_shutdown(async move { stop.cancelled().await })
        .into_future();
    tokio::pin!(serve);

    tokio::select! {
        result = &mut serve => {
            return result.map_err(|e| ServerError::Serve(e.to_string()));
        }
        () = shutdown.cancelled() => {}
    }

    let grace = Duration::from_secs(config.shutdown_grace_secs);
    info!(grace_secs = config.shutdown_grace_secs, "Draining in-flight requests");

    if let Ok(result) = tokio::time::timeout(grace, &mut serve).await {
        result.map_err(|e| ServerError::Serve(e.to_string()))?;
    } else {
        warn!("Grace period elapsed, cancelling remaining requests");
        requests.cancel();
    }

    info!("HTTP server stopped");
    Ok(())
}

/// Resolve when the process receives `SIGINT` (Ctrl-C) or `SIGTERM`.
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => {}
        () = terminate => {}
    }

    warn!("Received shutdown signal, initiating graceful shutdown");
}
