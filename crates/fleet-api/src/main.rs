//! Dispatcher API binary.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `fleet-config.yaml` plus environment overrides
//! 2. Initialize structured logging (text in development, JSON otherwise)
//! 3. Connect the location stores and build the shared state
//! 4. Serve HTTP until `SIGINT`/`SIGTERM`, then drain within the grace period
//! 5. Close store connections

use std::sync::Arc;

use fleet_api::config::FleetConfig;
use fleet_api::startup::{self, StartupError};
use fleet_api::{server, telemetry};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    // 1. Load configuration.
    let config = FleetConfig::load()?;

    // 2. Initialize structured logging.
    telemetry::init_tracing(&config)?;
    info!(
        environment = %config.environment,
        port = config.server.port,
        store = ?config.infrastructure.store,
        "fleet-api starting"
    );

    // 3. Connect stores.
    let state = Arc::new(startup::build_state(&config).await?);

    // 4. Serve until a shutdown signal arrives.
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        server::shutdown_signal().await;
        trigger.cancel();
    });

    let served = server::start_server(&config.server, Arc::clone(&state), shutdown).await;

    // 5. Close stores whether or not serving failed.
    startup::close_stores(&state).await;
    served?;

    info!("Graceful shutdown complete");
    Ok(())
}
