//! Store wiring for the dispatcher binary.
//!
//! [`build_state`] connects the configured stores and hands their index
//! implementations to the ingest path and the proximity engine.

use std::sync::Arc;
use std::time::Duration;

use fleet_db::{DbError, DragonflyPool, PostgresConfig, PostgresPool};
use fleet_locator::{InMemoryFreshnessIndex, InMemorySpatialIndex};
use tracing::{info, warn};

use crate::config::{ConfigError, FleetConfig, StoreBackend};
use crate::server::ServerError;
use crate::state::{AppState, StoreHandles};
use crate::telemetry::TelemetryError;

/// Top-level error for the dispatcher binary.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// Logging could not be initialised.
    #[error("telemetry error: {source}")]
    Telemetry {
        /// The underlying telemetry error.
        #[from]
        source: TelemetryError,
    },

    /// A store could not be reached at startup.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: DbError,
    },

    /// The HTTP server failed.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: ServerError,
    },
}

/// Connect the configured stores and build the shared state.
///
/// With [`StoreBackend::Dragonfly`] both indexes live in Dragonfly and the
/// `PostgreSQL` pool is connected and pinged. With [`StoreBackend::Memory`]
/// nothing external is touched.
///
/// # Errors
///
/// Returns [`StartupError::Store`] if either store is unreachable.
pub async fn build_state(config: &FleetConfig) -> Result<AppState, StartupError> {
    let state = connect_indexes(config).await?;
    Ok(state.with_request_timeout(config.server.request_timeout()))
}

async fn connect_indexes(config: &FleetConfig) -> Result<AppState, StartupError> {
    match config.infrastructure.store {
        StoreBackend::Memory => {
            warn!("Using in-memory location indexes; positions are lost on restart");
            Ok(AppState::from_indexes(
                Arc::new(InMemorySpatialIndex::new()),
                Arc::new(InMemoryFreshnessIndex::new()),
                &config.locator,
                &config.environment,
            ))
        }
        StoreBackend::Dragonfly => {
            let infra = &config.infrastructure;

            let dragonfly =
                DragonflyPool::connect_with(&infra.dragonfly_url, infra.dragonfly_password.as_deref())
                    .await?;

            let pg_config = PostgresConfig::new(&config.postgres_url())
                .with_pool_size(infra.db_min_connections, infra.db_max_connections)
                .with_recycling(
                    Duration::from_secs(infra.db_idle_timeout_secs),
                    Duration::from_secs(infra.db_max_lifetime_secs),
                );
            let postgres = match PostgresPool::connect(&pg_config).await {
                Ok(pool) => pool,
                Err(e) => {
                    dragonfly.close().await;
                    return Err(e.into());
                }
            };

            info!("Location indexes backed by Dragonfly");
            let state = AppState::from_indexes(
                Arc::new(dragonfly.spatial_index()),
                Arc::new(dragonfly.freshness_index()),
                &config.locator,
                &config.environment,
            );
            Ok(state.with_stores(StoreHandles {
                dragonfly: Some(dragonfly),
                postgres: Some(postgres),
            }))
        }
    }
}

/// Close whatever stores the state holds.
pub async fn close_stores(state: &AppState) {
    if let Some(dragonfly) = &state.stores.dragonfly {
        dragonfly.close().await;
    }
    if let Some(postgres) = &state.stores.postgres {
        postgres.close().await;
    }
}
