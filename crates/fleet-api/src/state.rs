//! Shared application state for the dispatcher API.
//!
//! [`AppState`] owns the ingest path and the proximity engine, both wired
//! to the same pair of indexes, plus the store handles the health check
//! reports on. Handlers receive it as `State<Arc<AppState>>`.

use std::sync::Arc;
use std::time::Duration;

use fleet_db::{DragonflyPool, PostgresPool};
use fleet_locator::{CallContext, FreshnessIndex, IngestPath, ProximityEngine, SpatialIndex};
use tokio_util::sync::CancellationToken;

use crate::config::LocatorConfig;

/// Connected store handles, absent when running on in-memory indexes.
#[derive(Clone, Default)]
pub struct StoreHandles {
    /// Dragonfly connection backing both indexes.
    pub dragonfly: Option<DragonflyPool>,
    /// `PostgreSQL` pool, connected and checked at startup.
    pub postgres: Option<PostgresPool>,
}

/// Shared state for all HTTP handlers.
pub struct AppState {
    /// Write path for position reports.
    pub ingest: IngestPath,
    /// Read path for proximity queries.
    pub engine: ProximityEngine,
    /// Store handles for the health check.
    pub stores: StoreHandles,
    /// Deployment environment name, echoed by `/health`.
    pub environment: String,
    /// Staleness threshold used when a query does not supply one.
    pub default_stale_after: Option<Duration>,
    /// Cancelled on shutdown; in-flight index calls abort with a retryable error.
    pub shutdown: CancellationToken,
    /// Longest a single HTTP request may run before it is answered with 408.
    pub request_timeout: Duration,
}

/// Request timeout used unless the server config says otherwise.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

impl AppState {
    /// Create state from an ingest path and an engine.
    pub fn new(ingest: IngestPath, engine: ProximityEngine, environment: &str) -> Self {
        Self {
            ingest,
            engine,
            stores: StoreHandles::default(),
            environment: environment.to_owned(),
            default_stale_after: None,
            shutdown: CancellationToken::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Wire both paths to one pair of indexes, applying the locator settings.
    pub fn from_indexes(
        spatial: Arc<dyn SpatialIndex>,
        freshness: Arc<dyn FreshnessIndex>,
        locator: &LocatorConfig,
        environment: &str,
    ) -> Self {
        let mut ingest = IngestPath::new(Arc::clone(&spatial), Arc::clone(&freshness));
        let mut engine = ProximityEngine::new(spatial, freshness);
        if let Some(timeout) = locator.index_call_timeout() {
            ingest = ingest.with_call_timeout(timeout);
            engine = engine.with_call_timeout(timeout);
        }
        let mut state = Self::new(ingest, engine, environment);
        state.default_stale_after = locator.default_stale_after();
        state
    }

    /// Attach connected store handles.
    #[must_use]
    pub fn with_stores(mut self, stores: StoreHandles) -> Self {
        self.stores = stores;
        self
    }

    /// Use an externally owned shutdown token.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Bound every HTTP request by `timeout`.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Call context for one request: aborts when the server shuts down.
    pub fn call_context(&self) -> CallContext {
        CallContext::new().with_cancellation(self.shutdown.child_token())
    }
}

impl core::fmt::Debug for AppState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppState")
            .field("ingest", &self.ingest)
            .field("engine", &self.engine)
            .field("dragonfly", &self.stores.dragonfly.is_some())
            .field("postgres", &self.stores.postgres.is_some())
            .field("environment", &self.environment)
            .field("default_stale_after", &self.default_stale_after)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}
