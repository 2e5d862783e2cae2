//! Ingest path: one position report written to both indexes.
//!
//! The two writes are not atomic and are deliberately not wrapped in a
//! transaction. Order and outcome rules:
//!
//! 1. Validate the report. A malformed report is rejected before any I/O.
//! 2. Write the spatial index. If this fails, nothing was written and the
//!    whole ingest fails with a store error.
//! 3. Write the freshness index. If this fails the position stays live and
//!    searchable; the ingest reports [`IngestOutcome::PartialFailure`]
//!    instead of failing.
//!
//! Both writes are overwrites keyed by driver, so the driver's next
//! successful report repairs a missing freshness entry on its own.

use std::sync::Arc;
use std::time::Duration;

use fleet_types::DriverLocation;

use crate::call::{CallContext, CallGuard};
use crate::error::{IndexKind, LocatorError, StoreError};
use crate::freshness::FreshnessIndex;
use crate::geo;
use crate::spatial::SpatialIndex;

/// How an accepted report was persisted.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum IngestOutcome {
    /// Both indexes were updated.
    Complete,
    /// The position was stored but the write to `failed` did not go through.
    PartialFailure {
        /// The index whose write failed.
        failed: IndexKind,
        /// Why it failed.
        source: StoreError,
    },
}

impl IngestOutcome {
    /// Whether both writes succeeded.
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Validate a report before it reaches any index.
///
/// # Errors
///
/// Returns [`LocatorError::NilDriverId`] or
/// [`LocatorError::InvalidCoordinates`].
pub fn validate_report(report: &DriverLocation) -> Result<(), LocatorError> {
    if report.driver_id.is_nil() {
        return Err(LocatorError::NilDriverId);
    }
    geo::validate_coordinates(report.latitude, report.longitude)
}

/// Writes position reports into a spatial and a freshness index.
#[derive(Clone)]
pub struct IngestPath {
    spatial: Arc<dyn SpatialIndex>,
    freshness: Arc<dyn FreshnessIndex>,
    guard: CallGuard,
}

impl IngestPath {
    /// Build an ingest path over the given indexes.
    pub fn new(spatial: Arc<dyn SpatialIndex>, freshness: Arc<dyn FreshnessIndex>) -> Self {
        Self {
            spatial,
            freshness,
            guard: CallGuard::default(),
        }
    }

    /// Bound every individual index call by `timeout`, in addition to any
    /// deadline the caller passes in.
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.guard = CallGuard::new(Some(timeout));
        self
    }

    /// Persist one report.
    ///
    /// Performs no retries. See the module docs for the outcome rules.
    ///
    /// # Errors
    ///
    /// Returns a caller error for an invalid report, or
    /// [`LocatorError::Store`] if the spatial write fails.
    pub async fn ingest(
        &self,
        report: &DriverLocation,
        ctx: &CallContext,
    ) -> Result<IngestOutcome, LocatorError> {
        validate_report(report)?;
        let driver_id = report.driver_id;

        self.guard
            .run(
                ctx,
                IndexKind::Spatial,
                "upsert",
                self.spatial
                    .upsert(driver_id, report.latitude, report.longitude),
            )
            .await?;

        let freshness = self
            .guard
            .run(
                ctx,
                IndexKind::Freshness,
                "upsert",
                self.freshness.upsert(driver_id, report.timestamp),
            )
            .await;

        match freshness {
            Ok(()) => {
                tracing::trace!(%driver_id, "position ingested");
                Ok(IngestOutcome::Complete)
            }
            Err(LocatorError::Store(source)) => {
                tracing::warn!(
                    %driver_id,
                    error = %source,
                    "freshness write failed after position was stored"
                );
                Ok(IngestOutcome::PartialFailure {
                    failed: IndexKind::Freshness,
                    source,
                })
            }
            Err(other) => Err(other),
        }
    }
}

impl core::fmt::Debug for IngestPath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IngestPath")
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}
