//! Proximity query engine.
//!
//! Turns a point and a radius into a nearest-first list of drivers, each
//! annotated with when it last reported. The engine runs a radius search,
//! looks up freshness for every hit in one bulk call, and merges the two:
//!
//! - a hit whose member is not a valid driver id is dropped;
//! - a hit without a freshness entry is kept, with the query time as
//!   `last_seen` and [`Freshness::UnknownAssumedFresh`] so the caller can
//!   tell it apart from a real report;
//! - with a staleness threshold, each row is flagged, never filtered.
//!
//! Ordering comes from the spatial index and is never changed here. If
//! either index fails the whole query fails; a truncated list is never
//! returned.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use fleet_types::{DriverId, Freshness, NearbyDriver};

use crate::call::{CallContext, CallGuard};
use crate::clock::{Clock, SystemClock};
use crate::error::{IndexKind, LocatorError};
use crate::freshness::FreshnessIndex;
use crate::geo;
use crate::spatial::{SpatialHit, SpatialIndex};

/// A proximity request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyQuery {
    /// Centre latitude in degrees.
    pub latitude: f64,
    /// Centre longitude in degrees.
    pub longitude: f64,
    /// Search radius in kilometres.
    pub radius_km: f64,
    /// Flag rows whose last report is older than this.
    pub stale_after: Option<Duration>,
}

impl NearbyQuery {
    /// Query without a staleness threshold.
    pub const fn new(latitude: f64, longitude: f64, radius_km: f64) -> Self {
        Self {
            latitude,
            longitude,
            radius_km,
            stale_after: None,
        }
    }

    /// Flag rows whose last report is older than `threshold`.
    #[must_use]
    pub const fn with_stale_after(mut self, threshold: Duration) -> Self {
        self.stale_after = Some(threshold);
        self
    }
}

/// Answers proximity queries over a spatial and a freshness index.
#[derive(Clone)]
pub struct ProximityEngine {
    spatial: Arc<dyn SpatialIndex>,
    freshness: Arc<dyn FreshnessIndex>,
    clock: Arc<dyn Clock>,
    guard: CallGuard,
}

impl ProximityEngine {
    /// Build an engine over the given indexes, using wall-clock time.
    pub fn new(spatial: Arc<dyn SpatialIndex>, freshness: Arc<dyn FreshnessIndex>) -> Self {
        Self {
            spatial,
            freshness,
            clock: Arc::new(SystemClock),
            guard: CallGuard::default(),
        }
    }

    /// Take the query time from `clock`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Bound every individual index call by `timeout`.
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.guard = CallGuard::new(Some(timeout));
        self
    }

    /// Find drivers within the query radius, nearest first.
    ///
    /// # Errors
    ///
    /// Returns a caller error for an invalid centre or radius, or
    /// [`LocatorError::Store`] if either index fails, times out, or is
    /// cancelled.
    pub async fn find_nearby(
        &self,
        query: &NearbyQuery,
        ctx: &CallContext,
    ) -> Result<Vec<NearbyDriver>, LocatorError> {
        geo::validate_coordinates(query.latitude, query.longitude)?;
        geo::validate_radius(query.radius_km)?;
        let query_time = self.clock.now();

        let hits = self
            .guard
            .run(
                ctx,
                IndexKind::Spatial,
                "search_within_radius",
                self.spatial
                    .search_within_radius(query.latitude, query.longitude, query.radius_km),
            )
            .await?;
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let resolved: Vec<(DriverId, SpatialHit)> =
            hits.into_iter().filter_map(resolve_member).collect();
        let driver_ids: Vec<DriverId> = resolved.iter().map(|(id, _)| *id).collect();

        let reports = self
            .guard
            .run(
                ctx,
                IndexKind::Freshness,
                "bulk_get",
                self.freshness.bulk_get(&driver_ids),
            )
            .await?;

        // A threshold too large for `TimeDelta` can never be exceeded.
        let stale_after = query
            .stale_after
            .and_then(|threshold| TimeDelta::from_std(threshold).ok());

        let rows: Vec<NearbyDriver> = resolved
            .into_iter()
            .map(|(driver_id, hit)| {
                let (last_seen, freshness) = match reports.get(&driver_id).copied().flatten() {
                    Some(reported) => (reported, Freshness::Reported),
                    None => (query_time, Freshness::UnknownAssumedFresh),
                };
                let is_stale = stale_after
                    .is_some_and(|limit| query_time.signed_duration_since(last_seen) > limit);
                NearbyDriver {
                    driver_id,
                    latitude: hit.latitude,
                    longitude: hit.longitude,
                    distance_km: hit.distance_km,
                    last_seen,
                    freshness,
                    is_stale,
                }
            })
            .collect();

        tracing::debug!(
            latitude = query.latitude,
            longitude = query.longitude,
            radius_km = query.radius_km,
            found = rows.len(),
            unknown_freshness = rows.iter().filter(|r| !r.freshness.is_known()).count(),
            "proximity query resolved"
        );
        Ok(rows)
    }
}

impl core::fmt::Debug for ProximityEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProximityEngine")
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

/// Parse a hit's member into a driver id, dropping entries that are not one.
fn resolve_member(hit: SpatialHit) -> Option<(DriverId, SpatialHit)> {
    match hit.member.parse::<DriverId>() {
        Ok(id) if !id.is_nil() => Some((id, hit)),
        Ok(_) => {
            tracing::debug!(member = %hit.member, "dropping nil driver id from search results");
            None
        }
        Err(e) => {
            tracing::debug!(member = %hit.member, error = %e, "dropping unparsable member from search results");
            None
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::clock::FixedClock;
    use crate::freshness::InMemoryFreshnessIndex;
    use crate::spatial::InMemorySpatialIndex;

    const NOW: i64 = 10_000;

    fn id(n: u128) -> DriverId {
        DriverId(Uuid::from_u128(n))
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    struct Fixture {
        spatial: Arc<InMemorySpatialIndex>,
        freshness: Arc<InMemoryFreshnessIndex>,
        engine: ProximityEngine,
    }

    fn fixture() -> Fixture {
        let spatial = Arc::new(InMemorySpatialIndex::new());
        let freshness = Arc::new(InMemoryFreshnessIndex::new());
        let engine = ProximityEngine::new(spatial.clone(), freshness.clone())
            .with_clock(Arc::new(FixedClock::at_unix(NOW).unwrap()));
        Fixture {
            spatial,
            freshness,
            engine,
        }
    }

    #[tokio::test]
    async fn empty_region_is_empty_not_error() {
        let fx = fixture();
        let rows = fx
            .engine
            .find_nearby(&NearbyQuery::new(0.0, 0.0, 5.0), &CallContext::new())
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn annotates_staleness_without_filtering() {
        let fx = fixture();
        fx.spatial.upsert(id(1), 52.2297, 21.0122).await.unwrap();
        fx.spatial.upsert(id(2), 52.2300, 21.0125).await.unwrap();
        fx.freshness.upsert(id(1), at(NOW - 30)).await.unwrap();
        fx.freshness.upsert(id(2), at(NOW - 600)).await.unwrap();

        let query = NearbyQuery::new(52.2297, 21.0122, 1.0).with_stale_after(Duration::from_secs(60));
        let rows = fx.engine.find_nearby(&query, &CallContext::new()).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].driver_id, id(1));
        assert!(!rows[0].is_stale);
        assert_eq!(rows[0].last_seen, at(NOW - 30));
        assert_eq!(rows[1].driver_id, id(2));
        assert!(rows[1].is_stale);
        assert_eq!(rows[1].freshness, Freshness::Reported);
    }

    #[tokio::test]
    async fn exactly_at_threshold_is_not_stale() {
        let fx = fixture();
        fx.spatial.upsert(id(1), 1.0, 1.0).await.unwrap();
        fx.freshness.upsert(id(1), at(NOW - 60)).await.unwrap();
        let query = NearbyQuery::new(1.0, 1.0, 1.0).with_stale_after(Duration::from_secs(60));
        let rows = fx.engine.find_nearby(&query, &CallContext::new()).await.unwrap();
        assert!(!rows[0].is_stale);
    }

    #[tokio::test]
    async fn no_threshold_means_never_stale() {
        let fx = fixture();
        fx.spatial.upsert(id(1), 1.0, 1.0).await.unwrap();
        fx.freshness.upsert(id(1), at(0)).await.unwrap();
        let rows = fx
            .engine
            .find_nearby(&NearbyQuery::new(1.0, 1.0, 1.0), &CallContext::new())
            .await
            .unwrap();
        assert!(!rows[0].is_stale);
        assert_eq!(rows[0].last_seen, at(0));
    }

    #[tokio::test]
    async fn missing_freshness_is_flagged_unknown() {
        let fx = fixture();
        fx.spatial.upsert(id(1), 1.0, 1.0).await.unwrap();
        let query = NearbyQuery::new(1.0, 1.0, 1.0).with_stale_after(Duration::from_secs(1));
        let rows = fx.engine.find_nearby(&query, &CallContext::new()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].freshness, Freshness::UnknownAssumedFresh);
        assert_eq!(rows[0].last_seen, at(NOW));
        assert!(!rows[0].is_stale);
    }

    #[tokio::test]
    async fn corrupt_members_are_dropped_silently() {
        let fx = fixture();
        fx.spatial.insert_member("legacy-driver-7", 1.0, 1.0).await;
        fx.spatial.insert_member(&Uuid::nil().to_string(), 1.0, 1.0).await;
        fx.spatial.upsert(id(4), 1.0, 1.001).await.unwrap();
        fx.freshness.upsert(id(4), at(NOW)).await.unwrap();

        let rows = fx
            .engine
            .find_nearby(&NearbyQuery::new(1.0, 1.0, 1.0), &CallContext::new())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].driver_id, id(4));
    }

    #[tokio::test]
    async fn freshness_outage_fails_the_query() {
        let fx = fixture();
        fx.spatial.upsert(id(1), 1.0, 1.0).await.unwrap();
        fx.freshness.set_outage(true);
        let err = fx
            .engine
            .find_nearby(&NearbyQuery::new(1.0, 1.0, 1.0), &CallContext::new())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn spatial_outage_fails_the_query() {
        let fx = fixture();
        fx.spatial.set_outage(true);
        let err = fx
            .engine
            .find_nearby(&NearbyQuery::new(1.0, 1.0, 1.0), &CallContext::new())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn rejects_bad_query_before_io() {
        let fx = fixture();
        fx.spatial.set_outage(true);
        let ctx = CallContext::new();
        let err = fx
            .engine
            .find_nearby(&NearbyQuery::new(0.0, 0.0, -1.0), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err, LocatorError::InvalidRadius(-1.0));
        let err = fx
            .engine
            .find_nearby(&NearbyQuery::new(95.0, 0.0, 1.0), &ctx)
            .await
            .unwrap_err();
        assert!(err.is_caller_error());
    }
}
