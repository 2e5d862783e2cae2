//! Spatial index contract and an in-memory implementation.
//!
//! The spatial index holds exactly one coordinate pair per driver and
//! answers "who is within `r` km of this point". Writes are latest-wins
//! overwrites keyed by driver identity; there is no delete path, a driver
//! that stops reporting simply goes stale in the freshness index.
//!
//! Members come back from a search as raw strings. A shared store may hold
//! entries written by other producers, so turning a member back into a
//! [`DriverId`] is the query engine's job, where a bad entry can be dropped
//! without failing the whole search.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use fleet_types::DriverId;
use tokio::sync::RwLock;

use crate::error::{IndexKind, LocatorError, StoreError};
use crate::geo;

/// One result of a radius search.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialHit {
    /// The stored member name (a driver id in canonical string form).
    pub member: String,
    /// Stored latitude in degrees.
    pub latitude: f64,
    /// Stored longitude in degrees.
    pub longitude: f64,
    /// Great-circle distance from the query point in kilometres.
    pub distance_km: f64,
}

/// Current position per driver, searchable by radius.
///
/// Implementations must be safe to call concurrently. Concurrent upserts
/// for the same driver resolve as last-write-wins.
#[async_trait]
pub trait SpatialIndex: Send + Sync {
    /// Store or overwrite the driver's current position.
    ///
    /// The new position is visible to every search that starts after this
    /// call returns.
    ///
    /// # Errors
    ///
    /// Returns [`LocatorError::InvalidCoordinates`] without touching the
    /// index if the coordinates are out of range, or [`LocatorError::Store`]
    /// if the store fails.
    async fn upsert(
        &self,
        driver_id: DriverId,
        latitude: f64,
        longitude: f64,
    ) -> Result<(), LocatorError>;

    /// Every indexed driver within `radius_km` of the point, nearest first.
    ///
    /// Equal distances are ordered by member ascending. An empty result is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns a caller error for an invalid centre or radius, or
    /// [`LocatorError::Store`] if the store fails.
    async fn search_within_radius(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Vec<SpatialHit>, LocatorError>;
}

/// Sort hits by distance, then by member.
///
/// Canonical UUID strings are fixed-width lowercase hex, so ordering the
/// member strings orders the driver ids.
pub fn sort_nearest_first(hits: &mut [SpatialHit]) {
    hits.sort_by(|a, b| match a.distance_km.total_cmp(&b.distance_km) {
        Ordering::Equal => a.member.cmp(&b.member),
        other => other,
    });
}

/// Spatial index held in process memory.
///
/// Used in tests and when the service runs without a store. The outage
/// switch makes every call fail as if the store were unreachable.
#[derive(Debug, Default)]
pub struct InMemorySpatialIndex {
    positions: RwLock<BTreeMap<String, (f64, f64)>>,
    outage: AtomicBool,
}

impl InMemorySpatialIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a position under an arbitrary member name.
    ///
    /// Bypasses identity typing so callers can reproduce entries left in a
    /// shared store by other producers.
    pub async fn insert_member(&self, member: &str, latitude: f64, longitude: f64) {
        self.positions
            .write()
            .await
            .insert(member.to_owned(), (latitude, longitude));
    }

    /// Number of indexed members.
    pub async fn len(&self) -> usize {
        self.positions.read().await.len()
    }

    /// Whether the index holds no members.
    pub async fn is_empty(&self) -> bool {
        self.positions.read().await.is_empty()
    }

    /// Simulate the backing store becoming unreachable (`true`) or recovering.
    pub fn set_outage(&self, down: bool) {
        self.outage.store(down, AtomicOrdering::SeqCst);
    }

    fn check_available(&self, operation: &'static str) -> Result<(), LocatorError> {
        if self.outage.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Unavailable {
                index: IndexKind::Spatial,
                operation,
                message: "in-memory index outage".to_owned(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl SpatialIndex for InMemorySpatialIndex {
    async fn upsert(
        &self,
        driver_id: DriverId,
        latitude: f64,
        longitude: f64,
    ) -> Result<(), LocatorError> {
        let (latitude, longitude) = geo::normalize_coordinates(latitude, longitude)?;
        self.check_available("upsert")?;
        self.insert_member(&driver_id.to_string(), latitude, longitude)
            .await;
        Ok(())
    }

    async fn search_within_radius(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Vec<SpatialHit>, LocatorError> {
        let (latitude, longitude) = geo::normalize_coordinates(latitude, longitude)?;
        geo::validate_radius(radius_km)?;
        self.check_available("search_within_radius")?;

        let positions = self.positions.read().await;
        let mut hits: Vec<SpatialHit> = positions
            .iter()
            .filter_map(|(member, &(lat, lon))| {
                let distance_km = geo::haversine_km(latitude, longitude, lat, lon);
                (distance_km <= radius_km).then(|| SpatialHit {
                    member: member.clone(),
                    latitude: lat,
                    longitude: lon,
                    distance_km,
                })
            })
            .collect();
        drop(positions);

        sort_nearest_first(&mut hits);
        Ok(hits)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn id(n: u128) -> DriverId {
        DriverId(Uuid::from_u128(n))
    }

    #[tokio::test]
    async fn upsert_overwrites_previous_position() {
        let index = InMemorySpatialIndex::new();
        index.upsert(id(1), 10.0, 10.0).await.unwrap();
        index.upsert(id(1), 52.2297, 21.0122).await.unwrap();
        assert_eq!(index.len().await, 1);

        let old = index.search_within_radius(10.0, 10.0, 1.0).await.unwrap();
        assert!(old.is_empty());

        let hits = index.search_within_radius(52.2297, 21.0122, 0.0).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].member, id(1).to_string());
    }

    #[tokio::test]
    async fn nearest_first_with_id_tie_break() {
        let index = InMemorySpatialIndex::new();
        // Two drivers on the same spot, one a bit further out.
        index.upsert(id(9), 52.2300, 21.0125).await.unwrap();
        index.upsert(id(3), 52.2310, 21.0122).await.unwrap();
        index.upsert(id(2), 52.2310, 21.0122).await.unwrap();
        index.upsert(id(5), 52.2297, 21.0122).await.unwrap();

        let hits = index.search_within_radius(52.2297, 21.0122, 5.0).await.unwrap();
        let members: Vec<String> = hits.iter().map(|h| h.member.clone()).collect();
        assert_eq!(
            members,
            vec![
                id(5).to_string(),
                id(9).to_string(),
                id(2).to_string(),
                id(3).to_string(),
            ]
        );
        assert!(hits.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));
    }

    #[tokio::test]
    async fn radius_excludes_far_drivers() {
        let index = InMemorySpatialIndex::new();
        index.upsert(id(1), 52.2297, 21.0122).await.unwrap();
        index.upsert(id(2), 50.0647, 19.9450).await.unwrap();

        let hits = index.search_within_radius(52.2297, 21.0122, 100.0).await.unwrap();
        assert_eq!(hits.len(), 1);
        let hits = index.search_within_radius(52.2297, 21.0122, 300.0).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn antimeridian_is_one_meridian() {
        let index = InMemorySpatialIndex::new();
        index.upsert(id(1), 0.0, 180.0).await.unwrap();
        index.upsert(id(2), 10.0, -180.0).await.unwrap();

        let hits = index.search_within_radius(0.0, -180.0, 0.0).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].member, id(1).to_string());

        let hits = index.search_within_radius(10.0, 180.0, 0.0).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].member, id(2).to_string());
        assert!(hits[0].longitude > 0.0);
    }

    #[tokio::test]
    async fn rejects_bad_coordinates_without_writing() {
        let index = InMemorySpatialIndex::new();
        let err = index.upsert(id(1), 91.0, 0.0).await.unwrap_err();
        assert!(matches!(err, LocatorError::InvalidCoordinates { .. }));
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn outage_is_a_store_error() {
        let index = InMemorySpatialIndex::new();
        index.set_outage(true);
        let err = index.search_within_radius(0.0, 0.0, 1.0).await.unwrap_err();
        assert!(err.is_retryable());
        index.set_outage(false);
        assert!(index.search_within_radius(0.0, 0.0, 1.0).await.unwrap().is_empty());
    }
}
