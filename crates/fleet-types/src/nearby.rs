//! Proximity query results.
//!
//! A [`NearbyDriver`] is one row of a proximity answer: where the driver is,
//! how far it is from the query point, and how much the caller should trust
//! the position. Rows are produced nearest-first by the query engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::DriverId;

/// Where a row's `last_seen` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum Freshness {
    /// `last_seen` is the timestamp the driver actually reported.
    Reported,
    /// No freshness entry exists for this driver. `last_seen` is the query
    /// time and must not be read as a real report time.
    UnknownAssumedFresh,
}

impl Freshness {
    /// Whether `last_seen` is a real report time.
    pub const fn is_known(self) -> bool {
        matches!(self, Self::Reported)
    }
}

/// A driver found within the radius of a proximity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct NearbyDriver {
    /// The driver.
    pub driver_id: DriverId,
    /// Current latitude in degrees, as stored in the spatial index.
    pub latitude: f64,
    /// Current longitude in degrees, as stored in the spatial index.
    pub longitude: f64,
    /// Great-circle distance from the query point in kilometres.
    pub distance_km: f64,
    /// Last report time, or the query time when [`Freshness::UnknownAssumedFresh`].
    pub last_seen: DateTime<Utc>,
    /// Provenance of `last_seen`.
    pub freshness: Freshness,
    /// Whether `last_seen` is older than the caller's staleness threshold.
    /// Always `false` when no threshold was given.
    pub is_stale: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn freshness_wire_names() {
        assert_eq!(
            serde_json::to_string(&Freshness::UnknownAssumedFresh).unwrap(),
            "\"unknownAssumedFresh\""
        );
        assert_eq!(serde_json::to_string(&Freshness::Reported).unwrap(), "\"reported\"");
        assert!(Freshness::Reported.is_known());
        assert!(!Freshness::UnknownAssumedFresh.is_known());
    }

    #[test]
    fn row_serializes_camel_case() {
        let row = NearbyDriver {
            driver_id: DriverId(Uuid::from_u128(1)),
            latitude: 52.23,
            longitude: 21.01,
            distance_km: 0.0,
            last_seen: DateTime::<Utc>::UNIX_EPOCH,
            freshness: Freshness::Reported,
            is_stale: true,
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["distanceKm"], 0.0);
        assert_eq!(value["isStale"], true);
        assert_eq!(value["freshness"], "reported");
        assert!(value.get("lastSeen").is_some());
    }
}
