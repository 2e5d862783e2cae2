//! Position report sent by a driver's device.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::DriverId;

/// A single GPS ping from a driver's mobile app.
///
/// The store keeps latest-wins state: a newer report for the same
/// `driver_id` replaces the previous coordinates and timestamp, it never
/// appends. `timestamp` is when the device observed the position, not when
/// the server stored it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct DriverLocation {
    /// The reporting driver.
    pub driver_id: DriverId,
    /// Latitude in degrees, `-90..=90`.
    pub latitude: f64,
    /// Longitude in degrees, `-180..=180`.
    pub longitude: f64,
    /// When the position was observed (UTC).
    pub timestamp: DateTime<Utc>,
}

impl DriverLocation {
    /// Build a report observed at `timestamp`.
    pub const fn new(
        driver_id: DriverId,
        latitude: f64,
        longitude: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            driver_id,
            latitude,
            longitude,
            timestamp,
        }
    }
}
