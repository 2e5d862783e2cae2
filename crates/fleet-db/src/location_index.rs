//! Spatial and freshness indexes stored in `Dragonfly`.
//!
//! Positions live in a geo set (`GEOADD` / `GEOSEARCH`) and report times in
//! a hash of epoch seconds (`HSET` / `HMGET`). The two keys are written by
//! separate commands; the location core decides what a failure between them
//! means.
//!
//! `GEOSEARCH` is asked for distances and coordinates and the hits are
//! re-sorted locally, because the store orders by distance only and the
//! index contract also fixes the order of equal distances.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_locator::spatial::sort_nearest_first;
use fleet_locator::{
    FreshnessIndex, IndexKind, LastReports, LocatorError, SpatialHit, SpatialIndex, StoreError,
    geo,
};
use fleet_types::DriverId;
use fred::error::{Error as FredError, ErrorKind};
use fred::prelude::*;
use fred::types::Value;
use fred::types::geo::{GeoPosition, GeoUnit, GeoValue};

/// Geo set holding the current position of every driver.
pub const LOCATIONS_KEY: &str = "drivers:locations";

/// Hash holding the last report time (epoch seconds) of every driver.
pub const TIMESTAMPS_KEY: &str = "drivers:timestamps";

/// Largest latitude Redis-compatible geo sets accept (Web Mercator limit).
pub const MAX_GEO_LATITUDE: f64 = 85.051_128_78;

/// Slack added to every `GEOSEARCH` radius, in kilometres.
///
/// Geo sets store a 52-bit geohash, so a member decodes up to about 0.6 m
/// from where it was written. Without the slack a search centred on a
/// driver's own report could miss it at radius 0.
pub const GEOHASH_PADDING_KM: f64 = 0.001;

/// Validate a pair for the geo set: in range, antimeridian folded, and
/// inside the latitude band the store can encode.
fn geo_set_coordinates(latitude: f64, longitude: f64) -> Result<(f64, f64), LocatorError> {
    let (latitude, longitude) = geo::normalize_coordinates(latitude, longitude)?;
    if latitude.abs() > MAX_GEO_LATITUDE {
        return Err(LocatorError::InvalidCoordinates {
            latitude,
            longitude,
        });
    }
    Ok((latitude, longitude))
}

/// Translate a client error into the core's store taxonomy.
fn store_error(
    index: IndexKind,
    operation: &'static str,
    started: Instant,
    err: &FredError,
) -> StoreError {
    match err.kind() {
        ErrorKind::Timeout => StoreError::Timeout {
            index,
            operation,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        },
        ErrorKind::Canceled => StoreError::Cancelled { index, operation },
        ErrorKind::Protocol | ErrorKind::Parse => StoreError::Protocol {
            index,
            operation,
            message: err.to_string(),
        },
        _ => StoreError::Unavailable {
            index,
            operation,
            message: err.to_string(),
        },
    }
}

/// [`SpatialIndex`] over the `drivers:locations` geo set.
#[derive(Clone)]
pub struct DragonflySpatialIndex {
    client: Client,
}

impl DragonflySpatialIndex {
    /// Wrap an initialized client.
    pub const fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SpatialIndex for DragonflySpatialIndex {
    async fn upsert(
        &self,
        driver_id: DriverId,
        latitude: f64,
        longitude: f64,
    ) -> Result<(), LocatorError> {
        let (latitude, longitude) = geo_set_coordinates(latitude, longitude)?;

        let started = Instant::now();
        let value = GeoValue {
            coordinates: GeoPosition {
                longitude,
                latitude,
            },
            member: Value::from(driver_id.to_string()),
        };
        let _: i64 = self
            .client
            .geoadd(LOCATIONS_KEY, None, false, value)
            .await
            .map_err(|e| store_error(IndexKind::Spatial, "upsert", started, &e))?;
        Ok(())
    }

    async fn search_within_radius(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Vec<SpatialHit>, LocatorError> {
        let (latitude, longitude) = geo_set_coordinates(latitude, longitude)?;
        geo::validate_radius(radius_km)?;

        let started = Instant::now();
        let reply: Value = self
            .client
            .geosearch(
                LOCATIONS_KEY,
                None,
                Some(GeoPosition {
                    longitude,
                    latitude,
                }),
                Some((radius_km + GEOHASH_PADDING_KM, GeoUnit::Kilometers)),
                None,
                None,
                None,
                true,
                true,
                false,
            )
            .await
            .map_err(|e| store_error(IndexKind::Spatial, "search_within_radius", started, &e))?;

        let infos = reply.into_geo_radius_result(true, true, false).map_err(|e| {
            StoreError::Protocol {
                index: IndexKind::Spatial,
                operation: "search_within_radius",
                message: e.to_string(),
            }
        })?;

        let mut hits = Vec::with_capacity(infos.len());
        for info in infos {
            let (Some(position), Some(distance_km)) = (info.position, info.distance) else {
                return Err(StoreError::Protocol {
                    index: IndexKind::Spatial,
                    operation: "search_within_radius",
                    message: "GEOSEARCH reply missing coordinates or distance".to_owned(),
                }
                .into());
            };
            hits.push(SpatialHit {
                member: info.member.as_string().unwrap_or_default(),
                latitude: position.latitude,
                longitude: position.longitude,
                distance_km,
            });
        }

        sort_nearest_first(&mut hits);
        Ok(hits)
    }
}

/// [`FreshnessIndex`] over the `drivers:timestamps` hash.
#[derive(Clone)]
pub struct DragonflyFreshnessIndex {
    client: Client,
}

impl DragonflyFreshnessIndex {
    /// Wrap an initialized client.
    pub const fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Decode one `HMGET` slot. Anything that is not an integer number of
/// seconds is treated as absent.
fn decode_timestamp(driver_id: DriverId, value: &Value) -> Option<DateTime<Utc>> {
    if value.is_null() {
        return None;
    }
    let decoded = value
        .as_i64()
        .and_then(|secs| DateTime::from_timestamp(secs, 0));
    if decoded.is_none() {
        tracing::warn!(%driver_id, ?value, "ignoring malformed freshness entry");
    }
    decoded
}

#[async_trait]
impl FreshnessIndex for DragonflyFreshnessIndex {
    async fn upsert(
        &self,
        driver_id: DriverId,
        timestamp: DateTime<Utc>,
    ) -> Result<(), LocatorError> {
        let started = Instant::now();
        let _: i64 = self
            .client
            .hset(TIMESTAMPS_KEY, (driver_id.to_string(), timestamp.timestamp()))
            .await
            .map_err(|e| store_error(IndexKind::Freshness, "upsert", started, &e))?;
        Ok(())
    }

    async fn bulk_get(&self, driver_ids: &[DriverId]) -> Result<LastReports, LocatorError> {
        if driver_ids.is_empty() {
            return Ok(LastReports::new());
        }

        let started = Instant::now();
        let fields: Vec<String> = driver_ids.iter().map(ToString::to_string).collect();
        let values: Vec<Value> = self
            .client
            .hmget(TIMESTAMPS_KEY, fields)
            .await
            .map_err(|e| store_error(IndexKind::Freshness, "bulk_get", started, &e))?;

        if values.len() != driver_ids.len() {
            return Err(StoreError::Protocol {
                index: IndexKind::Freshness,
                operation: "bulk_get",
                message: format!(
                    "HMGET returned {} values for {} fields",
                    values.len(),
                    driver_ids.len()
                ),
            }
            .into());
        }

        Ok(driver_ids
            .iter()
            .zip(values.iter())
            .map(|(&id, value)| (id, decode_timestamp(id, value)))
            .collect())
    }
}
