//! Great-circle distance and coordinate validation.
//!
//! Distances use the haversine formula on a sphere whose radius matches the
//! one Redis-compatible stores use for `GEOSEARCH`, so the in-memory index and
//! the store-backed index agree on which drivers fall inside a radius.

use crate::error::LocatorError;

/// Earth radius in kilometres, as used by Redis geo commands.
pub const EARTH_RADIUS_KM: f64 = 6_372.797_560_856;

/// Latitude bound in degrees.
pub const MAX_LATITUDE: f64 = 90.0;

/// Longitude bound in degrees.
pub const MAX_LONGITUDE: f64 = 180.0;

/// Check that a coordinate pair is finite and within range.
///
/// # Errors
///
/// Returns [`LocatorError::InvalidCoordinates`] otherwise.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), LocatorError> {
    let lat_ok = latitude.is_finite() && (-MAX_LATITUDE..=MAX_LATITUDE).contains(&latitude);
    let lon_ok = longitude.is_finite() && (-MAX_LONGITUDE..=MAX_LONGITUDE).contains(&longitude);
    if lat_ok && lon_ok {
        Ok(())
    } else {
        Err(LocatorError::InvalidCoordinates {
            latitude,
            longitude,
        })
    }
}

/// Validate a coordinate pair and fold longitude -180 onto +180.
///
/// Both values name the same meridian; indexes store the canonical one so
/// a point reported at -180 is found by a query at +180 and vice versa.
///
/// # Errors
///
/// Returns [`LocatorError::InvalidCoordinates`] if the pair is out of range.
pub fn normalize_coordinates(latitude: f64, longitude: f64) -> Result<(f64, f64), LocatorError> {
    validate_coordinates(latitude, longitude)?;
    let longitude = if longitude <= -MAX_LONGITUDE {
        MAX_LONGITUDE
    } else {
        longitude
    };
    Ok((latitude, longitude))
}

/// Check that a search radius is finite and non-negative.
///
/// # Errors
///
/// Returns [`LocatorError::InvalidRadius`] otherwise.
pub fn validate_radius(radius_km: f64) -> Result<(), LocatorError> {
    if radius_km.is_finite() && radius_km >= 0.0 {
        Ok(())
    } else {
        Err(LocatorError::InvalidRadius(radius_km))
    }
}

/// Great-circle distance between two points, in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let half_dlat = (lat2 - lat1).to_radians() / 2.0;
    let half_dlon = (lon2 - lon1).to_radians() / 2.0;

    let a = half_dlat.sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * half_dlon.sin().powi(2);
    // Rounding can push `a` a hair above 1 for antipodal points.
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}
