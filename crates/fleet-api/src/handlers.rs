//! HTTP endpoint handlers for the dispatcher API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness plus store connectivity |
//! | `POST` | `/api/locations` | Ingest one position report |
//! | `GET` | `/api/drivers/nearby` | Drivers within a radius, nearest first |

use core::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fleet_locator::{IngestOutcome, NearbyQuery};
use fleet_types::{DriverLocation, NearbyDriver};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query parameter and response structs
// ---------------------------------------------------------------------------

/// Query parameters for `GET /api/drivers/nearby`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyParams {
    /// Centre latitude in degrees.
    pub lat: Option<f64>,
    /// Centre longitude in degrees.
    pub lon: Option<f64>,
    /// Search radius in kilometres.
    pub radius_km: Option<f64>,
    /// Flag drivers whose last report is older than this many seconds.
    pub stale_after_secs: Option<u64>,
}

impl NearbyParams {
    fn into_query(self, default_stale_after: Option<Duration>) -> Result<NearbyQuery, ApiError> {
        let lat = self.lat.ok_or_else(|| missing("lat"))?;
        let lon = self.lon.ok_or_else(|| missing("lon"))?;
        let radius_km = self.radius_km.ok_or_else(|| missing("radiusKm"))?;

        let query = NearbyQuery::new(lat, lon, radius_km);
        let stale_after = self
            .stale_after_secs
            .map(Duration::from_secs)
            .or(default_stale_after);
        Ok(match stale_after {
            Some(threshold) => query.with_stale_after(threshold),
            None => query,
        })
    }
}

fn missing(name: &str) -> ApiError {
    ApiError::InvalidQuery(format!("missing parameter `{name}`"))
}

/// Body of a successful `GET /api/drivers/nearby`.
#[derive(Debug, Serialize, Deserialize)]
pub struct NearbyResponse {
    /// Number of drivers returned.
    pub count: usize,
    /// Drivers ordered by distance, then driver id.
    pub drivers: Vec<NearbyDriver>,
}

/// Body of a `202 Accepted` from `POST /api/locations`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialFailureBody {
    /// The index whose write failed.
    pub partial_failure: String,
    /// What the store reported.
    pub error: String,
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// How long `/health` waits for the `PostgreSQL` round trip.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Report liveness, the environment, and store connectivity.
///
/// Always `200 OK` while the process serves requests; a store that is
/// down, or slower than [`HEALTH_CHECK_TIMEOUT`] to answer, shows as
/// `"down"` with an overall status of `"degraded"`.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let dragonfly = state
        .stores
        .dragonfly
        .as_ref()
        .map(fleet_db::DragonflyPool::is_connected);
    let mut postgres = None;
    if let Some(pool) = &state.stores.postgres {
        postgres = Some(succeeds_within(pool.ping(), HEALTH_CHECK_TIMEOUT).await);
    }
    let degraded = dragonfly == Some(false) || postgres == Some(false);

    Json(serde_json::json!({
        "status": if degraded { "degraded" } else { "ok" },
        "message": format!(
            "OK - FleetCommander API is running in {} mode",
            state.environment
        ),
        "environment": state.environment,
        "stores": {
            "dragonfly": connectivity(dragonfly),
            "postgres": connectivity(postgres),
        },
    }))
}

/// Whether `check` resolves to `Ok` before `limit` elapses.
async fn succeeds_within<T, E>(check: impl Future<Output = Result<T, E>>, limit: Duration) -> bool {
    matches!(tokio::time::timeout(limit, check).await, Ok(Ok(_)))
}

const fn connectivity(reachable: Option<bool>) -> &'static str {
    match reachable {
        Some(true) => "up",
        Some(false) => "down",
        None => "memory",
    }
}

// ---------------------------------------------------------------------------
// POST /api/locations
// ---------------------------------------------------------------------------

/// Ingest one position report.
///
/// `204 No Content` when both indexes accepted it; `202 Accepted` with a
/// [`PartialFailureBody`] when only the spatial write landed.
pub async fn ingest_location(
    State(state): State<Arc<AppState>>,
    body: Result<Json<DriverLocation>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(report) = body.map_err(|e| ApiError::InvalidBody(e.body_text()))?;
    let outcome = state.ingest.ingest(&report, &state.call_context()).await?;

    Ok(match outcome {
        IngestOutcome::Complete => StatusCode::NO_CONTENT.into_response(),
        IngestOutcome::PartialFailure { failed, source } => (
            StatusCode::ACCEPTED,
            Json(PartialFailureBody {
                partial_failure: failed.to_string(),
                error: source.to_string(),
            }),
        )
            .into_response(),
    })
}

// ---------------------------------------------------------------------------
// GET /api/drivers/nearby
// ---------------------------------------------------------------------------

/// List drivers within `radiusKm` of (`lat`, `lon`), nearest first.
pub async fn nearby_drivers(
    State(state): State<Arc<AppState>>,
    params: Result<Query<NearbyParams>, QueryRejection>,
) -> Result<Json<NearbyResponse>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::InvalidQuery(e.body_text()))?;
    let query = params.into_query(state.default_stale_after)?;

    let drivers = state
        .engine
        .find_nearby(&query, &state.call_context())
        .await?;

    Ok(Json(NearbyResponse {
        count: drivers.len(),
        drivers,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn hung_check_counts_as_down() {
        let hung = core::future::pending::<Result<(), ()>>();
        assert!(!succeeds_within(hung, HEALTH_CHECK_TIMEOUT).await);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_check_past_limit_counts_as_down() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<(), ()>(())
        };
        assert!(!succeeds_within(slow, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn answered_check_reflects_result() {
        assert!(succeeds_within(async { Ok::<_, ()>(()) }, HEALTH_CHECK_TIMEOUT).await);
        assert!(!succeeds_within(async { Err::<(), _>("refused") }, HEALTH_CHECK_TIMEOUT).await);
    }

    #[test]
    fn connectivity_labels() {
        assert_eq!(connectivity(Some(true)), "up");
        assert_eq!(connectivity(Some(false)), "down");
        assert_eq!(connectivity(None), "memory");
    }
}
