//! Error types for the dispatcher API.
//!
//! [`ApiError`] carries every failure a handler can report and converts
//! into an Axum response with a JSON body of the form
//! `{"error": ..., "status": ..., "retryable": ...}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fleet_locator::LocatorError;

/// Errors that can occur in the dispatcher API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The location core rejected or failed the request.
    #[error(transparent)]
    Locator(#[from] LocatorError),

    /// A query parameter was missing or malformed.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The request body was not a well-formed position report.
    #[error("invalid body: {0}")]
    InvalidBody(String),
}

impl ApiError {
    /// HTTP status this error maps onto.
    ///
    /// Caller errors are `400 Bad Request`; store failures are
    /// `503 Service Unavailable` so clients and load balancers retry.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Locator(LocatorError::Store(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Locator(_) | Self::InvalidQuery(_) | Self::InvalidBody(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    /// Whether the client may retry the same request unchanged.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Locator(err) => err.is_retryable(),
            Self::InvalidQuery(_) | Self::InvalidBody(_) => false,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, "request failed on store");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
            "retryable": self.is_retryable(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use fleet_locator::{IndexKind, StoreError};

    use super::*;

    #[test]
    fn caller_errors_are_bad_request() {
        let err = ApiError::from(LocatorError::InvalidRadius(-1.0));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(!err.is_retryable());

        let err = ApiError::InvalidQuery("lat".to_owned());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn store_errors_are_service_unavailable() {
        let err = ApiError::from(LocatorError::Store(StoreError::Cancelled {
            index: IndexKind::Spatial,
            operation: "search",
        }));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.is_retryable());
    }
}
