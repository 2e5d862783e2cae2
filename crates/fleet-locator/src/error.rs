//! Error types for the location core.
//!
//! Three classes of failure are kept apart so callers can pick a policy:
//!
//! - **Caller errors** ([`LocatorError::InvalidCoordinates`],
//!   [`LocatorError::InvalidRadius`], [`LocatorError::NilDriverId`]) are
//!   detected before any store I/O and must not be retried.
//! - **Store errors** ([`StoreError`]) mean an index could not be reached or
//!   answered garbage. They are retryable; the core never retries on its own.
//! - **Partial failures** of the ingest path are not errors at all. They are
//!   reported through [`IngestOutcome`](crate::ingest::IngestOutcome).

use core::fmt;

/// Which of the two indexes an operation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    /// The geospatial index (`driver -> coordinates`).
    Spatial,
    /// The freshness index (`driver -> last report time`).
    Freshness,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spatial => f.write_str("spatial"),
            Self::Freshness => f.write_str("freshness"),
        }
    }
}

/// A failure of the backing store behind an index.
///
/// Every variant is retryable from the caller's point of view; they differ
/// only in what the caller may want to log or alert on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or refused the command.
    #[error("{index} index unavailable during {operation}: {message}")]
    Unavailable {
        /// The index that failed.
        index: IndexKind,
        /// The operation being performed.
        operation: &'static str,
        /// Description from the underlying client.
        message: String,
    },

    /// The call did not finish before its deadline.
    #[error("{index} index {operation} timed out after {elapsed_ms}ms")]
    Timeout {
        /// The index that was being called.
        index: IndexKind,
        /// The operation being performed.
        operation: &'static str,
        /// Time spent before giving up, in milliseconds.
        elapsed_ms: u64,
    },

    /// The caller cancelled the call before it finished.
    #[error("{index} index {operation} cancelled")]
    Cancelled {
        /// The index that was being called.
        index: IndexKind,
        /// The operation being performed.
        operation: &'static str,
    },

    /// The store answered with a reply the adapter could not interpret.
    #[error("{index} index {operation} protocol error: {message}")]
    Protocol {
        /// The index that failed.
        index: IndexKind,
        /// The operation being performed.
        operation: &'static str,
        /// What was wrong with the reply.
        message: String,
    },
}

impl StoreError {
    /// The index this error came from.
    pub const fn index(&self) -> IndexKind {
        match self {
            Self::Unavailable { index, .. }
            | Self::Timeout { index, .. }
            | Self::Cancelled { index, .. }
            | Self::Protocol { index, .. } => *index,
        }
    }
}

/// Errors returned by the index contracts, the ingest path, and the query engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocatorError {
    /// Latitude or longitude is not finite or lies outside its valid range.
    #[error("invalid coordinates: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinates {
        /// The rejected latitude.
        latitude: f64,
        /// The rejected longitude.
        longitude: f64,
    },

    /// Search radius is negative or not finite.
    #[error("invalid radius: {0} km")]
    InvalidRadius(f64),

    /// The nil UUID was supplied as a driver identity.
    #[error("driver id must not be nil")]
    NilDriverId,

    /// A backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LocatorError {
    /// Whether the caller may retry the same request unchanged.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Whether the request itself was malformed.
    pub const fn is_caller_error(&self) -> bool {
        !self.is_retryable()
    }
}
