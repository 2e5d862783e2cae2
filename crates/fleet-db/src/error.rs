//! Error types for the data layer.
//!
//! Connection and pool management errors are reported via [`DbError`],
//! which wraps the underlying [`sqlx`] and [`fred`] errors. Errors raised
//! while serving index operations are translated into the location core's
//! [`StoreError`](fleet_locator::StoreError) instead, so the ingest path and
//! query engine see one taxonomy regardless of the store behind them.

/// Errors that can occur while connecting to or managing the stores.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
