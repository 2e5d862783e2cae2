//! `Dragonfly` (Redis-compatible) connection handle.
//!
//! `Dragonfly` holds the hot location state: the geospatial set of current
//! driver positions and the hash of last report times. The typed index
//! operations live in [`crate::location_index`]; this module owns the
//! connection itself.
//!
//! # Key Patterns
//!
//! | Key | Type | Description |
//! |-----|------|-------------|
//! | `drivers:locations` | Geo set | Current position, member = driver UUID |
//! | `drivers:timestamps` | Hash | Last report, field = driver UUID, value = epoch seconds |

use fred::prelude::*;

use crate::error::DbError;
use crate::location_index::{DragonflyFreshnessIndex, DragonflySpatialIndex};

/// Connection handle to a `Dragonfly` (Redis-compatible) instance.
///
/// Wraps a [`fred::prelude::Client`]. Cloning is cheap and shares the
/// underlying connection.
#[derive(Clone)]
pub struct DragonflyPool {
    client: Client,
}

impl DragonflyPool {
    /// Connect to `Dragonfly` at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port`, `redis://:password@host:port` or
    /// `redis://host:port/db`
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed.
    /// Returns [`DbError::Dragonfly`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        Self::connect_with(url, None).await
    }

    /// Connect to `Dragonfly`, authenticating with `password` when the URL
    /// does not carry one.
    ///
    /// # Errors
    ///
    /// Same as [`DragonflyPool::connect`].
    pub async fn connect_with(url: &str, password: Option<&str>) -> Result<Self, DbError> {
        let config = client_config(url, password)?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!("Connected to Dragonfly");
        Ok(Self { client })
    }

    /// The geospatial index backed by this connection.
    pub fn spatial_index(&self) -> DragonflySpatialIndex {
        DragonflySpatialIndex::new(self.client.clone())
    }

    /// The freshness index backed by this connection.
    pub fn freshness_index(&self) -> DragonflyFreshnessIndex {
        DragonflyFreshnessIndex::new(self.client.clone())
    }

    /// Whether the client currently holds a live connection.
    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// Flush all keys from the `Dragonfly` instance.
    ///
    /// **WARNING:** This deletes all data. Only use for testing.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the flush fails.
    pub async fn flush_all(&self) -> Result<(), DbError> {
        let _: () = self.client.flushall(false).await?;
        Ok(())
    }

    /// Close the connection.
    pub async fn close(&self) {
        tracing::info!("Closing Dragonfly connection");
        if let Err(e) = self.client.quit().await {
            tracing::warn!(error = %e, "Dragonfly quit failed");
        }
    }

    /// Return a reference to the underlying [`Client`].
    pub const fn client(&self) -> &Client {
        &self.client
    }
}

/// Parse `url` into a client config, filling in `password` if the URL has none.
fn client_config(url: &str, password: Option<&str>) -> Result<Config, DbError> {
    let mut config = Config::from_url(url)
        .map_err(|e| DbError::Config(format!("Invalid Dragonfly URL: {e}")))?;
    if config.password.is_none() {
        config.password = password.map(str::to_owned);
    }
    Ok(config)
}
