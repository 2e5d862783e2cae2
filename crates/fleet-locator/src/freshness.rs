//! Freshness index contract and an in-memory implementation.
//!
//! The freshness index maps each driver to the time of its last report, at
//! one-second resolution. It is written independently of the spatial index
//! and may lag or miss entries after a partial ingest failure, which is why
//! lookups report absence explicitly instead of filling in a value.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_types::DriverId;
use tokio::sync::RwLock;

use crate::error::{IndexKind, LocatorError, StoreError};

/// Result of a bulk lookup: every requested driver maps to its last report
/// time, or to `None` if the index has no usable entry for it.
pub type LastReports = BTreeMap<DriverId, Option<DateTime<Utc>>>;

/// Last-report time per driver.
#[async_trait]
pub trait FreshnessIndex: Send + Sync {
    /// Store or overwrite the driver's last report time.
    ///
    /// # Errors
    ///
    /// Returns [`LocatorError::Store`] if the store fails.
    async fn upsert(&self, driver_id: DriverId, timestamp: DateTime<Utc>)
    -> Result<(), LocatorError>;

    /// Look up the last report time of each driver in `driver_ids`.
    ///
    /// The returned map has one key per distinct requested driver. A driver
    /// that was never written maps to `None`, never to the epoch. An empty
    /// request yields an empty map without touching the store.
    ///
    /// # Errors
    ///
    /// Returns [`LocatorError::Store`] if the store fails.
    async fn bulk_get(&self, driver_ids: &[DriverId]) -> Result<LastReports, LocatorError>;
}

/// Freshness index held in process memory.
///
/// Stores epoch seconds like the store-backed index does, so sub-second
/// precision is dropped on write in both.
#[derive(Debug, Default)]
pub struct InMemoryFreshnessIndex {
    last_seen: RwLock<BTreeMap<DriverId, i64>>,
    outage: AtomicBool,
}

impl InMemoryFreshnessIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of drivers with an entry.
    pub async fn len(&self) -> usize {
        self.last_seen.read().await.len()
    }

    /// Whether the index holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.last_seen.read().await.is_empty()
    }

    /// Simulate the backing store becoming unreachable (`true`) or recovering.
    pub fn set_outage(&self, down: bool) {
        self.outage.store(down, Ordering::SeqCst);
    }

    fn check_available(&self, operation: &'static str) -> Result<(), LocatorError> {
        if self.outage.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                index: IndexKind::Freshness,
                operation,
                message: "in-memory index outage".to_owned(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl FreshnessIndex for InMemoryFreshnessIndex {
    async fn upsert(
        &self,
        driver_id: DriverId,
        timestamp: DateTime<Utc>,
    ) -> Result<(), LocatorError> {
        self.check_available("upsert")?;
        self.last_seen
            .write()
            .await
            .insert(driver_id, timestamp.timestamp());
        Ok(())
    }

    async fn bulk_get(&self, driver_ids: &[DriverId]) -> Result<LastReports, LocatorError> {
        if driver_ids.is_empty() {
            return Ok(LastReports::new());
        }
        self.check_available("bulk_get")?;

        let last_seen = self.last_seen.read().await;
        Ok(driver_ids
            .iter()
            .map(|id| {
                let at = last_seen
                    .get(id)
                    .and_then(|&secs| DateTime::from_timestamp(secs, 0));
                (*id, at)
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn id(n: u128) -> DriverId {
        DriverId(Uuid::from_u128(n))
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn never_written_is_absent_not_epoch() {
        let index = InMemoryFreshnessIndex::new();
        index.upsert(id(1), DateTime::UNIX_EPOCH).await.unwrap();

        let found = index.bulk_get(&[id(1), id(2)]).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found.get(&id(1)), Some(&Some(DateTime::UNIX_EPOCH)));
        assert_eq!(found.get(&id(2)), Some(&None));
    }

    #[tokio::test]
    async fn upsert_is_latest_wins() {
        let index = InMemoryFreshnessIndex::new();
        index.upsert(id(1), at(1_000)).await.unwrap();
        index.upsert(id(1), at(900)).await.unwrap();
        let found = index.bulk_get(&[id(1)]).await.unwrap();
        assert_eq!(found.get(&id(1)), Some(&Some(at(900))));
        assert_eq!(index.len().await, 1);
    }

    #[tokio::test]
    async fn truncates_to_whole_seconds() {
        let index = InMemoryFreshnessIndex::new();
        let precise = DateTime::from_timestamp(1_000, 750_000_000).unwrap();
        index.upsert(id(1), precise).await.unwrap();
        let found = index.bulk_get(&[id(1)]).await.unwrap();
        assert_eq!(found.get(&id(1)), Some(&Some(at(1_000))));
    }

    #[tokio::test]
    async fn empty_request_skips_the_store() {
        let index = InMemoryFreshnessIndex::new();
        index.set_outage(true);
        assert!(index.bulk_get(&[]).await.unwrap().is_empty());
        assert!(index.bulk_get(&[id(1)]).await.unwrap_err().is_retryable());
        assert!(index.upsert(id(1), at(1)).await.is_err());
        assert!(index.is_empty().await);
    }
}
