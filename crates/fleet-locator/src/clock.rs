//! Source of "now" for freshness decisions.
//!
//! The query engine compares report times against the time of the query.
//! Taking that time from a [`Clock`] instead of calling [`Utc::now`] inline
//! keeps staleness results reproducible in tests.

use chrono::{DateTime, Utc};

/// A source of the current UTC time.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    /// Freeze the clock at `at`.
    pub const fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Freeze the clock at `secs` seconds after the Unix epoch.
    ///
    /// Returns `None` if `secs` is outside the range `chrono` can represent.
    pub fn at_unix(secs: i64) -> Option<Self> {
        DateTime::from_timestamp(secs, 0).map(Self)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
