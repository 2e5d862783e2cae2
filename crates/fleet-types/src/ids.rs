//! Type-safe identifier wrapper around [`Uuid`].
//!
//! Drivers are referenced by an opaque, stable 128-bit identifier issued by
//! the driver profile service. The location core never creates drivers; it
//! only carries their identifiers between the device, the indexes, and the
//! dispatcher. Inside the store the identifier is kept in its canonical
//! hyphenated string form, so parsing back from a string is a first-class
//! operation here.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Unique identifier for a driver (mobile agent) in the fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DriverId(pub Uuid);

impl DriverId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Whether this is the all-zero identifier, which never names a real driver.
    pub const fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for DriverId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for DriverId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DriverId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for DriverId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<DriverId> for Uuid {
    fn from(id: DriverId) -> Self {
        id.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_agree() {
        let id = DriverId::new();
        let parsed: DriverId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn garbage_does_not_parse() {
        assert!("not-a-driver".parse::<DriverId>().is_err());
        assert!("".parse::<DriverId>().is_err());
    }

    #[test]
    fn ordering_follows_uuid_bytes() {
        let low = DriverId(Uuid::from_u128(1));
        let high = DriverId(Uuid::from_u128(2));
        assert!(low < high);
        assert!(DriverId(Uuid::nil()).is_nil());
        assert!(!low.is_nil());
    }

    #[test]
    fn serializes_as_bare_uuid_string() {
        let id = DriverId(Uuid::from_u128(0xabc));
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
    }
}
