//! Shared type definitions for the FleetCommander location core.
//!
//! This crate is the single source of truth for the types that cross crate
//! boundaries: the driver identifier, the position report sent by a driver's
//! device, and the annotated result of a proximity query. Types defined here
//! flow downstream to `TypeScript` via `ts-rs` for dispatcher clients.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrapper for driver identifiers
//! - [`location`] -- Position report (one GPS ping from a driver)
//! - [`nearby`] -- Proximity query results with freshness annotations

pub mod ids;
pub mod location;
pub mod nearby;

// Re-export all public types at crate root for convenience.
pub use ids::DriverId;
pub use location::DriverLocation;
pub use nearby::{Freshness, NearbyDriver};
