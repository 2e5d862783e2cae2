//! Data layer for the FleetCommander location core (`Dragonfly` + `PostgreSQL`).
//!
//! `Dragonfly` is the hot store behind both location indexes: one geo set of
//! current positions and one hash of last report times. `PostgreSQL` holds
//! the relational driver records managed elsewhere; this crate only opens
//! and health-checks its pool.
//!
//! ```text
//! IngestPath / ProximityEngine
//!     |
//!     +-- SpatialIndex   --> DragonflySpatialIndex   (drivers:locations)
//!     +-- FreshnessIndex --> DragonflyFreshnessIndex (drivers:timestamps)
//! ```
//!
//! # Modules
//!
//! - [`dragonfly`] -- `Dragonfly` (Redis-compatible) connection handle
//! - [`location_index`] -- Store-backed implementations of the index contracts
//! - [`postgres`] -- `PostgreSQL` connection pool and configuration
//! - [`error`] -- Connection error types

pub mod dragonfly;
pub mod error;
pub mod location_index;
pub mod postgres;

// Re-export primary types for convenience.
pub use dragonfly::DragonflyPool;
pub use error::DbError;
pub use location_index::{DragonflyFreshnessIndex, DragonflySpatialIndex};
pub use postgres::{PostgresConfig, PostgresPool};
