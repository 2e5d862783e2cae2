//! Location store contracts and proximity query engine for FleetCommander.
//!
//! This crate is the core of the dispatch backend: it keeps the current
//! position of every driver searchable and answers "who is near this point,
//! and how fresh is that information". It owns no storage itself. Two index
//! contracts describe what it needs from a store, and both are injected into
//! the ingest path and the query engine.
//!
//! # Architecture
//!
//! ```text
//! Position report                         Proximity query
//!     |                                        |
//!     v                                        v
//! IngestPath ---- upsert ----> SpatialIndex <-- search_within_radius
//!     |                                        |
//!     +--------- upsert ---> FreshnessIndex <-- bulk_get
//!                                              |
//!                                   ProximityEngine (merge + annotate)
//! ```
//!
//! The two indexes are written one after the other without a transaction.
//! A failed freshness write after a successful spatial write is surfaced as
//! [`IngestOutcome::PartialFailure`], and the query side tolerates the
//! resulting gap by flagging the driver [`Freshness::UnknownAssumedFresh`].
//!
//! # Modules
//!
//! - [`spatial`] -- [`SpatialIndex`] trait and [`InMemorySpatialIndex`]
//! - [`freshness`] -- [`FreshnessIndex`] trait and [`InMemoryFreshnessIndex`]
//! - [`ingest`] -- [`IngestPath`], the dual-write path
//! - [`proximity`] -- [`ProximityEngine`], radius search joined with freshness
//! - [`call`] -- [`CallContext`] deadlines and cancellation for index calls
//! - [`clock`] -- [`Clock`] abstraction for the query time
//! - [`geo`] -- Great-circle distance and coordinate validation
//! - [`error`] -- [`LocatorError`] and [`StoreError`]
//!
//! [`Freshness::UnknownAssumedFresh`]: fleet_types::Freshness::UnknownAssumedFresh

pub mod call;
pub mod clock;
pub mod error;
pub mod freshness;
pub mod geo;
pub mod ingest;
pub mod proximity;
pub mod spatial;

// Re-export primary types for convenience.
pub use call::CallContext;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{IndexKind, LocatorError, StoreError};
pub use freshness::{FreshnessIndex, InMemoryFreshnessIndex, LastReports};
pub use ingest::{IngestOutcome, IngestPath};
pub use proximity::{NearbyQuery, ProximityEngine};
pub use spatial::{InMemorySpatialIndex, SpatialHit, SpatialIndex};
