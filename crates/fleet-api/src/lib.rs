//! Dispatcher API server for the FleetCommander location core.
//!
//! This crate wraps `fleet-locator` in an Axum HTTP service:
//!
//! - **`POST /api/locations`** ingests one driver position report
//! - **`GET /api/drivers/nearby`** lists drivers within a radius, nearest
//!   first, with freshness and staleness per row
//! - **`GET /health`** reports the environment and store connectivity
//!
//! # Startup
//!
//! The binary loads [`config::FleetConfig`], installs the `tracing`
//! subscriber, connects Dragonfly and `PostgreSQL` (or builds in-memory
//! indexes), and serves until `SIGINT`/`SIGTERM`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod telemetry;

// Re-export primary types for convenience.
pub use config::FleetConfig;
pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::AppState;
