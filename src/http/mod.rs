//! HTTP health endpoints.
//!
//! # Data Flow
//! ```text
//! GET /health           → poll_system_health over every subsystem
//! GET /health/db        → collect_pool_metrics over every pool
//! GET /health/resources → snapshot of every supervised resource
//! ```

pub mod handlers;
pub mod server;

pub use server::{AppState, HealthServer};
