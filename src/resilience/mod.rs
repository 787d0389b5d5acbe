//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call into a dependency (initialize, health check, connect):
//!     → timeouts.rs (enforce deadline)
//!     → On failure: the resource's heal strategy picks the next retry delay
//! ```
//!
//! # Design Decisions
//! - Every external call can carry a deadline

pub mod timeouts;
