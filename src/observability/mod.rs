//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Resources, probes, and pools produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
