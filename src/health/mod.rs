//! Health reporting subsystem.
//!
//! # Data Flow
//! ```text
//! Check function (upstream.rs, resource outcome, ...)
//!     → probe.rs (rate limit via cache.rs, classify errors)
//!     → SystemHealth (status.rs)
//!
//! Health endpoint:
//!     aggregate.rs probes each subsystem in order
//!     → rolls up worst status
//!     → one SystemHealth tree
//! ```
//!
//! # Design Decisions
//! - No check failure escapes a probe; failures become report statuses
//! - Probe results are cached per subsystem name for a minimum interval
//! - Aggregation is sequential so report order is stable

pub mod aggregate;
pub mod cache;
pub mod check;
pub mod probe;
pub mod status;
pub mod upstream;

pub use aggregate::{poll_system_health, Subsystem};
pub use cache::{CachedProbe, HealthCache, MemoryHealthCache};
pub use check::{CheckFn, CheckOutcome, ProbeError};
pub use probe::{probe, ProbeSettings, ProbeTarget, Prober};
pub use status::{HealthStatus, SystemHealth};
pub use upstream::UpstreamCheck;
