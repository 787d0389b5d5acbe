//! Supervised resources and health reporting.
//!
//! A `Resource` wraps an external dependency (for example a connection pool)
//! with a lifecycle: single-flight initialization, health checks, automatic
//! healing, and teardown. Health probes cache per-subsystem reports and roll
//! them up into one `SystemHealth` tree served over HTTP.

pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pool;
pub mod resilience;
pub mod resource;

pub use config::ServiceConfig;
pub use health::{poll_system_health, probe, HealthStatus, SystemHealth};
pub use http::HealthServer;
pub use lifecycle::Shutdown;
pub use pool::collect_pool_metrics;
pub use resource::{HealStrategy, Resource, ResourceError, ResourceStatus};
