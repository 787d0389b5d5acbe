//! Connection pools and their usage counters.
//!
//! # Data Flow
//! ```text
//! PoolConfig
//!     → connection.rs (TCP pool, RAII connection guards)
//!     → supervised as a Resource (init = connect, check = ping)
//!     → metrics.rs (counters snapshot per pool, "unavailable" when not ready)
//! ```

pub mod connection;
pub mod metrics;

pub use connection::{ConnectionPool, PoolError, PooledConnection};
pub use metrics::{collect_pool_metrics, PoolCounters, PoolMetric, PoolMetrics, PoolReading, PoolSource, PoolStats};
