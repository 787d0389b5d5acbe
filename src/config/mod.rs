//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new config sent to the server
//!     → probe settings swapped atomically
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only probe settings are hot-reloaded; pools and upstreams need a restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{
    HealConfig, HealStrategyKind, HealthConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    PoolConfig, ResourceSettings, ServiceConfig, TimeUnit, TimeoutConfig, UpstreamConfig,
};
