//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the health
//! server. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Name reported at the root of the aggregate health report.
    pub service_name: String,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Health probe settings.
    pub health: HealthConfig,

    /// Supervised connection pools.
    pub pools: Vec<PoolConfig>,

    /// Upstream HTTP services probed for health.
    pub upstreams: Vec<UpstreamConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: "resource-supervisor".to_string(),
            listener: ListenerConfig::default(),
            health: HealthConfig::default(),
            pools: Vec::new(),
            upstreams: Vec::new(),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Health probe configuration. Reloadable at runtime.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Minimum minutes between two runs of the same subsystem's check.
    pub min_minutes_between_requests: u64,

    /// Deadline for a single check in seconds (0 disables).
    pub probe_timeout_secs: u64,

    /// Message attached to synthetic `active` reports.
    pub active_message: Option<String>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            min_minutes_between_requests: 1,
            probe_timeout_secs: 10,
            active_message: None,
        }
    }
}

/// A TCP connection pool supervised as a resource.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Unique pool identifier.
    pub name: String,

    /// Dependency address (e.g., "127.0.0.1:5432").
    pub address: String,

    /// Maximum concurrent connections.
    #[serde(default = "default_max_pool_conns")]
    pub max_connections: usize,

    /// Connection establishment timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Lifecycle settings.
    #[serde(default)]
    pub resource: ResourceSettings,
}

fn default_max_pool_conns() -> usize {
    10
}

fn default_connect_timeout_ms() -> u64 {
    2_000
}

/// Lifecycle settings of a supervised resource.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ResourceSettings {
    /// Start initializing as soon as the resource is constructed.
    pub auto_init: bool,

    /// Period of background health checks in milliseconds.
    pub healthcheck_interval_ms: Option<u64>,

    /// Deadline for `initialize` in milliseconds.
    pub init_timeout_ms: Option<u64>,

    /// Automatic healing after failure.
    pub heal: Option<HealConfig>,
}

/// Named heal strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealStrategyKind {
    FixedInterval,
    ExponentialBackoff,
}

/// Unit for heal delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[default]
    Ms,
    S,
}

/// Heal configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HealConfig {
    pub strategy: HealStrategyKind,

    /// Delay before the first retry (and between retries for fixed-interval).
    pub initial_delay: u64,

    #[serde(default)]
    pub time_unit: TimeUnit,

    /// Upper bound for exponential-backoff delays, in `time_unit`.
    #[serde(default)]
    pub max_delay: Option<u64>,
}

/// Upstream HTTP service probed for health.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Unique upstream identifier.
    pub name: String,

    /// Base URL (e.g., "http://leasing.internal:8080").
    pub base_url: String,

    /// Health path appended to the base URL.
    #[serde(default = "default_health_path")]
    pub path: String,

    /// Request timeout in seconds.
    #[serde(default = "default_upstream_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_upstream_timeout_secs() -> u64 {
    5
}

/// Timeout configuration for the health server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout for health endpoints in seconds.
    pub request_secs: u64,

    /// Time allowed for closing every resource on shutdown, in seconds.
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Pretty for development, JSON for production.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: ServiceConfig = toml::from_str("").unwrap();
        assert_eq!(config.service_name, "resource-supervisor");
        assert_eq!(config.health.min_minutes_between_requests, 1);
        assert!(config.pools.is_empty());
    }

    #[test]
    fn test_full_config() {
        let config: ServiceConfig = toml::from_str(
            r#"
            service_name = "keys-portal"

            [health]
            min_minutes_between_requests = 5
            active_message = "ok"

            [[pools]]
            name = "primary-db"
            address = "127.0.0.1:5432"
            max_connections = 4

            [pools.resource]
            auto_init = true
            healthcheck_interval_ms = 30000

            [pools.resource.heal]
            strategy = "fixed-interval"
            initial_delay = 5
            time_unit = "s"

            [[upstreams]]
            name = "leasing"
            base_url = "http://leasing:8080"

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.service_name, "keys-portal");
        assert_eq!(config.health.active_message.as_deref(), Some("ok"));

        let pool = &config.pools[0];
        assert_eq!(pool.max_connections, 4);
        assert_eq!(pool.connect_timeout_ms, 2_000);
        assert!(pool.resource.auto_init);
        let heal = pool.resource.heal.as_ref().unwrap();
        assert_eq!(heal.strategy, HealStrategyKind::FixedInterval);
        assert_eq!(heal.time_unit, TimeUnit::S);

        assert_eq!(config.upstreams[0].path, "/health");
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }
}
