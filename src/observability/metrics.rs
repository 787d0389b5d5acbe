//! Metrics collection and exposition.
//!
//! # Metrics
//! - `health_probe_total` (counter): probe refreshes by system and status
//! - `health_probe_status` (gauge): severity of the last report (0=active, 3=failure)
//! - `resource_status` (gauge): 1 for the resource's current status, 0 otherwise
//! - `resource_heal_attempts_total` (counter): heal retries by resource
//! - `pool_connections` (gauge): pool counters by pool and state
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; the Prometheus exporter is
//!   installed only when enabled in config

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::health::status::HealthStatus;
use crate::pool::metrics::PoolCounters;
use crate::resource::state::ResourceStatus;

const RESOURCE_STATUSES: [ResourceStatus; 5] = [
    ResourceStatus::Uninitialized,
    ResourceStatus::Initializing,
    ResourceStatus::Ready,
    ResourceStatus::Failed,
    ResourceStatus::Closed,
];

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_probe(system: &str, status: HealthStatus) {
    metrics::counter!(
        "health_probe_total",
        "system" => system.to_string(),
        "status" => status.as_str()
    )
    .increment(1);
    metrics::gauge!("health_probe_status", "system" => system.to_string())
        .set(f64::from(status.severity()));
}

pub fn record_resource_status(resource: &str, current: ResourceStatus) {
    for status in RESOURCE_STATUSES {
        let value = if status == current { 1.0 } else { 0.0 };
        metrics::gauge!(
            "resource_status",
            "resource" => resource.to_string(),
            "status" => status.as_str()
        )
        .set(value);
    }
}

pub fn record_heal_attempt(resource: &str) {
    metrics::counter!("resource_heal_attempts_total", "resource" => resource.to_string())
        .increment(1);
}

pub fn record_pool_counters(pool: &str, counters: &PoolCounters) {
    for (state, value) in [
        ("used", counters.used),
        ("free", counters.free),
        ("pending_creates", counters.pending_creates),
        ("pending_acquires", counters.pending_acquires),
    ] {
        metrics::gauge!(
            "pool_connections",
            "pool" => pool.to_string(),
            "state" => state
        )
        .set(value as f64);
    }
}
