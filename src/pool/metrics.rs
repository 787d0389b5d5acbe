//! Pool metrics collection.
//!
//! Reads the usage counters of a set of pools into one serializable snapshot.
//! A pool that cannot be read (its resource is not ready) is reported as
//! `"unavailable"`; collection itself never fails.

use serde::{Serialize, Serializer};
use std::sync::Arc;

use crate::observability::metrics;
use crate::resource::{Resource, ResourceError};

/// Point-in-time usage counters of one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolCounters {
    pub used: usize,
    pub free: usize,
    pub pending_creates: usize,
    pub pending_acquires: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolReading {
    Counters(PoolCounters),
    Unavailable,
}

impl Serialize for PoolReading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PoolReading::Counters(counters) => counters.serialize(serializer),
            PoolReading::Unavailable => serializer.serialize_str("unavailable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolMetric {
    pub name: String,
    pub pool: PoolReading,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolMetrics {
    pub connection_pools: usize,
    pub metrics: Vec<PoolMetric>,
}

/// Synchronous access to a pool's counters.
pub trait PoolStats {
    fn counters(&self) -> PoolCounters;
}

/// A named pool whose counters may be unreadable.
pub trait PoolSource: Send + Sync {
    fn pool_name(&self) -> &str;

    fn pool_counters(&self) -> Result<PoolCounters, ResourceError>;
}

impl<T: PoolStats + Send + Sync + 'static> PoolSource for Resource<T> {
    fn pool_name(&self) -> &str {
        self.name()
    }

    fn pool_counters(&self) -> Result<PoolCounters, ResourceError> {
        Ok(self.get()?.counters())
    }
}

/// Sample every pool, in order.
pub fn collect_pool_metrics(sources: &[Arc<dyn PoolSource>]) -> PoolMetrics {
    let metrics = sources
        .iter()
        .map(|source| {
            let pool = match source.pool_counters() {
                Ok(counters) => {
                    metrics::record_pool_counters(source.pool_name(), &counters);
                    PoolReading::Counters(counters)
                }
                Err(e) => {
                    tracing::debug!(pool = %source.pool_name(), error = %e, "Pool counters unavailable");
                    PoolReading::Unavailable
                }
            };
            PoolMetric {
                name: source.pool_name().to_string(),
                pool,
            }
        })
        .collect();

    PoolMetrics {
        connection_pools: sources.len(),
        metrics,
    }
}
