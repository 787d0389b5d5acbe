//! Probe result cache.
//!
//! Entries are keyed by subsystem name, overwritten on every refresh and never
//! evicted. Each name also owns an async lock so that only one probe for a
//! given subsystem runs at a time.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::health::status::SystemHealth;

/// The most recent report for one subsystem.
#[derive(Debug, Clone)]
pub struct CachedProbe {
    pub report: SystemHealth,
    /// Monotonic instant the report was produced.
    pub checked_at: Instant,
}

impl CachedProbe {
    pub fn new(report: SystemHealth) -> Self {
        Self {
            report,
            checked_at: Instant::now(),
        }
    }
}

/// Storage for cached probe results.
pub trait HealthCache: Send + Sync {
    fn get(&self, name: &str) -> Option<CachedProbe>;

    fn set(&self, name: &str, entry: CachedProbe);

    /// Lock serializing probes for `name`.
    fn entry_lock(&self, name: &str) -> Arc<Mutex<()>>;
}

/// Concurrent in-memory cache.
#[derive(Debug, Default)]
pub struct MemoryHealthCache {
    entries: DashMap<String, CachedProbe>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl MemoryHealthCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl HealthCache for MemoryHealthCache {
    fn get(&self, name: &str) -> Option<CachedProbe> {
        self.entries.get(name).map(|r| r.value().clone())
    }

    fn set(&self, name: &str, entry: CachedProbe) {
        self.entries.insert(name.to_string(), entry);
    }

    fn entry_lock(&self, name: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
