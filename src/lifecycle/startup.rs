//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn every configured pool into a supervised resource
//! - Register pools and upstreams as health subsystems, in config order
//! - Kick off the first initialization of every pool
//!
//! # Design Decisions
//! - Fail fast: a pool that cannot be built is a startup error
//! - A pool that cannot connect is not; it starts failed and heals

use std::sync::Arc;
use thiserror::Error;

use crate::config::{PoolConfig, ServiceConfig};
use crate::health::{MemoryHealthCache, ProbeSettings, ProbeTarget, Prober, Subsystem, UpstreamCheck};
use crate::pool::{ConnectionPool, PoolSource};
use crate::resource::{ManagedResource, Resource, ResourceError, ResourceResult, ResourceStatus};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to build resource: {0}")]
    Resource(#[from] ResourceError),
}

/// Everything the health server needs.
pub struct Components {
    pub service_name: String,
    pub prober: Arc<Prober>,
    pub subsystems: Vec<Arc<dyn Subsystem>>,
    pub pools: Vec<Arc<dyn PoolSource>>,
    pub resources: Vec<Arc<dyn ManagedResource>>,
}

impl Components {
    /// Build resources and probe targets. Must run inside a Tokio runtime
    /// when any pool uses auto-init or periodic checks.
    pub fn build(config: &ServiceConfig) -> Result<Self, StartupError> {
        let prober = Arc::new(Prober::new(
            Arc::new(MemoryHealthCache::new()),
            ProbeSettings::from(&config.health),
        ));

        let mut subsystems: Vec<Arc<dyn Subsystem>> = Vec::new();
        let mut pools: Vec<Arc<dyn PoolSource>> = Vec::new();
        let mut resources: Vec<Arc<dyn ManagedResource>> = Vec::new();

        for pool_config in &config.pools {
            let resource = pool_resource(pool_config)?;
            subsystems.push(Arc::new(resource.probe_target(Arc::clone(&prober))));
            pools.push(Arc::new(resource.clone()));
            resources.push(Arc::new(resource));
        }

        for upstream in &config.upstreams {
            let check = Arc::new(UpstreamCheck::new(upstream));
            tracing::debug!(upstream = %check.name(), target = %check.target(), "Registered upstream");
            subsystems.push(Arc::new(upstream_target(check, Arc::clone(&prober))));
        }

        tracing::info!(
            pools = pools.len(),
            upstreams = config.upstreams.len(),
            "Components built"
        );

        Ok(Self {
            service_name: config.service_name.clone(),
            prober,
            subsystems,
            pools,
            resources,
        })
    }
}

impl Components {
    /// Spawn `init` for every resource still `uninitialized`. Must run inside
    /// a Tokio runtime. A failed attempt is left to the resource's heal
    /// strategy.
    pub fn start(&self) {
        for resource in &self.resources {
            if resource.snapshot().status != ResourceStatus::Uninitialized {
                continue;
            }
            let resource = Arc::clone(resource);
            tokio::spawn(async move {
                match resource.init().await {
                    Ok(()) => tracing::debug!(resource = %resource.name(), "Initial connection established"),
                    Err(e) => tracing::debug!(resource = %resource.name(), error = %e, "Initial connection failed"),
                }
            });
        }
    }
}

fn upstream_target(check: Arc<UpstreamCheck>, prober: Arc<Prober>) -> ProbeTarget {
    let name = check.name().to_string();
    ProbeTarget::new(name, prober, move || {
        let check = Arc::clone(&check);
        async move { check.check().await }
    })
}

/// Supervised TCP pool: init connects, the check pings, teardown closes.
pub fn pool_resource(config: &PoolConfig) -> ResourceResult<Resource<ConnectionPool>> {
    let pool_config = config.clone();
    Resource::builder(config.name.clone(), move || {
        let pool_config = pool_config.clone();
        async move { ConnectionPool::connect(&pool_config).await }
    })
    .try_healthcheck(|pool: Arc<ConnectionPool>| async move { pool.ping().await.map(|()| true) })
    .teardown(|pool: Arc<ConnectionPool>| async move { pool.close() })
    .settings(&config.resource)
    .build()
}
