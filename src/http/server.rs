//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router for the health endpoints
//! - Wire up middleware (tracing, request timeout)
//! - Serve until the shutdown signal fires

use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::health::Subsystem;
use crate::http::handlers;
use crate::lifecycle::Components;
use crate::pool::PoolSource;
use crate::resource::ManagedResource;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub service_name: Arc<str>,
    pub subsystems: Arc<[Arc<dyn Subsystem>]>,
    pub pools: Arc<[Arc<dyn PoolSource>]>,
    pub resources: Arc<[Arc<dyn ManagedResource>]>,
}

impl From<&Components> for AppState {
    fn from(components: &Components) -> Self {
        Self {
            service_name: Arc::from(components.service_name.as_str()),
            subsystems: components.subsystems.iter().cloned().collect(),
            pools: components.pools.iter().cloned().collect(),
            resources: components.resources.iter().cloned().collect(),
        }
    }
}

/// HTTP server for the health endpoints.
pub struct HealthServer {
    router: Router,
}

impl HealthServer {
    pub fn new(state: AppState, request_timeout: Duration) -> Self {
        Self {
            router: Self::build_router(state, request_timeout),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, request_timeout: Duration) -> Router {
        Router::new()
            .route("/health", get(handlers::system_health))
            .route("/health/db", get(handlers::pool_metrics))
            .route("/health/resources", get(handlers::resources))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(request_timeout)),
            )
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Health server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}
