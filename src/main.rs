//! Resource supervisor health server.
//!
//! # Architecture Overview
//!
//! ```text
//!     ┌──────────────────────────────────────────────────────────────┐
//!     │                     RESOURCE SUPERVISOR                      │
//!     │                                                              │
//!     │  config ──▶ lifecycle::startup ──▶ Resource<ConnectionPool>  │
//!     │                     │                 │  init / check / heal │
//!     │                     │                 ▼                      │
//!     │                     │            pool counters               │
//!     │                     ▼                                        │
//!     │              health::Prober ◀── upstream checks              │
//!     │                     │                                        │
//!     │                     ▼                                        │
//!     │   GET /health, /health/db, /health/resources (http)          │
//!     │                                                              │
//!     │   Cross-cutting: observability, resilience, shutdown         │
//!     └──────────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;

use resource_supervisor::config::loader::load_config;
use resource_supervisor::config::watcher::ConfigWatcher;
use resource_supervisor::config::ServiceConfig;
use resource_supervisor::health::ProbeSettings;
use resource_supervisor::http::{AppState, HealthServer};
use resource_supervisor::lifecycle::{close_all, wait_for_signal, Components, Shutdown};
use resource_supervisor::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "resource-supervisor")]
#[command(about = "Supervised resources with a health endpoint", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "resource-supervisor starting");
    tracing::info!(
        service = %config.service_name,
        bind_address = %config.listener.bind_address,
        pools = config.pools.len(),
        upstreams = config.upstreams.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let components = Components::build(&config)?;
    components.start();

    // Only probe settings are reloadable; pools and listeners need a restart.
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path, config.health.clone());
            let prober = components.prober.clone();
            tokio::spawn(async move {
                while updates.changed().await.is_ok() {
                    let settings = ProbeSettings::from(&*updates.borrow_and_update());
                    prober.update_settings(settings);
                }
            });
            match watcher.run() {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::warn!(error = %e, "Config watcher disabled");
                    None
                }
            }
        }
        None => None,
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HealthServer::new(
        AppState::from(&components),
        Duration::from_secs(config.timeouts.request_secs),
    );

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;

    close_all(
        &components.resources,
        Duration::from_secs(config.timeouts.shutdown_secs),
    )
    .await;

    tracing::info!("Shutdown complete");
    Ok(())
}
