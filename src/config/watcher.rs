//! Hot reload of the health probe settings.
//!
//! Only the `[health]` section is live; a change anywhere else in the file is
//! ignored until restart. Subscribers see the latest settings on a `watch`
//! channel and are only woken when those settings actually change.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;

use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::HealthConfig;

/// Reloads `[health]` from the configuration file whenever it changes.
pub struct ConfigWatcher {
    path: PathBuf,
    updates: watch::Sender<HealthConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver seeded with `current`.
    pub fn new(path: &Path, current: HealthConfig) -> (Self, watch::Receiver<HealthConfig>) {
        let (updates, rx) = watch::channel(current);
        (
            Self {
                path: path.to_path_buf(),
                updates,
            },
            rx,
        )
    }

    /// Re-read the file and publish its health settings.
    ///
    /// Returns whether the settings differ from the last published ones.
    pub fn reload(&self) -> Result<bool, ConfigError> {
        let health = load_config(&self.path)?.health;
        let changed = self.updates.send_if_modified(|current| {
            if *current == health {
                return false;
            }
            *current = health;
            true
        });
        Ok(changed)
    }

    fn on_event(&self, event: notify::Result<Event>) {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(path = ?self.path, error = %e, "Config watch error");
                return;
            }
        };
        if !(event.kind.is_modify() || event.kind.is_create()) {
            return;
        }

        match self.reload() {
            Ok(true) => tracing::info!(path = ?self.path, "Health settings reloaded"),
            Ok(false) => tracing::debug!(path = ?self.path, "Config changed, health settings unchanged"),
            Err(e) => tracing::warn!(
                path = ?self.path,
                error = %e,
                "Config reload rejected, keeping current health settings"
            ),
        }
    }

    /// Start watching. The returned watcher must be kept alive for updates
    /// to flow.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let mut watcher = RecommendedWatcher::new(
            move |event: notify::Result<Event>| self.on_event(event),
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}
