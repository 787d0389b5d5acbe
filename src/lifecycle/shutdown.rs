//! Shutdown coordination.

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::resource::ManagedResource;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of tasks still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Close every resource concurrently. Returns false if `limit` elapsed first.
pub async fn close_all(resources: &[Arc<dyn ManagedResource>], limit: Duration) -> bool {
    let closing = join_all(resources.iter().map(|resource| resource.close()));
    match tokio::time::timeout(limit, closing).await {
        Ok(_) => {
            tracing::info!(count = resources.len(), "All resources closed");
            true
        }
        Err(_) => {
            tracing::warn!(timeout = ?limit, "Timed out closing resources");
            false
        }
    }
}
