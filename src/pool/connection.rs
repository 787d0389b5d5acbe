//! TCP connection pool.
//!
//! # Responsibilities
//! - Bound concurrent connections to a dependency
//! - Reuse idle connections
//! - Track used, free, and pending counts for metrics
//!
//! # Design Decisions
//! - A semaphore bounds checked-out connections; idle streams sit in a Vec
//! - Checked-out connections are RAII guards that return the stream on drop

use std::net::SocketAddr;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::PoolConfig;
use crate::pool::metrics::{PoolCounters, PoolStats};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("invalid pool address '{0}'")]
    InvalidAddress(String),

    #[error("failed to connect to {addr}: {message}")]
    Connect { addr: SocketAddr, message: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("pool is closed")]
    Closed,
}

/// Counts itself in while alive.
struct Pending<'a>(&'a AtomicUsize);

impl<'a> Pending<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

#[derive(Debug)]
pub struct ConnectionPool {
    name: String,
    addr: SocketAddr,
    connect_timeout: Duration,
    max_connections: usize,
    idle: Mutex<Vec<TcpStream>>,
    permits: Arc<Semaphore>,
    used: AtomicUsize,
    pending_creates: AtomicUsize,
    pending_acquires: AtomicUsize,
    closed: AtomicBool,
}

impl ConnectionPool {
    /// Create a pool and open one connection to prove the dependency is reachable.
    pub async fn connect(config: &PoolConfig) -> Result<Self, PoolError> {
        let addr: SocketAddr = config
            .address
            .parse()
            .map_err(|_| PoolError::InvalidAddress(config.address.clone()))?;

        let pool = Self {
            name: config.name.clone(),
            addr,
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            max_connections: config.max_connections,
            idle: Mutex::new(Vec::with_capacity(config.max_connections)),
            permits: Arc::new(Semaphore::new(config.max_connections)),
            used: AtomicUsize::new(0),
            pending_creates: AtomicUsize::new(0),
            pending_acquires: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        };

        let stream = pool.open().await?;
        pool.idle_streams().push(stream);

        tracing::info!(
            pool = %pool.name,
            addr = %pool.addr,
            max_connections = pool.max_connections,
            "Connection pool ready"
        );
        Ok(pool)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    fn idle_streams(&self) -> std::sync::MutexGuard<'_, Vec<TcpStream>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn open(&self) -> Result<TcpStream, PoolError> {
        let _creating = Pending::enter(&self.pending_creates);
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(self.addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(PoolError::Connect {
                addr: self.addr,
                message: e.to_string(),
            }),
            Err(_) => Err(PoolError::Timeout(self.connect_timeout)),
        }
    }

    /// Check out a connection, waiting up to the connect timeout for a slot.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledConnection, PoolError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PoolError::Closed);
        }

        let permit = {
            let _waiting = Pending::enter(&self.pending_acquires);
            match tokio::time::timeout(self.connect_timeout, Arc::clone(&self.permits).acquire_owned()).await {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return Err(PoolError::Closed),
                Err(_) => return Err(PoolError::Timeout(self.connect_timeout)),
            }
        };

        let reused = self.idle_streams().pop();
        let stream = match reused {
            Some(stream) => stream,
            None => self.open().await?,
        };

        self.used.fetch_add(1, Ordering::Relaxed);
        Ok(PooledConnection {
            pool: Arc::clone(self),
            stream: Some(stream),
            _permit: permit,
        })
    }

    /// Open and drop a fresh connection.
    pub async fn ping(&self) -> Result<(), PoolError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PoolError::Closed);
        }
        self.open().await.map(drop)
    }

    /// Close the pool. Checked-out connections are dropped when released.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.permits.close();
        let dropped = {
            let mut idle = self.idle_streams();
            let n = idle.len();
            idle.clear();
            n
        };
        tracing::info!(pool = %self.name, idle_dropped = dropped, "Connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn release(&self, stream: TcpStream) {
        self.used.fetch_sub(1, Ordering::Relaxed);
        if !self.is_closed() {
            self.idle_streams().push(stream);
        }
    }
}

impl PoolStats for ConnectionPool {
    fn counters(&self) -> PoolCounters {
        PoolCounters {
            used: self.used.load(Ordering::Relaxed),
            free: self.idle_streams().len(),
            pending_creates: self.pending_creates.load(Ordering::Relaxed),
            pending_acquires: self.pending_acquires.load(Ordering::Relaxed),
        }
    }
}

/// A checked-out connection, returned to the pool on drop.
#[derive(Debug)]
pub struct PooledConnection {
    pool: Arc<ConnectionPool>,
    stream: Option<TcpStream>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Drop the connection instead of returning it, e.g. after an I/O error.
    pub fn discard(mut self) {
        if self.stream.take().is_some() {
            self.pool.used.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

impl Deref for PooledConnection {
    type Target = TcpStream;

    fn deref(&self) -> &Self::Target {
        self.stream.as_ref().unwrap_or_else(|| unreachable!("stream present until drop"))
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.stream.as_mut().unwrap_or_else(|| unreachable!("stream present until drop"))
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            self.pool.release(stream);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResourceSettings;
    use tokio::net::TcpListener;

    async fn listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    fn config(address: &str, max_connections: usize) -> PoolConfig {
        PoolConfig {
            name: "test-pool".into(),
            address: address.into(),
            max_connections,
            connect_timeout_ms: 500,
            resource: ResourceSettings::default(),
        }
    }

    #[tokio::test]
    async fn test_connect_and_counters() {
        let (_listener, addr) = listener().await;
        let pool = Arc::new(ConnectionPool::connect(&config(&addr, 2)).await.unwrap());

        assert_eq!(
            pool.counters(),
            PoolCounters { used: 0, free: 1, pending_creates: 0, pending_acquires: 0 }
        );

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        assert_eq!(pool.counters().used, 2);
        assert_eq!(pool.counters().free, 0);

        drop(a);
        b.discard();
        assert_eq!(pool.counters().used, 0);
        assert_eq!(pool.counters().free, 1);
    }

    #[tokio::test]
    async fn test_acquire_times_out_when_exhausted() {
        let (_listener, addr) = listener().await;
        let pool = Arc::new(ConnectionPool::connect(&config(&addr, 1)).await.unwrap());

        let _held = pool.acquire().await.unwrap();
        let err = pool.acquire().await.unwrap_err();
        assert_eq!(err, PoolError::Timeout(Duration::from_millis(500)));
        assert_eq!(pool.counters().pending_acquires, 0);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let (listener, addr) = listener().await;
        drop(listener);

        let err = ConnectionPool::connect(&config(&addr, 1)).await.unwrap_err();
        assert!(matches!(err, PoolError::Connect { .. }));
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let err = ConnectionPool::connect(&config("not-an-address", 1)).await.unwrap_err();
        assert_eq!(err, PoolError::InvalidAddress("not-an-address".into()));
    }

    #[tokio::test]
    async fn test_close_rejects_new_work() {
        let (_listener, addr) = listener().await;
        let pool = Arc::new(ConnectionPool::connect(&config(&addr, 2)).await.unwrap());

        let held = pool.acquire().await.unwrap();
        pool.close();
        pool.close();

        assert_eq!(pool.acquire().await.unwrap_err(), PoolError::Closed);
        assert_eq!(pool.ping().await.unwrap_err(), PoolError::Closed);

        drop(held);
        assert_eq!(pool.counters().free, 0);
        assert_eq!(pool.counters().used, 0);
    }
}
