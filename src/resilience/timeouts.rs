//! Timeout enforcement.
//!
//! Every call into an external dependency (initialization, health checks,
//! connection attempts) can be given a deadline. Timeouts are reported as a
//! distinct error so callers can classify them.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// The deadline elapsed before the operation completed.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("operation timed out after {0:?}")]
pub struct TimedOut(pub Duration);

/// Run `fut`, bounded by `limit` when one is given.
pub async fn with_deadline<F>(limit: Option<Duration>, fut: F) -> Result<F::Output, TimedOut>
where
    F: Future,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| TimedOut(limit)),
        None => Ok(fut.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_elapses() {
        let result = with_deadline(Some(Duration::from_millis(50)), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            7
        })
        .await;
        assert_eq!(result, Err(TimedOut(Duration::from_millis(50))));
    }

    #[tokio::test]
    async fn test_no_deadline() {
        let result = with_deadline(None, async { 7 }).await;
        assert_eq!(result, Ok(7));
    }
}
