//! Check outcomes and probe error classification.

use futures_util::future::BoxFuture;
use std::sync::Arc;
use thiserror::Error;

use crate::health::status::{HealthStatus, SystemHealth};

/// Result of a single health check.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// Subsystem is fully operational.
    Healthy,
    /// Working, but with reduced capability.
    Degraded(String),
    /// Not working.
    Unhealthy(String),
    /// State cannot be determined yet.
    Unknown(String),
    /// A structured report produced by the subsystem itself.
    Report(SystemHealth),
}

/// Errors raised by a check function.
///
/// Configuration errors point at a missing or misconfigured dependency and
/// report `impaired`; everything else reports `failure`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Dependency(String),
}

impl ProbeError {
    pub fn status(&self) -> HealthStatus {
        match self {
            ProbeError::Configuration(_) => HealthStatus::Impaired,
            ProbeError::Dependency(_) => HealthStatus::Failure,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ProbeError::Configuration(m) | ProbeError::Dependency(m) => m,
        }
    }
}

/// Shared, type-erased check function.
pub type CheckFn =
    Arc<dyn Fn() -> BoxFuture<'static, Result<CheckOutcome, ProbeError>> + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = ProbeError::Configuration("missing DATABASE_URL".into());
        assert_eq!(err.status(), HealthStatus::Impaired);
        assert_eq!(err.to_string(), "missing DATABASE_URL");

        let err = ProbeError::Dependency("connection refused".into());
        assert_eq!(err.status(), HealthStatus::Failure);
        assert_eq!(err.message(), "connection refused");
    }
}
