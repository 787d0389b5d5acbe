//! Resource error definitions.

use std::time::Duration;
use thiserror::Error;

use crate::health::check::ProbeError;
use crate::resource::state::ResourceStatus;

/// Errors surfaced by a supervised resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// `get()` called while the resource is not ready.
    #[error("resource '{name}' is not ready (status: {status})")]
    NotReady { name: String, status: ResourceStatus },

    /// Operation on a closed resource.
    #[error("resource '{0}' is closed")]
    Closed(String),

    /// The user-supplied `initialize` failed.
    #[error("initialization of '{name}' failed: {message}")]
    Initialization { name: String, message: String },

    /// `initialize` did not finish within its deadline.
    #[error("initialization of '{name}' timed out after {timeout:?}")]
    InitTimeout { name: String, timeout: Duration },

    /// The health check returned false, failed, or timed out.
    #[error("health check of '{name}' failed: {message}")]
    HealthCheck { name: String, message: String },

    /// Background tasks were requested outside a Tokio runtime.
    #[error("resource '{0}' needs a Tokio runtime for auto-init or periodic checks")]
    NoRuntime(String),

    #[error("invalid resource configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

impl ResourceError {
    pub fn is_not_ready(&self) -> bool {
        matches!(self, ResourceError::NotReady { .. })
    }
}

impl From<ResourceError> for ProbeError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::InvalidConfig(_) | ResourceError::NoRuntime(_) => {
                ProbeError::Configuration(err.to_string())
            }
            other => ProbeError::Dependency(other.to_string()),
        }
    }
}
