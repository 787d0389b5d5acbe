//! HTTP checks against upstream services.
//!
//! # Responsibilities
//! - Issue `GET <base_url><path>` with a deadline
//! - Forward a structured `SystemHealth` body when the upstream sends one,
//!   never less severe than the HTTP status implies
//! - Otherwise map the HTTP status onto a check outcome
//!
//! # Design Decisions
//! - An unparseable URL is a configuration error (reported as impaired)
//! - Connection errors and timeouts are dependency errors (reported as failure)
//! - 5xx is unhealthy, any other non-success status is degraded

use axum::body::Body;
use axum::http::{Request, StatusCode, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::time::Duration;
use tokio::time;

use crate::config::UpstreamConfig;
use crate::health::check::{CheckOutcome, ProbeError};
use crate::health::status::{HealthStatus, SystemHealth};

const MAX_BODY_BYTES: usize = 64 * 1024;

/// Health check for one upstream HTTP service.
#[derive(Clone)]
pub struct UpstreamCheck {
    name: String,
    target: String,
    timeout: Duration,
    client: Client<HttpConnector, Body>,
}

impl UpstreamCheck {
    pub fn new(config: &UpstreamConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            name: config.name.clone(),
            target: format!("{}{}", config.base_url.trim_end_matches('/'), config.path),
            timeout: Duration::from_secs(config.timeout_secs),
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full URL probed by this check.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub async fn check(&self) -> Result<CheckOutcome, ProbeError> {
        let uri: Uri = self.target.parse().map_err(|e| {
            ProbeError::Configuration(format!("invalid upstream URL '{}': {}", self.target, e))
        })?;

        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .header("user-agent", "resource-supervisor-health-check")
            .body(Body::empty())
            .map_err(|e| ProbeError::Configuration(format!("failed to build request: {}", e)))?;

        let response = match time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!(upstream = %self.name, error = %e, "Upstream check failed: connection error");
                return Err(ProbeError::Dependency(format!("connection error: {}", e)));
            }
            Err(_) => {
                tracing::warn!(upstream = %self.name, "Upstream check failed: timeout");
                return Err(ProbeError::Dependency(format!(
                    "no response within {:?}",
                    self.timeout
                )));
            }
        };

        let status = response.status();
        let body = match axum::body::to_bytes(Body::new(response.into_body()), MAX_BODY_BYTES).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(
                    upstream = %self.name,
                    limit = MAX_BODY_BYTES,
                    error = %e,
                    "Upstream health body unreadable, using status code only"
                );
                Default::default()
            }
        };

        if let Ok(report) = serde_json::from_slice::<SystemHealth>(&body) {
            return Ok(CheckOutcome::Report(at_least_as_severe(report, status)));
        }

        let message = format!("upstream responded with {}", status);
        Ok(match status_floor(status) {
            HealthStatus::Failure => CheckOutcome::Unhealthy(message),
            HealthStatus::Impaired => CheckOutcome::Degraded(message),
            _ => CheckOutcome::Healthy,
        })
    }
}

/// Least severe status an HTTP response code allows.
fn status_floor(status: StatusCode) -> HealthStatus {
    if status.is_success() {
        HealthStatus::Active
    } else if status.is_server_error() {
        HealthStatus::Failure
    } else {
        HealthStatus::Impaired
    }
}

/// Raise `report` to the HTTP status floor, keeping its children.
fn at_least_as_severe(mut report: SystemHealth, status: StatusCode) -> SystemHealth {
    let floor = status_floor(status);
    if floor.severity() > report.status.severity() {
        report.status_message = Some(match report.status_message.take() {
            Some(reported) => format!("upstream responded with {}: {}", status, reported),
            None => format!("upstream responded with {}", status),
        });
        report.status = floor;
    }
    report
}
