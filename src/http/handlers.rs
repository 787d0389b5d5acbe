use axum::{extract::State, http::StatusCode, Json};

use crate::health::{poll_system_health, HealthStatus, SystemHealth};
use crate::http::server::AppState;
use crate::pool::{collect_pool_metrics, PoolMetrics};
use crate::resource::ResourceSnapshot;

/// Aggregate report; 503 when any subsystem is failing.
pub async fn system_health(State(state): State<AppState>) -> (StatusCode, Json<SystemHealth>) {
    let report = poll_system_health(&state.service_name, &state.subsystems).await;
    let code = match report.status {
        HealthStatus::Failure => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (code, Json(report))
}

pub async fn pool_metrics(State(state): State<AppState>) -> Json<PoolMetrics> {
    Json(collect_pool_metrics(&state.pools))
}

pub async fn resources(State(state): State<AppState>) -> Json<Vec<ResourceSnapshot>> {
    Json(state.resources.iter().map(|r| r.snapshot()).collect())
}
