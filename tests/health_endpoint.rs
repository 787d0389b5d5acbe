//! Health endpoint behavior against live upstreams.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use futures_util::future::join_all;
use resource_supervisor::config::{ServiceConfig, UpstreamConfig};
use resource_supervisor::http::{AppState, HealthServer};
use resource_supervisor::lifecycle::{Components, Shutdown};

mod common;

use common::{get_json, start_programmable_backend};

fn upstream(name: &str, addr: std::net::SocketAddr) -> UpstreamConfig {
    UpstreamConfig {
        name: name.into(),
        base_url: format!("http://{}", addr),
        path: "/health".into(),
        timeout_secs: 2,
    }
}

#[tokio::test]
async fn test_aggregate_over_upstreams() {
    let healthy = start_programmable_backend(|| async { (200, "ok".to_string()) }).await;
    let structured = start_programmable_backend(|| async {
        (
            200,
            r#"{"name":"tenants","status":"impaired","statusMessage":"slow replica","timeStamp":0}"#
                .to_string(),
        )
    })
    .await;

    let mut config = ServiceConfig::default();
    config.service_name = "portal".into();
    config.upstreams.push(upstream("leasing", healthy));
    config.upstreams.push(upstream("tenants", structured));

    let components = Components::build(&config).unwrap();
    let router = HealthServer::new(AppState::from(&components), Duration::from_secs(5)).router();

    let (code, body) = get_json(&router, "/health").await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["name"], "portal");
    assert_eq!(body["status"], "impaired");
    assert_eq!(body["statusMessage"], "One or more subsystems are impaired");
    assert_eq!(body["subsystems"][0]["status"], "active");
    assert_eq!(body["subsystems"][1]["statusMessage"], "slow replica");
    assert!(body["subsystems"][1]["timeStamp"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_failing_upstream_returns_503() {
    let broken = start_programmable_backend(|| async { (500, "boom".to_string()) }).await;

    let mut config = ServiceConfig::default();
    config.upstreams.push(upstream("billing", broken));

    let components = Components::build(&config).unwrap();
    let router = HealthServer::new(AppState::from(&components), Duration::from_secs(5)).router();

    let (code, body) = get_json(&router, "/health").await;
    assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "failure");
    assert!(body["subsystems"][0]["statusMessage"]
        .as_str()
        .unwrap()
        .contains("500"));
}

#[tokio::test]
async fn test_unavailable_upstream_with_active_body_is_failure() {
    let lying = start_programmable_backend(|| async {
        (
            503,
            r#"{"name":"billing","status":"active","timeStamp":0}"#.to_string(),
        )
    })
    .await;

    let mut config = ServiceConfig::default();
    config.upstreams.push(upstream("billing", lying));

    let components = Components::build(&config).unwrap();
    let router = HealthServer::new(AppState::from(&components), Duration::from_secs(5)).router();

    let (code, body) = get_json(&router, "/health").await;
    assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["subsystems"][0]["status"], "failure");
    assert!(body["subsystems"][0]["statusMessage"]
        .as_str()
        .unwrap()
        .contains("503"));
}

#[tokio::test]
async fn test_concurrent_requests_share_cached_probe() {
    let calls = Arc::new(AtomicU32::new(0));
    let counted = {
        let calls = calls.clone();
        start_programmable_backend(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { (200, "ok".to_string()) }
        })
        .await
    };

    let mut config = ServiceConfig::default();
    config.health.min_minutes_between_requests = 5;
    config.upstreams.push(upstream("leasing", counted));

    let components = Components::build(&config).unwrap();
    let router = HealthServer::new(AppState::from(&components), Duration::from_secs(5)).router();

    let responses = join_all((0..20).map(|_| get_json(&router, "/health"))).await;

    assert!(responses.iter().all(|(code, _)| *code == StatusCode::OK));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_server_stops_on_shutdown() {
    let components = Components::build(&ServiceConfig::default()).unwrap();
    let server = HealthServer::new(AppState::from(&components), Duration::from_secs(5));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let res = reqwest::Client::builder()
        .no_proxy()
        .build()
        .unwrap()
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap();
    assert!(result.unwrap().is_ok());
}
