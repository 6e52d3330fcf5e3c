//! Integration tests for `GET /api/fetch-all-metrics` against live fake hosts.

mod common;

use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::routing::get as get_route;
use axum::{Json, Router};
use common::{body_json, build_test_app_with, get, host, test_config, StubFactory};
use serde_json::json;

/// Serve `router` on an ephemeral port.
async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn healthy_host(cpu: u64) -> SocketAddr {
    serve(Router::new().route(
        "/metrics",
        get_route(move || async move { Json(json!({ "cpu": cpu, "mem": 40 })) }),
    ))
    .await
}

async fn broken_host() -> SocketAddr {
    serve(Router::new().route(
        "/metrics",
        get_route(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
    ))
    .await
}

/// An address nothing listens on.
async fn closed_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

#[tokio::test]
async fn fetch_all_reports_each_host() {
    let local = healthy_host(7).await;
    let remote = healthy_host(55).await;
    let broken = broken_host().await;
    let closed = closed_addr().await;

    let mut config = test_config();
    config.metrics.local_addr = local.to_string();

    let app = build_test_app_with(
        vec![
            host("nas", "Actual", &["web"]),
            host("edge", &remote.to_string(), &[]),
            host("flaky", &broken.to_string(), &[]),
            host("gone", &closed.to_string(), &[]),
        ],
        StubFactory::new(),
        config,
    );

    let response = get(&app, "/api/fetch-all-metrics").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let hosts = json["hosts"].as_array().expect("raw hosts array");
    assert_eq!(hosts.len(), 4);

    assert_eq!(hosts[0]["hostname"], "nas");
    assert_eq!(hosts[0]["status"], "ok");
    assert_eq!(hosts[0]["metrics"]["cpu"], 7);
    assert_eq!(hosts[0]["has_updates"], true);

    assert_eq!(hosts[1]["status"], "ok");
    assert_eq!(hosts[1]["metrics"]["cpu"], 55);
    assert_eq!(hosts[1]["has_updates"], false);
    assert!(hosts[1].get("error").is_none());

    assert_eq!(hosts[2]["status"], "error");
    assert_eq!(hosts[2]["error"], "HTTP 503");
    assert!(hosts[2].get("metrics").is_none());

    assert_eq!(hosts[3]["hostname"], "gone");
    assert_eq!(hosts[3]["status"], "error");
    assert!(hosts[3]["error"].is_string());
}

#[tokio::test]
async fn fetch_all_with_empty_registry() {
    let app = build_test_app_with(Vec::new(), StubFactory::new(), test_config());

    let json = body_json(get(&app, "/api/fetch-all-metrics").await).await;
    assert_eq!(json, json!({ "hosts": [] }));
}
