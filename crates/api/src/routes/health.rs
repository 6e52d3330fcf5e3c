use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the host registry can be read.
    pub registry_healthy: bool,
    /// Whether a batch is currently running.
    pub batch_running: bool,
    /// Connected browser clients.
    pub ws_connections: usize,
}

/// GET /health -- returns service and registry health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry_healthy = state.registry.list_hosts().await.is_ok();
    let batch_running = state
        .orchestrator
        .snapshot()
        .await
        .is_some_and(|run| !run.completed);

    let status = if registry_healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        registry_healthy,
        batch_running,
        ws_connections: state.ws_manager.connection_count().await,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
