use std::sync::Arc;

use rollout_orchestrator::BatchOrchestrator;
use rollout_registry::HostRegistry;

use crate::config::ServerConfig;
use crate::metrics::MetricsFetcher;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Host registry (pending updates per host).
    pub registry: Arc<dyn HostRegistry>,
    /// Batch update orchestrator.
    pub orchestrator: Arc<BatchOrchestrator>,
    /// WebSocket connection manager (browser clients).
    pub ws_manager: Arc<WsManager>,
    /// Host metrics fan-out client.
    pub metrics: Arc<MetricsFetcher>,
}
