//! Shared harness for the API integration tests: an in-memory registry,
//! stub agents and request helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use rollout_agent::{
    AgentChannel, AgentChannelFactory, AgentManagerConfig, AgentNotification, ChannelError,
    ServiceHealthReport, UpdateAck,
};
use rollout_api::config::{MetricsConfig, ServerConfig};
use rollout_api::metrics::MetricsFetcher;
use rollout_api::router::build_app_router;
use rollout_api::state::AppState;
use rollout_api::ws::WsManager;
use rollout_core::health::ServiceStatus;
use rollout_core::run_state::RunState;
use rollout_orchestrator::{BatchOrchestrator, OrchestratorConfig};
use rollout_registry::{HostEntry, HostRegistry, MemoryRegistry, PendingUpdate};
use tokio::sync::{broadcast, Notify};
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults and short batch timings.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        registry_path: "unused.json".into(),
        agent: AgentManagerConfig::default(),
        orchestrator: OrchestratorConfig {
            health_poll_interval: Duration::from_millis(20),
            verify_timeout: Duration::from_secs(2),
            ack_timeout: Duration::from_secs(2),
            tick_interval: Duration::from_millis(50),
        },
        metrics: MetricsConfig {
            timeout: Duration::from_millis(500),
            ..MetricsConfig::default()
        },
    }
}

// ---------------------------------------------------------------------------
// Stub agents
// ---------------------------------------------------------------------------

/// Agent that accepts every update, reports `running` and one healthy
/// service. With a gate set, acknowledgements wait for `gate.notify_one()`.
pub struct StubAgent {
    endpoint: String,
    gate: Option<Arc<Notify>>,
    notify_tx: broadcast::Sender<AgentNotification>,
}

#[async_trait]
impl AgentChannel for StubAgent {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request_update(&self, stack: &str) -> Result<UpdateAck, ChannelError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let _ = self.notify_tx.send(AgentNotification {
            endpoint: self.endpoint.clone(),
            stack: stack.to_string(),
            run_state: RunState::Running,
        });
        Ok(UpdateAck::accepted())
    }

    fn subscribe(&self) -> broadcast::Receiver<AgentNotification> {
        self.notify_tx.subscribe()
    }

    async fn query_service_health(&self, _stack: &str) -> Result<ServiceHealthReport, ChannelError> {
        Ok(ServiceHealthReport {
            ok: true,
            services: vec![ServiceStatus {
                name: "web".into(),
                state: "running".into(),
            }],
            error: None,
        })
    }
}

#[derive(Default)]
pub struct StubFactory {
    agents: HashMap<String, Arc<StubAgent>>,
}

impl StubFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn agent(mut self, endpoint: &str) -> Self {
        self.insert(endpoint, None);
        self
    }

    /// Agent whose acknowledgements wait for the returned gate.
    pub fn gated_agent(mut self, endpoint: &str) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.insert(endpoint, Some(Arc::clone(&gate)));
        (self, gate)
    }

    fn insert(&mut self, endpoint: &str, gate: Option<Arc<Notify>>) {
        let (notify_tx, _) = broadcast::channel(16);
        self.agents.insert(
            endpoint.to_string(),
            Arc::new(StubAgent {
                endpoint: endpoint.to_string(),
                gate,
                notify_tx,
            }),
        );
    }
}

#[async_trait]
impl AgentChannelFactory for StubFactory {
    async fn channel(&self, endpoint: &str) -> Result<Arc<dyn AgentChannel>, ChannelError> {
        self.agents
            .get(endpoint)
            .map(|agent| Arc::clone(agent) as Arc<dyn AgentChannel>)
            .ok_or_else(|| ChannelError::Connection(format!("No agent at {endpoint}")))
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub fn host(hostname: &str, endpoint: &str, stacks: &[&str]) -> HostEntry {
    HostEntry {
        hostname: hostname.to_string(),
        endpoint: endpoint.to_string(),
        updates: stacks.iter().map(|s| PendingUpdate::new(*s)).collect(),
    }
}

/// Build the full application router over an in-memory registry.
///
/// Uses the same `build_app_router` as `main.rs` so tests exercise the
/// production middleware stack.
pub fn build_test_app(hosts: Vec<HostEntry>, factory: StubFactory) -> TestApp {
    build_test_app_with(hosts, factory, test_config())
}

pub fn build_test_app_with(
    hosts: Vec<HostEntry>,
    factory: StubFactory,
    config: ServerConfig,
) -> TestApp {
    build_test_app_on(Arc::new(MemoryRegistry::new(hosts)), factory, config)
}

/// Build the app over any registry backend.
pub fn build_test_app_on(
    registry: Arc<dyn HostRegistry>,
    factory: StubFactory,
    config: ServerConfig,
) -> TestApp {
    let orchestrator = BatchOrchestrator::new(
        registry.clone(),
        Arc::new(factory),
        config.orchestrator.clone(),
    );
    let metrics = Arc::new(MetricsFetcher::new(&config.metrics).expect("metrics client"));

    let state = AppState {
        config: Arc::new(config.clone()),
        registry,
        orchestrator,
        ws_manager: Arc::new(WsManager::new()),
        metrics,
    };

    TestApp {
        router: build_app_router(state.clone(), &config),
        state,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(
    app: &TestApp,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: &TestApp, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn put_json(app: &TestApp, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(body)).await
}

pub async fn delete(app: &TestApp, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Wait (bounded) for the running batch to complete.
pub async fn wait_idle(app: &TestApp) {
    tokio::time::timeout(Duration::from_secs(10), app.state.orchestrator.wait_idle())
        .await
        .expect("batch completes in time");
}
