use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rollout_agent::AgentManager;
use rollout_orchestrator::BatchOrchestrator;
use rollout_registry::FileRegistry;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rollout_api::config::ServerConfig;
use rollout_api::engine::forwarder::spawn_event_forwarder;
use rollout_api::metrics::MetricsFetcher;
use rollout_api::router::build_app_router;
use rollout_api::state::AppState;
use rollout_api::ws;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "rollout_api=debug,rollout_orchestrator=debug,rollout_agent=info,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Host registry ---
    let registry = Arc::new(FileRegistry::new(config.registry_path.clone()));
    tracing::info!(path = %config.registry_path.display(), "Host registry opened");

    // --- Agent connections ---
    let agents = AgentManager::new(config.agent.clone());

    // --- Orchestrator ---
    let orchestrator = BatchOrchestrator::new(
        registry.clone(),
        agents.clone(),
        config.orchestrator.clone(),
    );
    tracing::info!(
        verify_timeout_secs = config.orchestrator.verify_timeout.as_secs(),
        ack_timeout_secs = config.orchestrator.ack_timeout.as_secs(),
        "Batch orchestrator ready",
    );

    // --- WebSocket manager ---
    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat = ws::start_heartbeat(Arc::clone(&ws_manager), ws::HEARTBEAT_INTERVAL);

    // --- Event forwarding ---
    let forwarder_cancel = CancellationToken::new();
    let forwarder_handle = spawn_event_forwarder(
        Arc::clone(&orchestrator),
        Arc::clone(&ws_manager),
        forwarder_cancel.clone(),
    );

    // --- Metrics client ---
    let metrics =
        Arc::new(MetricsFetcher::new(&config.metrics).expect("Failed to build metrics client"));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        registry,
        orchestrator: Arc::clone(&orchestrator),
        ws_manager: Arc::clone(&ws_manager),
        metrics,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Stop the batch runner before its agent connections go away.
    orchestrator.shutdown().await;

    agents.shutdown().await;
    tracing::info!("Agent connections closed");

    forwarder_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), forwarder_handle).await;

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    drop(heartbeat);
    tracing::info!("Heartbeat task stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
