pub mod batch;
pub mod health;
pub mod hosts;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                       batch event stream (WebSocket)
///
/// /hosts                    list, replace (GET, PUT)
/// /hosts/updates            replace one endpoint's pending updates (PUT)
/// /hosts/remove-update      remove one pending update (POST)
/// /agents/alive             register / refresh an agent (POST)
/// /fetch-all-metrics        host metrics fan-out (GET)
///
/// /batch                    snapshot, start, dismiss (GET, POST, DELETE)
/// /batch/cancel             cancel the running batch (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/hosts", hosts::router())
        .route("/agents/alive", post(handlers::hosts::agent_alive))
        .route(
            "/fetch-all-metrics",
            get(handlers::metrics::fetch_all_metrics),
        )
        .nest("/batch", batch::router())
}
