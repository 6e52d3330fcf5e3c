//! Handlers for the host registry (`/hosts`, `/agents`).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use rollout_registry::{HostEntry, PendingUpdate};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `PUT /hosts/updates`.
#[derive(Debug, Deserialize)]
pub struct SetUpdatesRequest {
    pub hostname: String,
    pub endpoint: String,
    #[serde(default)]
    pub updates: Vec<PendingUpdate>,
}

/// Body of `POST /hosts/remove-update`.
#[derive(Debug, Deserialize)]
pub struct RemoveUpdateRequest {
    pub stack: String,
    pub hostname: String,
}

#[derive(Debug, Serialize)]
pub struct RemoveUpdateResponse {
    pub removed: bool,
}

/// Body of `POST /agents/alive`.
#[derive(Debug, Deserialize)]
pub struct AgentAliveRequest {
    pub hostname: String,
    pub endpoint: String,
}

#[derive(Debug, Serialize)]
pub struct AgentAliveResponse {
    /// `true` when the endpoint was not registered before.
    pub registered: bool,
}

/// GET /api/hosts
pub async fn list_hosts(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<HostEntry>>>> {
    let hosts = state.registry.list_hosts().await?;
    Ok(Json(DataResponse { data: hosts }))
}

/// PUT /api/hosts
///
/// Replace the whole registry. Every entry must name a hostname and an
/// endpoint; otherwise nothing is written.
pub async fn replace_hosts(
    State(state): State<AppState>,
    Json(hosts): Json<Vec<HostEntry>>,
) -> AppResult<StatusCode> {
    state.registry.replace_all(hosts).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/hosts/updates
///
/// Replace the pending updates reported for one endpoint.
pub async fn set_updates(
    State(state): State<AppState>,
    Json(input): Json<SetUpdatesRequest>,
) -> AppResult<Json<DataResponse<HostEntry>>> {
    let entry = state
        .registry
        .set_updates(&input.hostname, &input.endpoint, input.updates)
        .await?;
    tracing::info!(
        hostname = %entry.hostname,
        endpoint = %entry.endpoint,
        updates = entry.updates.len(),
        "Pending updates recorded",
    );
    Ok(Json(DataResponse { data: entry }))
}

/// POST /api/hosts/remove-update
///
/// Returns 404 when the host is unknown; `removed: false` when the host had
/// no such update.
pub async fn remove_update(
    State(state): State<AppState>,
    Json(input): Json<RemoveUpdateRequest>,
) -> AppResult<Json<DataResponse<RemoveUpdateResponse>>> {
    let removed = state
        .registry
        .remove_update(&input.stack, &input.hostname)
        .await?;
    tracing::info!(
        stack = %input.stack,
        hostname = %input.hostname,
        removed,
        "Pending update removal requested",
    );
    Ok(Json(DataResponse {
        data: RemoveUpdateResponse { removed },
    }))
}

/// POST /api/agents/alive
pub async fn agent_alive(
    State(state): State<AppState>,
    Json(input): Json<AgentAliveRequest>,
) -> AppResult<Json<DataResponse<AgentAliveResponse>>> {
    let registered = state
        .registry
        .register_agent(&input.hostname, &input.endpoint)
        .await?;
    if registered {
        tracing::info!(
            hostname = %input.hostname,
            endpoint = %input.endpoint,
            "New agent registered",
        );
    } else {
        tracing::debug!(endpoint = %input.endpoint, "Agent heartbeat");
    }
    Ok(Json(DataResponse {
        data: AgentAliveResponse { registered },
    }))
}
