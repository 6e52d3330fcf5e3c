//! Handlers for the `/batch` resource: start, observe, cancel and dismiss
//! a batch rollout.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use rollout_core::batch::BatchRun;
use rollout_core::update::UpdateRequest;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `POST /batch`.
#[derive(Debug, Deserialize)]
pub struct StartBatchRequest {
    pub requests: Vec<UpdateRequest>,
}

/// GET /api/batch
///
/// Current batch snapshot; `data` is `null` when no batch exists.
pub async fn get_batch(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Option<BatchRun>>>> {
    let run = state.orchestrator.snapshot().await;
    Ok(Json(DataResponse { data: run }))
}

/// POST /api/batch
///
/// Start a batch. Returns 409 while another batch is still running and 400
/// when no valid request is left after de-duplication.
pub async fn start_batch(
    State(state): State<AppState>,
    Json(input): Json<StartBatchRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<BatchRun>>)> {
    if input.requests.is_empty() {
        return Err(AppError::BadRequest(
            "requests must contain at least one update".into(),
        ));
    }
    let run = state.orchestrator.start(input.requests).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: run })))
}

/// POST /api/batch/cancel
pub async fn cancel_batch(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<BatchRun>>> {
    let run = state.orchestrator.cancel().await?;
    Ok(Json(DataResponse { data: run }))
}

/// DELETE /api/batch
///
/// Forget a completed batch. Returns 409 while it is still running.
pub async fn dismiss_batch(State(state): State<AppState>) -> AppResult<StatusCode> {
    state.orchestrator.dismiss().await?;
    Ok(StatusCode::NO_CONTENT)
}
