use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rollout_core::error::CoreError;
use rollout_orchestrator::OrchestratorError;
use rollout_registry::RegistryError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps the registry and orchestrator errors and adds an HTTP-specific variant.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A host registry read or write failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A batch operation was refused.
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Registry(err) => match err {
                RegistryError::HostNotFound(_) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
                }
                RegistryError::Invalid(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                RegistryError::Io(_) | RegistryError::Serialization(_) => {
                    tracing::error!(error = %err, "Registry error");
                    internal()
                }
            },

            AppError::Orchestrator(err) => match err {
                OrchestratorError::Invalid(CoreError::Validation(msg)) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                OrchestratorError::BatchActive => {
                    (StatusCode::CONFLICT, "BATCH_ACTIVE", err.to_string())
                }
                OrchestratorError::NoActiveBatch => {
                    (StatusCode::CONFLICT, "NO_ACTIVE_BATCH", err.to_string())
                }
                OrchestratorError::StillRunning => {
                    (StatusCode::CONFLICT, "BATCH_RUNNING", err.to_string())
                }
                OrchestratorError::NoBatch => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
                OrchestratorError::ShuttingDown => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SHUTTING_DOWN",
                    err.to_string(),
                ),
                OrchestratorError::RegistryWriteFailed(msg) => {
                    tracing::error!(error = %msg, "Registry write failed");
                    internal()
                }
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
