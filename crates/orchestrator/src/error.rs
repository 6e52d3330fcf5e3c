use rollout_core::error::CoreError;
use rollout_registry::RegistryError;

/// Errors returned by [`BatchOrchestrator`](crate::BatchOrchestrator) operations.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// `start` while another batch has not completed.
    #[error("A batch is already running")]
    BatchActive,

    /// `cancel` without a running batch.
    #[error("No batch is running")]
    NoActiveBatch,

    /// `dismiss` with nothing to dismiss.
    #[error("No batch to dismiss")]
    NoBatch,

    /// `dismiss` before every item reached a terminal phase.
    #[error("The batch is still running")]
    StillRunning,

    /// The request list was invalid or empty after de-duplication.
    #[error(transparent)]
    Invalid(#[from] CoreError),

    /// Post-success registry bookkeeping failed. Never fails the item.
    #[error("Registry write failed: {0}")]
    RegistryWriteFailed(String),

    /// The orchestrator is shutting down.
    #[error("Orchestrator is shutting down")]
    ShuttingDown,
}

impl From<RegistryError> for OrchestratorError {
    fn from(err: RegistryError) -> Self {
        Self::RegistryWriteFailed(err.to_string())
    }
}
