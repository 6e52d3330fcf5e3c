//! Forwards orchestrator batch events to connected browser clients.

use std::sync::Arc;

use rollout_core::batch::BatchRun;
use rollout_core::batch_events::MSG_TYPE_BATCH_SNAPSHOT;
use rollout_orchestrator::BatchOrchestrator;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::ws::WsManager;

/// Frame carrying the whole batch state (`batch` is `null` when idle).
pub fn snapshot_frame(run: Option<&BatchRun>) -> serde_json::Value {
    serde_json::json!({
        "type": MSG_TYPE_BATCH_SNAPSHOT,
        "batch": run,
    })
}

/// Spawn the event forwarder.
///
/// Every [`BatchEvent`](rollout_orchestrator::BatchEvent) is broadcast to
/// all browser connections. If the forwarder falls behind the event
/// channel, clients get a fresh snapshot instead of the missed events.
pub fn spawn_event_forwarder(
    orchestrator: Arc<BatchOrchestrator>,
    ws_manager: Arc<WsManager>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let mut events = orchestrator.subscribe();

    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                received = events.recv() => received,
            };

            match received {
                Ok(event) => {
                    tracing::trace!(
                        batch_id = %event.batch_id(),
                        msg_type = event.msg_type(),
                        "Forwarding batch event",
                    );
                    ws_manager.broadcast_json(&event.to_ws_json()).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event forwarder lagged, resending snapshot");
                    let snapshot = orchestrator.snapshot().await;
                    ws_manager
                        .broadcast_json(&snapshot_frame(snapshot.as_ref()))
                        .await;
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!("Event forwarder stopped");
    })
}
