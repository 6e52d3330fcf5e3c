use std::sync::Arc;
use std::time::Duration;

use rollout_orchestrator::ScheduledTask;

use crate::ws::manager::WsManager;

/// Interval between heartbeat pings.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Ping every browser connection each `period`, dropping connections whose
/// outbound channel has already closed.
///
/// Dropping the returned task stops the heartbeat.
pub fn start_heartbeat(ws_manager: Arc<WsManager>, period: Duration) -> ScheduledTask {
    ScheduledTask::every(period, move || {
        let ws_manager = Arc::clone(&ws_manager);
        async move {
            let pruned = ws_manager.ping_all().await;
            if pruned > 0 {
                tracing::info!(pruned, "Dropped stale WebSocket connections");
            }
        }
    })
}
