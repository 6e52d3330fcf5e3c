//! Events published by the orchestrator while a batch runs.

use rollout_core::aggregate::BatchReport;
use rollout_core::batch_events::{
    MSG_TYPE_BATCH_CANCELLING, MSG_TYPE_BATCH_COMPLETED, MSG_TYPE_BATCH_STARTED,
    MSG_TYPE_ITEM_PHASE, MSG_TYPE_ITEM_PROGRESS,
};
use rollout_core::health::HealthSnapshot;
use rollout_core::item::Phase;
use rollout_core::types::BatchId;
use rollout_core::update::UpdateKey;
use serde::Serialize;

/// Broadcast capacity for batch events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BatchEvent {
    Started {
        batch_id: BatchId,
        items: Vec<UpdateKey>,
    },
    ItemTransitioned {
        batch_id: BatchId,
        index: usize,
        key: UpdateKey,
        from: Phase,
        to: Phase,
        error_reason: Option<String>,
    },
    /// Elapsed time or health counts of an item changed.
    ItemProgress {
        batch_id: BatchId,
        index: usize,
        key: UpdateKey,
        elapsed_seconds: u64,
        last_health: Option<HealthSnapshot>,
    },
    Cancelling {
        batch_id: BatchId,
    },
    Completed {
        batch_id: BatchId,
        report: BatchReport,
    },
}

impl BatchEvent {
    /// WebSocket `type` tag for this event.
    pub fn msg_type(&self) -> &'static str {
        match self {
            Self::Started { .. } => MSG_TYPE_BATCH_STARTED,
            Self::ItemTransitioned { .. } => MSG_TYPE_ITEM_PHASE,
            Self::ItemProgress { .. } => MSG_TYPE_ITEM_PROGRESS,
            Self::Cancelling { .. } => MSG_TYPE_BATCH_CANCELLING,
            Self::Completed { .. } => MSG_TYPE_BATCH_COMPLETED,
        }
    }

    pub fn batch_id(&self) -> BatchId {
        match self {
            Self::Started { batch_id, .. }
            | Self::ItemTransitioned { batch_id, .. }
            | Self::ItemProgress { batch_id, .. }
            | Self::Cancelling { batch_id }
            | Self::Completed { batch_id, .. } => *batch_id,
        }
    }

    /// Frame sent to browser clients: the event fields plus a `type` tag.
    pub fn to_ws_json(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}));
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "type".to_string(),
                serde_json::Value::String(self.msg_type().to_string()),
            );
        }
        value
    }
}
