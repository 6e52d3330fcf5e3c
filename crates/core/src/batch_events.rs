//! WebSocket message type constants for batch rollout events.
//!
//! Used by the API when forwarding orchestrator events to connected
//! browser clients.

/// A new batch was accepted and processing started.
pub const MSG_TYPE_BATCH_STARTED: &str = "batch_started";

/// An item moved to a new phase.
pub const MSG_TYPE_ITEM_PHASE: &str = "batch_item_phase";

/// Elapsed time or health counts of the in-flight item changed.
pub const MSG_TYPE_ITEM_PROGRESS: &str = "batch_item_progress";

/// Cancellation was requested; the in-flight item is still finishing.
pub const MSG_TYPE_BATCH_CANCELLING: &str = "batch_cancelling";

/// Every item reached a terminal phase.
pub const MSG_TYPE_BATCH_COMPLETED: &str = "batch_completed";

/// Full batch state, sent to a client when it connects or falls behind.
pub const MSG_TYPE_BATCH_SNAPSHOT: &str = "batch_snapshot";
