//! Per-item update state machine.
//!
//! ```text
//! Pending --dequeued--> Requesting --ack--> AwaitingNotification --running--> VerifyingHealth
//!    |                     |                      |                              |  ^
//!    | cancelled           | rejected             | exited/error, timeout        |  | converging
//!    v                     v                      v                              v  |
//! Cancelled              Failed                 Failed          Succeeded / Failed -+
//! ```
//!
//! Events arrive from two independent sources (agent notifications and
//! health polls) and may be duplicated or stale. [`UpdateItemState::apply`]
//! only moves forward along the graph above; any event that does not fit
//! the current phase is reported as [`Applied::Ignored`] and leaves the
//! item untouched.

use serde::{Deserialize, Serialize};

use crate::health::{HealthSnapshot, HealthVerdict};
use crate::run_state::{RunState, RunStateClass};
use crate::update::UpdateKey;

/// Lifecycle phase of one update item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Pending,
    Requesting,
    AwaitingNotification,
    VerifyingHealth,
    Succeeded,
    Failed,
    Cancelled,
}

impl Phase {
    /// No transition leaves a terminal phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Phases during which the elapsed-seconds counter advances.
    pub fn counts_elapsed(self) -> bool {
        matches!(self, Self::Requesting | Self::VerifyingHealth)
    }

    /// Human-readable label for display.
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Requesting => "Requesting update",
            Self::AwaitingNotification => "Waiting for stack",
            Self::VerifyingHealth => "Verifying health",
            Self::Succeeded => "Updated",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }
}

/// Why an item ended in [`Phase::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The agent refused the update request or the channel failed.
    ChannelRejected,
    /// The stack reported an exited/error run state after the update.
    RuntimeExited,
    /// At least one service reported unhealthy after the update.
    HealthDegraded,
    /// Notification or health convergence did not arrive in time.
    VerificationTimedOut,
}

/// Input to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemEvent {
    /// The orchestrator picked this item up.
    Dequeued,
    /// The agent accepted the update request and started work.
    Acknowledged,
    /// The agent refused the request or the channel errored.
    Rejected { reason: String },
    /// Unsolicited run-state notification for this stack.
    StatusChanged(RunState),
    /// Result of one health poll.
    HealthPolled(HealthSnapshot),
    /// The verification window closed.
    VerificationTimedOut { after_secs: u64 },
    /// Cancellation reached the item before it was dequeued.
    Cancelled,
}

/// Result of feeding an event to an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The phase changed.
    Transitioned { from: Phase, to: Phase },
    /// The event was accepted but the phase stays (converging health poll).
    Stayed,
    /// The event does not apply to the current phase.
    Ignored,
}

/// Mutable tracking state of one update item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateItemState {
    pub key: UpdateKey,
    pub phase: Phase,
    pub elapsed_seconds: u64,
    pub last_health: Option<HealthSnapshot>,
    pub error_reason: Option<String>,
    pub failure: Option<FailureKind>,
}

impl UpdateItemState {
    pub fn new(key: UpdateKey) -> Self {
        Self {
            key,
            phase: Phase::Pending,
            elapsed_seconds: 0,
            last_health: None,
            error_reason: None,
            failure: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Feed one event through the transition table.
    pub fn apply(&mut self, event: ItemEvent) -> Applied {
        let from = self.phase;
        match (from, event) {
            (Phase::Pending, ItemEvent::Dequeued) => self.enter(Phase::Requesting),
            (Phase::Pending, ItemEvent::Cancelled) => self.enter(Phase::Cancelled),

            (Phase::Requesting, ItemEvent::Acknowledged) => {
                self.enter(Phase::AwaitingNotification)
            }
            (Phase::Requesting, ItemEvent::Rejected { reason }) => {
                self.fail(FailureKind::ChannelRejected, reason)
            }

            (Phase::AwaitingNotification, ItemEvent::StatusChanged(state)) => {
                match state.classify() {
                    RunStateClass::Started => self.enter(Phase::VerifyingHealth),
                    RunStateClass::Stopped => self.fail(
                        FailureKind::RuntimeExited,
                        format!("Stack reported '{}' after the update", state.as_str()),
                    ),
                    RunStateClass::Transitional => Applied::Ignored,
                }
            }

            (Phase::VerifyingHealth, ItemEvent::HealthPolled(snapshot)) => {
                self.last_health = Some(snapshot);
                match snapshot.verdict() {
                    HealthVerdict::Healthy => self.enter(Phase::Succeeded),
                    HealthVerdict::Degraded => self.fail(
                        FailureKind::HealthDegraded,
                        format!(
                            "{} of {} services unhealthy after the update",
                            snapshot.unhealthy, snapshot.total
                        ),
                    ),
                    HealthVerdict::Converging => Applied::Stayed,
                }
            }

            (
                Phase::AwaitingNotification | Phase::VerifyingHealth,
                ItemEvent::VerificationTimedOut { after_secs },
            ) => {
                let waiting_for = if from == Phase::AwaitingNotification {
                    "a running notification"
                } else {
                    "all services to become healthy"
                };
                self.fail(
                    FailureKind::VerificationTimedOut,
                    format!("Timed out after {after_secs}s waiting for {waiting_for}"),
                )
            }

            _ => Applied::Ignored,
        }
    }

    /// Advance the elapsed counter by one second if the phase counts time.
    ///
    /// Returns whether the counter moved.
    pub fn tick(&mut self) -> bool {
        if self.phase.counts_elapsed() {
            self.elapsed_seconds += 1;
            true
        } else {
            false
        }
    }

    fn enter(&mut self, to: Phase) -> Applied {
        let from = self.phase;
        self.phase = to;
        Applied::Transitioned { from, to }
    }

    fn fail(&mut self, kind: FailureKind, reason: String) -> Applied {
        self.failure = Some(kind);
        self.error_reason = Some(reason);
        self.enter(Phase::Failed)
    }
}
