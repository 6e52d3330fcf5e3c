//! Completion aggregator: derives the overall batch outcome from item phases.

use serde::{Deserialize, Serialize};

use crate::item::{Phase, UpdateItemState};
use crate::update::UpdateKey;

/// Overall result of a completed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Every item was updated and verified.
    Succeeded,
    /// Some items succeeded, at least one failed.
    PartiallyFailed,
    /// At least one item failed and none succeeded.
    Failed,
    /// Nothing failed but at least one item was cancelled.
    Cancelled,
}

impl BatchOutcome {
    pub fn is_success(self) -> bool {
        self == Self::Succeeded
    }
}

/// Terminal state of one item, as listed in a completion report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReport {
    pub key: UpdateKey,
    pub phase: Phase,
    pub error_reason: Option<String>,
}

/// Outcome plus per-item phases of a completed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcome: BatchOutcome,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub items: Vec<ItemReport>,
}

/// Whether every item has reached a terminal phase.
pub fn all_terminal(items: &[UpdateItemState]) -> bool {
    items.iter().all(UpdateItemState::is_terminal)
}

/// Compute the outcome, or `None` while any item is still in flight.
pub fn evaluate(items: &[UpdateItemState]) -> Option<BatchOutcome> {
    if !all_terminal(items) {
        return None;
    }
    let (succeeded, failed, cancelled) = count_terminal(items);
    let outcome = if failed > 0 {
        if succeeded > 0 {
            BatchOutcome::PartiallyFailed
        } else {
            BatchOutcome::Failed
        }
    } else if cancelled > 0 {
        BatchOutcome::Cancelled
    } else {
        BatchOutcome::Succeeded
    };
    Some(outcome)
}

/// Build the completion report, or `None` while the batch is still running.
pub fn report(items: &[UpdateItemState]) -> Option<BatchReport> {
    let outcome = evaluate(items)?;
    let (succeeded, failed, cancelled) = count_terminal(items);
    Some(BatchReport {
        outcome,
        succeeded,
        failed,
        cancelled,
        items: items
            .iter()
            .map(|it| ItemReport {
                key: it.key.clone(),
                phase: it.phase,
                error_reason: it.error_reason.clone(),
            })
            .collect(),
    })
}

fn count_terminal(items: &[UpdateItemState]) -> (usize, usize, usize) {
    items.iter().fold((0, 0, 0), |(s, f, c), it| match it.phase {
        Phase::Succeeded => (s + 1, f, c),
        Phase::Failed => (s, f + 1, c),
        Phase::Cancelled => (s, f, c + 1),
        _ => (s, f, c),
    })
}
