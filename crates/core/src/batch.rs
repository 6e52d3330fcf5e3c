//! Batch run aggregate: the set of update items for one rollout.
//!
//! A [`BatchRun`] owns every [`UpdateItemState`] of one batch. All item
//! transitions go through [`BatchRun::apply`], which re-evaluates
//! completion after each change so `completed`, `has_errors` and
//! `outcome` are always consistent with the item phases.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::aggregate::{self, BatchOutcome, BatchReport};
use crate::error::CoreError;
use crate::item::{Applied, ItemEvent, Phase, UpdateItemState};
use crate::types::{BatchId, Timestamp};
use crate::update::{dedup_requests, validate_request, UpdateRequest};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRun {
    pub id: BatchId,
    pub items: Vec<UpdateItemState>,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
    pub cancelling: bool,
    pub completed: bool,
    pub has_errors: bool,
    pub outcome: Option<BatchOutcome>,
}

impl BatchRun {
    /// Create a batch from caller requests.
    ///
    /// Requests are validated and de-duplicated by identity key. Returns a
    /// validation error when nothing is left to update.
    pub fn new(requests: Vec<UpdateRequest>) -> Result<Self, CoreError> {
        for request in &requests {
            validate_request(request)?;
        }
        let requests = dedup_requests(requests);
        if requests.is_empty() {
            return Err(CoreError::Validation(
                "A batch needs at least one update request".to_string(),
            ));
        }

        Ok(Self {
            id: uuid::Uuid::now_v7(),
            items: requests
                .iter()
                .map(|r| UpdateItemState::new(r.key()))
                .collect(),
            started_at: Some(Utc::now()),
            finished_at: None,
            cancelling: false,
            completed: false,
            has_errors: false,
            outcome: None,
        })
    }

    /// Apply an event to the item at `index` and refresh completion.
    pub fn apply(&mut self, index: usize, event: ItemEvent) -> Applied {
        let Some(item) = self.items.get_mut(index) else {
            return Applied::Ignored;
        };
        let applied = item.apply(event);
        if let Applied::Transitioned { to, .. } = applied {
            if to == Phase::Failed {
                self.has_errors = true;
            }
            self.refresh_completion();
        }
        applied
    }

    /// Flag the batch as cancelling and cancel every pending item.
    ///
    /// Returns the indices of the items that moved to `Cancelled`. Items
    /// already past `Pending` are left to finish on their own.
    pub fn request_cancel(&mut self) -> Vec<usize> {
        self.cancelling = true;
        let mut cancelled = Vec::new();
        for (index, item) in self.items.iter_mut().enumerate() {
            if matches!(item.apply(ItemEvent::Cancelled), Applied::Transitioned { .. }) {
                cancelled.push(index);
            }
        }
        self.refresh_completion();
        cancelled
    }

    /// Index of the item currently being processed, if any.
    pub fn in_flight(&self) -> Option<usize> {
        self.items
            .iter()
            .position(|it| it.phase != Phase::Pending && !it.is_terminal())
    }

    /// Advance elapsed time of the in-flight item by one second.
    ///
    /// Stops counting once the batch has completed. Returns the index of
    /// the item whose counter moved.
    pub fn tick(&mut self) -> Option<usize> {
        if self.completed {
            return None;
        }
        let index = self.in_flight()?;
        self.items[index].tick().then_some(index)
    }

    /// Completion report, available once every item is terminal.
    pub fn report(&self) -> Option<BatchReport> {
        aggregate::report(&self.items)
    }

    fn refresh_completion(&mut self) {
        if self.completed {
            return;
        }
        if let Some(outcome) = aggregate::evaluate(&self.items) {
            self.completed = true;
            self.outcome = Some(outcome);
            self.finished_at = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::health::HealthSnapshot;
    use crate::run_state::RunState;

    fn requests(names: &[&str]) -> Vec<UpdateRequest> {
        names.iter().map(|n| UpdateRequest::new(*n, "h1")).collect()
    }

    fn succeed(batch: &mut BatchRun, index: usize) {
        batch.apply(index, ItemEvent::Dequeued);
        batch.apply(index, ItemEvent::Acknowledged);
        batch.apply(index, ItemEvent::StatusChanged(RunState::Running));
        batch.apply(index, ItemEvent::HealthPolled(HealthSnapshot::new(1, 1, 0)));
    }

    #[test]
    fn empty_batch_rejected() {
        assert_matches!(BatchRun::new(vec![]), Err(CoreError::Validation(_)));
    }

    #[test]
    fn duplicate_requests_yield_one_item() {
        let batch = BatchRun::new(vec![
            UpdateRequest::new("web", "h1"),
            UpdateRequest::new("web", "h1"),
        ])
        .unwrap();
        assert_eq!(batch.items.len(), 1);
        assert!(batch.started_at.is_some());
        assert!(!batch.completed);
    }

    #[test]
    fn completes_after_last_terminal_transition() {
        let mut batch = BatchRun::new(requests(&["a", "b"])).unwrap();
        succeed(&mut batch, 0);
        assert!(!batch.completed);
        succeed(&mut batch, 1);
        assert!(batch.completed);
        assert_eq!(batch.outcome, Some(BatchOutcome::Succeeded));
        assert!(batch.finished_at.is_some());
        assert!(!batch.has_errors);
    }

    #[test]
    fn failure_sets_has_errors() {
        let mut batch = BatchRun::new(requests(&["a"])).unwrap();
        batch.apply(0, ItemEvent::Dequeued);
        batch.apply(
            0,
            ItemEvent::Rejected {
                reason: "nope".into(),
            },
        );
        assert!(batch.has_errors);
        assert!(batch.completed);
        assert_eq!(batch.outcome, Some(BatchOutcome::Failed));
    }

    #[test]
    fn cancel_moves_only_pending_items() {
        let mut batch = BatchRun::new(requests(&["a", "b", "c"])).unwrap();
        batch.apply(0, ItemEvent::Dequeued);
        let cancelled = batch.request_cancel();
        assert_eq!(cancelled, vec![1, 2]);
        assert!(batch.cancelling);
        assert_eq!(batch.items[0].phase, Phase::Requesting);
        assert!(!batch.completed);
        assert_eq!(batch.in_flight(), Some(0));

        succeed_from_requesting(&mut batch, 0);
        assert!(batch.completed);
        assert_eq!(batch.outcome, Some(BatchOutcome::Cancelled));
    }

    fn succeed_from_requesting(batch: &mut BatchRun, index: usize) {
        batch.apply(index, ItemEvent::Acknowledged);
        batch.apply(index, ItemEvent::StatusChanged(RunState::Running));
        batch.apply(index, ItemEvent::HealthPolled(HealthSnapshot::new(1, 1, 0)));
    }

    #[test]
    fn cancel_with_nothing_in_flight_completes_immediately() {
        let mut batch = BatchRun::new(requests(&["a", "b"])).unwrap();
        batch.request_cancel();
        assert!(batch.completed);
        assert_eq!(batch.outcome, Some(BatchOutcome::Cancelled));
    }

    #[test]
    fn tick_stops_after_completion() {
        let mut batch = BatchRun::new(requests(&["a"])).unwrap();
        assert_eq!(batch.tick(), None);
        batch.apply(0, ItemEvent::Dequeued);
        assert_eq!(batch.tick(), Some(0));
        batch.apply(
            0,
            ItemEvent::Rejected {
                reason: "nope".into(),
            },
        );
        assert_eq!(batch.tick(), None);
        assert_eq!(batch.items[0].elapsed_seconds, 1);
    }

    #[test]
    fn out_of_range_index_is_ignored() {
        let mut batch = BatchRun::new(requests(&["a"])).unwrap();
        assert_eq!(batch.apply(5, ItemEvent::Dequeued), Applied::Ignored);
    }
}
