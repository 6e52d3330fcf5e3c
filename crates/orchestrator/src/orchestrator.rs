//! The batch orchestrator.
//!
//! [`BatchOrchestrator`] owns at most one [`BatchRun`] at a time. `start`
//! creates the run and spawns a runner task that walks the items strictly in
//! submission order (see `runner.rs`). Every state change goes through
//! one async mutex, is mirrored into a `watch` channel for snapshot readers,
//! and is announced as a [`BatchEvent`] on a broadcast channel.

use std::sync::Arc;

use rollout_agent::AgentChannelFactory;
use rollout_core::batch::BatchRun;
use rollout_core::item::{Applied, ItemEvent, Phase};
use rollout_core::types::BatchId;
use rollout_core::update::UpdateRequest;
use rollout_registry::HostRegistry;
use tokio::sync::{broadcast, watch, Mutex};
use tokio_util::sync::CancellationToken;

use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::events::{BatchEvent, EVENT_CHANNEL_CAPACITY};

/// Sequential rollout of stack updates across agents.
///
/// Created once at startup; the returned `Arc` is cheap to clone into
/// request handlers.
pub struct BatchOrchestrator {
    pub(crate) registry: Arc<dyn HostRegistry>,
    pub(crate) agents: Arc<dyn AgentChannelFactory>,
    pub(crate) config: OrchestratorConfig,
    state: Mutex<Option<BatchRun>>,
    snapshot_tx: watch::Sender<Option<BatchRun>>,
    event_tx: broadcast::Sender<BatchEvent>,
    runner: Mutex<Option<tokio::task::JoinHandle<()>>>,
    /// Cancelled on shutdown; stops the runner mid-item.
    pub(crate) shutdown: CancellationToken,
}

impl BatchOrchestrator {
    pub fn new(
        registry: Arc<dyn HostRegistry>,
        agents: Arc<dyn AgentChannelFactory>,
        config: OrchestratorConfig,
    ) -> Arc<Self> {
        let (snapshot_tx, _) = watch::channel(None);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            registry,
            agents,
            config,
            state: Mutex::new(None),
            snapshot_tx,
            event_tx,
            runner: Mutex::new(None),
            shutdown: CancellationToken::new(),
        })
    }

    /// Start a batch for `requests`.
    ///
    /// Fails without touching state when a batch is still running or the
    /// list is empty after de-duplication. Returns the initial snapshot.
    pub async fn start(
        self: &Arc<Self>,
        requests: Vec<UpdateRequest>,
    ) -> Result<BatchRun, OrchestratorError> {
        if self.shutdown.is_cancelled() {
            return Err(OrchestratorError::ShuttingDown);
        }

        let run = {
            let mut state = self.state.lock().await;
            if state.as_ref().is_some_and(|run| !run.completed) {
                return Err(OrchestratorError::BatchActive);
            }
            let run = BatchRun::new(requests)?;
            *state = Some(run.clone());
            self.snapshot_tx.send_replace(Some(run.clone()));
            tracing::info!(batch_id = %run.id, items = run.items.len(), "Batch started");
            self.emit(BatchEvent::Started {
                batch_id: run.id,
                items: run.items.iter().map(|it| it.key.clone()).collect(),
            });
            run
        };

        let keys: Vec<_> = run.items.iter().map(|it| it.key.clone()).collect();

        let this = Arc::clone(self);
        let batch_id = run.id;
        let handle = tokio::spawn(async move {
            this.run_batch(batch_id, keys).await;
        });
        *self.runner.lock().await = Some(handle);

        Ok(run)
    }

    /// Request cancellation of the running batch.
    ///
    /// Every pending item is cancelled at once; the in-flight item, if any,
    /// finishes on its own. Returns the updated snapshot.
    pub async fn cancel(&self) -> Result<BatchRun, OrchestratorError> {
        let mut state = self.state.lock().await;
        let run = match state.as_mut() {
            Some(run) if !run.completed => run,
            _ => return Err(OrchestratorError::NoActiveBatch),
        };

        let first_request = !run.cancelling;
        let cancelled = run.request_cancel();
        let snapshot = run.clone();
        self.snapshot_tx.send_replace(Some(snapshot.clone()));

        tracing::info!(
            batch_id = %snapshot.id,
            cancelled = cancelled.len(),
            in_flight = ?snapshot.in_flight(),
            "Batch cancellation requested",
        );

        if first_request {
            self.emit(BatchEvent::Cancelling {
                batch_id: snapshot.id,
            });
        }
        for index in cancelled {
            let item = &snapshot.items[index];
            self.emit(BatchEvent::ItemTransitioned {
                batch_id: snapshot.id,
                index,
                key: item.key.clone(),
                from: Phase::Pending,
                to: item.phase,
                error_reason: None,
            });
        }
        if snapshot.completed {
            self.emit_completed(&snapshot);
        }

        Ok(snapshot)
    }

    /// Current batch, if any.
    pub async fn snapshot(&self) -> Option<BatchRun> {
        self.state.lock().await.clone()
    }

    /// Receiver that always holds the latest snapshot.
    pub fn watch(&self) -> watch::Receiver<Option<BatchRun>> {
        self.snapshot_tx.subscribe()
    }

    /// Subscribe to batch events.
    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.event_tx.subscribe()
    }

    /// Drop a completed batch.
    pub async fn dismiss(&self) -> Result<(), OrchestratorError> {
        let mut state = self.state.lock().await;
        match state.as_ref() {
            None => Err(OrchestratorError::NoBatch),
            Some(run) if !run.completed => Err(OrchestratorError::StillRunning),
            Some(run) => {
                tracing::info!(batch_id = %run.id, "Batch dismissed");
                *state = None;
                self.snapshot_tx.send_replace(None);
                Ok(())
            }
        }
    }

    /// Wait until the current batch has completed or been dismissed.
    pub async fn wait_idle(&self) -> Option<BatchRun> {
        let mut rx = self.watch();
        let result = rx
            .wait_for(|run| run.as_ref().map_or(true, |r| r.completed))
            .await
            .map(|snapshot| (*snapshot).clone());
        result.ok().flatten()
    }

    /// Stop the runner. Items left in flight keep their current phase.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down batch orchestrator");
        self.shutdown.cancel();
        if let Some(handle) = self.runner.lock().await.take() {
            let _ = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await;
        }
    }

    // ---- state mutation used by the runner ----

    /// Apply `event` to item `index` of batch `batch_id`.
    ///
    /// Publishes the snapshot and the matching events. Events are sent while
    /// the state lock is held so subscribers see them in state order.
    /// Returns `None` when the batch is no longer current.
    pub(crate) async fn transition(
        &self,
        batch_id: BatchId,
        index: usize,
        event: ItemEvent,
    ) -> Option<Applied> {
        let mut state = self.state.lock().await;
        let run = state.as_mut().filter(|run| run.id == batch_id)?;

        let was_completed = run.completed;
        let applied = run.apply(index, event);
        let snapshot = run.clone();
        if applied != Applied::Ignored {
            self.snapshot_tx.send_replace(Some(snapshot.clone()));
        }

        let item = &snapshot.items[index];
        match applied {
            Applied::Transitioned { from, to } => {
                tracing::info!(
                    batch_id = %batch_id,
                    stack = %item.key.stack_name,
                    endpoint = %item.key.endpoint,
                    from = from.label(),
                    to = to.label(),
                    error = ?item.error_reason,
                    "Update item transitioned",
                );
                self.emit(BatchEvent::ItemTransitioned {
                    batch_id,
                    index,
                    key: item.key.clone(),
                    from,
                    to,
                    error_reason: item.error_reason.clone(),
                });
            }
            Applied::Stayed => {
                self.emit(BatchEvent::ItemProgress {
                    batch_id,
                    index,
                    key: item.key.clone(),
                    elapsed_seconds: item.elapsed_seconds,
                    last_health: item.last_health,
                });
            }
            Applied::Ignored => {
                tracing::debug!(
                    batch_id = %batch_id,
                    stack = %item.key.stack_name,
                    phase = item.phase.label(),
                    "Ignoring event for update item",
                );
            }
        }

        if !was_completed && snapshot.completed {
            self.emit_completed(&snapshot);
        }
        Some(applied)
    }

    /// Advance the in-flight item's elapsed counter.
    pub(crate) async fn tick(&self, batch_id: BatchId) {
        let mut state = self.state.lock().await;
        let Some(run) = state.as_mut().filter(|run| run.id == batch_id) else {
            return;
        };
        let Some(index) = run.tick() else {
            return;
        };
        let item = run.items[index].clone();
        self.snapshot_tx.send_replace(Some(run.clone()));

        self.emit(BatchEvent::ItemProgress {
            batch_id,
            index,
            key: item.key,
            elapsed_seconds: item.elapsed_seconds,
            last_health: item.last_health,
        });
    }

    fn emit_completed(&self, run: &BatchRun) {
        let Some(report) = run.report() else {
            return;
        };
        tracing::info!(
            batch_id = %run.id,
            outcome = ?report.outcome,
            succeeded = report.succeeded,
            failed = report.failed,
            cancelled = report.cancelled,
            "Batch completed",
        );
        self.emit(BatchEvent::Completed {
            batch_id: run.id,
            report,
        });
    }

    fn emit(&self, event: BatchEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }
}
