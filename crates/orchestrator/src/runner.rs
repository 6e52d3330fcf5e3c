//! Sequential batch runner.
//!
//! One runner task per batch walks the items in submission order. Each item
//! is driven to a terminal phase before the next one is dequeued, so at most
//! one agent is ever working on an update for this orchestrator.
//!
//! Inside an item, two independent sources feed the state machine: the
//! agent's status-change notifications and the periodic health poll. Both
//! go through [`BatchOrchestrator::transition`], which ignores anything that
//! no longer applies to the item's phase.

use std::sync::Arc;
use std::time::Duration;

use rollout_agent::{AgentChannel, AgentNotification};
use rollout_core::health::{HealthSnapshot, HealthVerdict};
use rollout_core::item::{Applied, ItemEvent, Phase};
use rollout_core::types::BatchId;
use rollout_core::update::UpdateKey;
use rollout_registry::ops::is_pending;
use tokio::sync::{broadcast, mpsc};

use crate::error::OrchestratorError;
use crate::orchestrator::BatchOrchestrator;
use crate::schedule::ScheduledTask;

/// Buffered health snapshots between the poller and the item loop.
const HEALTH_CHANNEL_CAPACITY: usize = 4;

impl BatchOrchestrator {
    /// Process every item of `batch_id` in order.
    pub(crate) async fn run_batch(self: Arc<Self>, batch_id: BatchId, keys: Vec<UpdateKey>) {
        let ticker = {
            let this = Arc::clone(&self);
            ScheduledTask::every(self.config.tick_interval, move || {
                let this = Arc::clone(&this);
                async move { this.tick(batch_id).await }
            })
        };

        for (index, key) in keys.iter().enumerate() {
            if self.shutdown.is_cancelled() {
                tracing::info!(batch_id = %batch_id, "Batch runner stopped by shutdown");
                break;
            }

            // A cancelled item ignores the dequeue and is skipped.
            match self.transition(batch_id, index, ItemEvent::Dequeued).await {
                Some(Applied::Transitioned { .. }) => {}
                Some(_) => continue,
                None => break,
            }

            self.drive_item(batch_id, index, key).await;
        }

        drop(ticker);
        tracing::debug!(batch_id = %batch_id, "Batch runner finished");
    }

    /// Drive one item from `Requesting` to a terminal phase.
    async fn drive_item(&self, batch_id: BatchId, index: usize, key: &UpdateKey) {
        let channel = match self.agents.channel(&key.endpoint).await {
            Ok(channel) => channel,
            Err(e) => {
                self.reject(batch_id, index, e.to_string()).await;
                return;
            }
        };

        // Subscribe before sending so a fast `running` is not missed.
        let mut notifications = channel.subscribe();

        let ack = tokio::select! {
            _ = self.shutdown.cancelled() => return,
            ack = tokio::time::timeout(self.config.ack_timeout, channel.request_update(&key.stack_name)) => ack,
        };
        let reason = match ack {
            Ok(Ok(ack)) if ack.ok => None,
            Ok(Ok(ack)) => Some(ack.error.unwrap_or_else(|| "Agent refused the update".to_string())),
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!(
                "No acknowledgement from the agent within {}s",
                self.config.ack_timeout.as_secs()
            )),
        };
        if let Some(reason) = reason {
            self.reject(batch_id, index, reason).await;
            return;
        }
        self.transition(batch_id, index, ItemEvent::Acknowledged).await;

        self.verify(batch_id, index, key, channel, &mut notifications).await
    }

    /// Wait for the running notification, then poll health until the item
    /// is terminal or the verification window closes.
    ///
    /// A healthy snapshot clears the registry entry before it is applied, so
    /// `Succeeded` (and batch completion) is only published once the pair is
    /// no longer pending.
    async fn verify(
        &self,
        batch_id: BatchId,
        index: usize,
        key: &UpdateKey,
        channel: Arc<dyn AgentChannel>,
        notifications: &mut broadcast::Receiver<AgentNotification>,
    ) {
        let deadline = tokio::time::sleep(self.config.verify_timeout);
        tokio::pin!(deadline);

        let (health_tx, mut health_rx) = mpsc::channel::<HealthSnapshot>(HEALTH_CHANNEL_CAPACITY);
        // Held for the rest of the item; dropping it stops polling.
        let mut _poller: Option<ScheduledTask> = None;
        let mut notifications_open = true;

        loop {
            let applied = tokio::select! {
                _ = self.shutdown.cancelled() => return,
                _ = &mut deadline => {
                    let after_secs = self.config.verify_timeout.as_secs();
                    self.transition(batch_id, index, ItemEvent::VerificationTimedOut { after_secs })
                        .await;
                    return;
                }
                note = notifications.recv(), if notifications_open => match note {
                    Ok(note) if note.stack.eq_ignore_ascii_case(&key.stack_name) => {
                        self.transition(batch_id, index, ItemEvent::StatusChanged(note.run_state))
                            .await
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            stack = %key.stack_name,
                            endpoint = %key.endpoint,
                            skipped,
                            "Missed agent notifications",
                        );
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        notifications_open = false;
                        continue;
                    }
                },
                Some(snapshot) = health_rx.recv() => {
                    if snapshot.verdict() == HealthVerdict::Healthy {
                        self.settle_registry(batch_id, key).await;
                    }
                    self.transition(batch_id, index, ItemEvent::HealthPolled(snapshot))
                        .await
                }
            };

            match applied {
                None => return,
                Some(Applied::Transitioned { to, .. }) if to.is_terminal() => return,
                Some(Applied::Transitioned {
                    to: Phase::VerifyingHealth,
                    ..
                }) => {
                    _poller = Some(spawn_health_poller(
                        Arc::clone(&channel),
                        key.stack_name.clone(),
                        self.config.health_poll_interval,
                        health_tx.clone(),
                    ));
                }
                Some(_) => {}
            }
        }
    }

    async fn reject(&self, batch_id: BatchId, index: usize, reason: String) {
        self.transition(batch_id, index, ItemEvent::Rejected { reason }).await;
    }

    /// Clear the pending entry of an item that is about to succeed.
    ///
    /// Failures are logged only; the remote update has already happened.
    async fn settle_registry(&self, batch_id: BatchId, key: &UpdateKey) {
        if let Err(e) = self.clear_pending(key).await {
            tracing::warn!(
                batch_id = %batch_id,
                stack = %key.stack_name,
                endpoint = %key.endpoint,
                error = %e,
                "Update succeeded but the registry was not updated",
            );
        }
    }

    /// Remove the updated pair from the registry by endpoint, then re-read
    /// the registry to confirm the entry is gone.
    pub(crate) async fn clear_pending(&self, key: &UpdateKey) -> Result<(), OrchestratorError> {
        let removed = self
            .registry
            .remove_update_at(&key.stack_name, &key.endpoint)
            .await?;

        let hosts = self.registry.list_hosts().await?;
        if is_pending(&hosts, &key.stack_name, &key.endpoint) {
            return Err(OrchestratorError::RegistryWriteFailed(format!(
                "{key} is still listed as pending"
            )));
        }

        tracing::info!(
            stack = %key.stack_name,
            endpoint = %key.endpoint,
            removed,
            "Cleared pending update",
        );
        Ok(())
    }
}

/// Poll service health every `interval`, forwarding snapshots.
///
/// RPC failures are logged and the next poll goes ahead as usual.
fn spawn_health_poller(
    channel: Arc<dyn AgentChannel>,
    stack: String,
    interval: Duration,
    health_tx: mpsc::Sender<HealthSnapshot>,
) -> ScheduledTask {
    ScheduledTask::every(interval, move || {
        let channel = Arc::clone(&channel);
        let stack = stack.clone();
        let health_tx = health_tx.clone();
        async move {
            match channel.query_service_health(&stack).await {
                Ok(report) if report.ok => {
                    let snapshot = HealthSnapshot::from_services(&report.services);
                    tracing::debug!(
                        stack = %stack,
                        endpoint = %channel.endpoint(),
                        total = snapshot.total,
                        healthy = snapshot.healthy,
                        unhealthy = snapshot.unhealthy,
                        "Service health polled",
                    );
                    let _ = health_tx.send(snapshot).await;
                }
                Ok(report) => {
                    tracing::warn!(
                        stack = %stack,
                        endpoint = %channel.endpoint(),
                        error = ?report.error,
                        "Agent could not report service health",
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        stack = %stack,
                        endpoint = %channel.endpoint(),
                        error = %e,
                        "Service health poll failed",
                    );
                }
            }
        }
    })
}
