//! One long-lived WebSocket channel to an agent.
//!
//! [`WsAgentChannel`] multiplexes request/response pairs and unsolicited
//! notifications over a single socket. Requests carry a monotonically
//! increasing id; the session loop routes each `response` frame back to the
//! waiting caller by that id. When the socket drops, every pending request
//! fails with [`ChannelError::Disconnected`] and the background task
//! reconnects with backoff.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::channel::{
    AgentChannel, AgentNotification, ChannelError, ServiceHealthReport, UpdateAck,
};
use crate::client::{AgentClient, AgentConnection, AgentStream};
use crate::messages::{encode_request, parse_message, AgentMessage, AgentRequest, ResponseData};
use crate::reconnect::{reconnect_loop, ReconnectConfig};

/// Broadcast capacity for status-change notifications.
const NOTIFICATION_CHANNEL_CAPACITY: usize = 256;

type PendingMap = HashMap<u64, oneshot::Sender<ResponseData>>;

/// State shared between the channel handle and its session task.
struct Shared {
    endpoint: String,
    /// Outbound queue of the live session; `None` while reconnecting.
    outbound: Mutex<Option<mpsc::UnboundedSender<AgentRequest>>>,
    pending: Mutex<PendingMap>,
    next_id: AtomicU64,
    notify_tx: broadcast::Sender<AgentNotification>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Removes the pending entry when the waiting request is dropped or done.
struct PendingGuard<'a> {
    shared: &'a Shared,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(&self.shared.pending).remove(&self.id);
    }
}

/// A WebSocket-backed [`AgentChannel`].
pub struct WsAgentChannel {
    shared: Arc<Shared>,
    request_timeout: Duration,
    cancel: CancellationToken,
    task_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl WsAgentChannel {
    /// Take over an established connection and keep it alive until
    /// `cancel` fires.
    pub fn spawn(
        client: AgentClient,
        connection: AgentConnection,
        reconnect: ReconnectConfig,
        request_timeout: Duration,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        let (notify_tx, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
        let shared = Arc::new(Shared {
            endpoint: client.endpoint().to_string(),
            outbound: Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            notify_tx,
        });

        // Install the outbound queue before returning so the first request
        // does not race the task start.
        let first = Session::open(&shared, connection.ws_stream);

        let task_shared = Arc::clone(&shared);
        let task_cancel = cancel.clone();
        let task_handle = tokio::spawn(async move {
            run_connection_loop(client, task_shared, first, reconnect, task_cancel).await;
        });

        Arc::new(Self {
            shared,
            request_timeout,
            cancel,
            task_handle: Mutex::new(Some(task_handle)),
        })
    }

    /// Whether a live socket is currently attached.
    pub fn is_connected(&self) -> bool {
        lock(&self.shared.outbound).is_some()
    }

    /// Stop the session task and fail any pending requests.
    pub async fn close(&self) {
        self.cancel.cancel();
        let handle = lock(&self.task_handle).take();
        if let Some(handle) = handle {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
    }

    async fn call(&self, request: AgentRequest) -> Result<ResponseData, ChannelError> {
        let id = request.id();
        let (tx, rx) = oneshot::channel();
        lock(&self.shared.pending).insert(id, tx);
        let _guard = PendingGuard {
            shared: &self.shared,
            id,
        };

        let sender = lock(&self.shared.outbound)
            .clone()
            .ok_or_else(|| ChannelError::NotConnected(self.shared.endpoint.clone()))?;
        sender
            .send(request)
            .map_err(|_| ChannelError::Disconnected(self.shared.endpoint.clone()))?;

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ChannelError::Disconnected(self.shared.endpoint.clone())),
            Err(_) => Err(ChannelError::Timeout(self.shared.endpoint.clone())),
        }
    }

    fn next_id(&self) -> u64 {
        self.shared.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl AgentChannel for WsAgentChannel {
    fn endpoint(&self) -> &str {
        &self.shared.endpoint
    }

    async fn request_update(&self, stack: &str) -> Result<UpdateAck, ChannelError> {
        let response = self
            .call(AgentRequest::UpdateStack {
                id: self.next_id(),
                stack: stack.to_string(),
            })
            .await?;
        Ok(UpdateAck {
            ok: response.ok,
            error: response.error,
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<AgentNotification> {
        self.shared.notify_tx.subscribe()
    }

    async fn query_service_health(&self, stack: &str) -> Result<ServiceHealthReport, ChannelError> {
        let response = self
            .call(AgentRequest::ServiceHealth {
                id: self.next_id(),
                stack: stack.to_string(),
            })
            .await?;
        Ok(ServiceHealthReport {
            ok: response.ok,
            services: response.services,
            error: response.error,
        })
    }
}

impl Drop for WsAgentChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---- session task ----

/// A socket with its outbound queue already installed in [`Shared`].
struct Session {
    ws_stream: AgentStream,
    outbound_rx: mpsc::UnboundedReceiver<AgentRequest>,
}

impl Session {
    fn open(shared: &Shared, ws_stream: AgentStream) -> Self {
        let (tx, outbound_rx) = mpsc::unbounded_channel();
        *lock(&shared.outbound) = Some(tx);
        Self {
            ws_stream,
            outbound_rx,
        }
    }
}

/// Drive sessions until cancelled, reconnecting whenever one ends.
async fn run_connection_loop(
    client: AgentClient,
    shared: Arc<Shared>,
    first: Session,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut session = first;

    loop {
        run_session(&shared, session, &cancel).await;
        detach(&shared);

        if cancel.is_cancelled() {
            tracing::info!(endpoint = %shared.endpoint, "Agent channel closed");
            return;
        }

        tracing::info!(
            endpoint = %shared.endpoint,
            "Agent connection lost, entering reconnect loop",
        );
        match reconnect_loop(&client, &reconnect, &cancel).await {
            Some(conn) => session = Session::open(&shared, conn.ws_stream),
            None => return,
        }
    }
}

/// Forget the dead session: stop accepting requests and fail the waiting ones.
fn detach(shared: &Shared) {
    *lock(&shared.outbound) = None;
    let dropped = std::mem::take(&mut *lock(&shared.pending));
    if !dropped.is_empty() {
        tracing::warn!(
            endpoint = %shared.endpoint,
            count = dropped.len(),
            "Failing pending agent requests after disconnect",
        );
    }
}

/// Pump one socket until it closes, errors, or `cancel` fires.
async fn run_session(shared: &Shared, session: Session, cancel: &CancellationToken) {
    let Session {
        ws_stream,
        mut outbound_rx,
    } = session;
    let (mut sink, mut stream) = ws_stream.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            Some(request) = outbound_rx.recv() => {
                let frame = match encode_request(&request) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::error!(endpoint = %shared.endpoint, error = %e, "Failed to encode agent request");
                        lock(&shared.pending).remove(&request.id());
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(frame)).await {
                    tracing::warn!(endpoint = %shared.endpoint, error = %e, "Agent send failed");
                    break;
                }
            }
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => handle_text_message(shared, &text),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    // Handled automatically by tungstenite.
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(endpoint = %shared.endpoint, ?frame, "Agent closed connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(endpoint = %shared.endpoint, error = %e, "Agent receive error");
                    break;
                }
                None => break,
            },
        }
    }
}

fn handle_text_message(shared: &Shared, text: &str) {
    match parse_message(text) {
        Ok(AgentMessage::Response(data)) => {
            let waiter = lock(&shared.pending).remove(&data.id);
            match waiter {
                Some(tx) => {
                    let _ = tx.send(data);
                }
                None => tracing::debug!(
                    endpoint = %shared.endpoint,
                    id = data.id,
                    "Response for unknown or expired request",
                ),
            }
        }
        Ok(AgentMessage::StatusChanged(data)) => {
            tracing::debug!(
                endpoint = %shared.endpoint,
                stack = %data.stack,
                run_state = data.run_state.as_str(),
                "Agent status change",
            );
            // No receivers is fine.
            let _ = shared.notify_tx.send(AgentNotification {
                endpoint: shared.endpoint.clone(),
                stack: data.stack,
                run_state: data.run_state,
            });
        }
        Err(e) => {
            tracing::warn!(
                endpoint = %shared.endpoint,
                error = %e,
                raw_message = %text,
                "Failed to parse agent message",
            );
        }
    }
}
