//! Per-endpoint agent connection manager.
//!
//! [`AgentManager`] lazily opens one [`WsAgentChannel`] per endpoint the
//! first time it is asked for it and hands out the same channel afterwards.
//! Channels keep reconnecting in the background until [`AgentManager::shutdown`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rollout_core::types::is_local_endpoint;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::channel::{AgentChannel, AgentChannelFactory, ChannelError};
use crate::client::AgentClient;
use crate::connection::WsAgentChannel;
use crate::reconnect::ReconnectConfig;

/// Connection settings shared by every agent channel.
#[derive(Debug, Clone)]
pub struct AgentManagerConfig {
    /// Path appended to `host:port` endpoints, e.g. `/agent`.
    pub ws_path: String,
    /// WebSocket URL of the agent on this machine (the local endpoint).
    pub local_url: String,
    /// Upper bound on the initial connect.
    pub connect_timeout: Duration,
    /// Upper bound on any single request/response round trip.
    pub request_timeout: Duration,
    pub reconnect: ReconnectConfig,
}

impl Default for AgentManagerConfig {
    fn default() -> Self {
        Self {
            ws_path: "/agent".to_string(),
            local_url: "ws://127.0.0.1:5001/agent".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(120),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Lazily connects and caches one channel per endpoint.
pub struct AgentManager {
    config: AgentManagerConfig,
    /// Keyed by lowercased endpoint.
    channels: RwLock<HashMap<String, Arc<WsAgentChannel>>>,
    /// Master cancellation token; each channel runs on a child.
    cancel: CancellationToken,
}

impl AgentManager {
    pub fn new(config: AgentManagerConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            channels: RwLock::new(HashMap::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// Map a registry endpoint to the agent's WebSocket URL.
    ///
    /// The local endpoint maps to `local_url`, explicit `ws://`/`wss://`
    /// URLs pass through, anything else is treated as `host:port`.
    pub fn resolve_ws_url(&self, endpoint: &str) -> String {
        if is_local_endpoint(endpoint) {
            return self.config.local_url.clone();
        }
        if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
            return endpoint.to_string();
        }
        format!("ws://{}{}", endpoint.trim_end_matches('/'), self.config.ws_path)
    }

    /// Endpoints with an open channel (connected or reconnecting).
    pub async fn known_endpoints(&self) -> Vec<String> {
        self.channels
            .read()
            .await
            .values()
            .map(|c| c.endpoint().to_string())
            .collect()
    }

    /// Close every channel.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down agent manager");
        self.cancel.cancel();

        let mut channels = self.channels.write().await;
        for (endpoint, channel) in channels.drain() {
            tracing::info!(endpoint = %endpoint, "Closing agent channel");
            channel.close().await;
        }

        tracing::info!("Agent manager shut down complete");
    }

    async fn connect(&self, endpoint: &str) -> Result<Arc<WsAgentChannel>, ChannelError> {
        let client = AgentClient::new(endpoint.to_string(), self.resolve_ws_url(endpoint));

        let connection = tokio::time::timeout(self.config.connect_timeout, client.connect())
            .await
            .map_err(|_| {
                ChannelError::Connection(format!(
                    "Timed out connecting to agent {endpoint} at {}",
                    client.ws_url()
                ))
            })??;

        Ok(WsAgentChannel::spawn(
            client,
            connection,
            self.config.reconnect.clone(),
            self.config.request_timeout,
            self.cancel.child_token(),
        ))
    }
}

#[async_trait]
impl AgentChannelFactory for AgentManager {
    async fn channel(&self, endpoint: &str) -> Result<Arc<dyn AgentChannel>, ChannelError> {
        let key = endpoint.to_lowercase();

        if let Some(existing) = self.channels.read().await.get(&key) {
            return Ok(Arc::clone(existing) as Arc<dyn AgentChannel>);
        }

        if self.cancel.is_cancelled() {
            return Err(ChannelError::NotConnected(endpoint.to_string()));
        }

        // Connect without holding the lock so one slow agent does not block
        // lookups for the others.
        let fresh = self.connect(endpoint).await?;

        let mut channels = self.channels.write().await;
        if let Some(existing) = channels.get(&key) {
            // Lost the race to a concurrent caller; keep theirs.
            let winner = Arc::clone(existing);
            drop(channels);
            fresh.close().await;
            return Ok(winner as Arc<dyn AgentChannel>);
        }

        tracing::info!(endpoint = %endpoint, "Agent channel opened");
        channels.insert(key, Arc::clone(&fresh));
        Ok(fresh as Arc<dyn AgentChannel>)
    }
}
