//! WebSocket client for connecting to one agent.
//!
//! [`AgentClient`] holds the connection target for a single endpoint.
//! Call [`AgentClient::connect`] to establish a live [`AgentConnection`].

use tokio_tungstenite::{connect_async, MaybeTlsStream};

use crate::channel::ChannelError;

/// Raw WebSocket stream to an agent.
pub type AgentStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Connection target of one agent.
pub struct AgentClient {
    endpoint: String,
    ws_url: String,
}

/// A live WebSocket connection to an agent.
pub struct AgentConnection {
    /// Endpoint identifier the connection belongs to.
    pub endpoint: String,
    /// The raw WebSocket stream for reading/writing frames.
    pub ws_stream: AgentStream,
}

impl AgentClient {
    /// * `endpoint` - registry endpoint identifier, e.g. `10.0.0.9:5001`.
    /// * `ws_url`   - resolved WebSocket URL, e.g. `ws://10.0.0.9:5001/agent`.
    pub fn new(endpoint: String, ws_url: String) -> Self {
        Self { endpoint, ws_url }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Open the WebSocket connection.
    pub async fn connect(&self) -> Result<AgentConnection, ChannelError> {
        let (ws_stream, _response) = connect_async(self.ws_url.as_str()).await.map_err(|e| {
            ChannelError::Connection(format!(
                "Failed to connect to agent {} at {}: {e}",
                self.endpoint, self.ws_url
            ))
        })?;

        tracing::info!(
            endpoint = %self.endpoint,
            url = %self.ws_url,
            "Connected to agent",
        );

        Ok(AgentConnection {
            endpoint: self.endpoint.clone(),
            ws_stream,
        })
    }
}
