//! The agent channel seam.
//!
//! [`AgentChannel`] is the three-operation RPC surface of one remote agent;
//! [`AgentChannelFactory`] hands out the shared channel for an endpoint.
//! The orchestrator only ever sees these traits, so tests substitute
//! scripted in-memory agents.

use std::sync::Arc;

use async_trait::async_trait;
use rollout_core::health::ServiceStatus;
use rollout_core::run_state::RunState;
use serde::Serialize;
use tokio::sync::broadcast;

/// Agent's answer to an update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateAck {
    /// `true` when the agent accepted the request and started work.
    pub ok: bool,
    /// Agent-supplied reason when `ok` is `false`.
    pub error: Option<String>,
}

impl UpdateAck {
    pub fn accepted() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(reason.into()),
        }
    }
}

/// Per-service state of a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHealthReport {
    pub ok: bool,
    pub services: Vec<ServiceStatus>,
    pub error: Option<String>,
}

/// Unsolicited run-state change pushed by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentNotification {
    pub endpoint: String,
    pub stack: String,
    pub run_state: RunState,
}

/// RPC surface of one remote agent.
#[async_trait]
pub trait AgentChannel: Send + Sync {
    /// Endpoint identifier this channel talks to.
    fn endpoint(&self) -> &str;

    /// Ask the agent to update `stack`. Resolves once the agent has
    /// acknowledged (or refused) the request, not when the update is done.
    async fn request_update(&self, stack: &str) -> Result<UpdateAck, ChannelError>;

    /// Subscribe to status-change notifications for every stack on the agent.
    fn subscribe(&self) -> broadcast::Receiver<AgentNotification>;

    /// Poll per-service state of `stack`.
    async fn query_service_health(&self, stack: &str) -> Result<ServiceHealthReport, ChannelError>;
}

/// Hands out the (shared, long-lived) channel for an endpoint.
#[async_trait]
pub trait AgentChannelFactory: Send + Sync {
    async fn channel(&self, endpoint: &str) -> Result<Arc<dyn AgentChannel>, ChannelError>;
}

/// Errors on the agent channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Could not establish a connection to the agent.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The channel exists but is currently reconnecting.
    #[error("Agent {0} is not connected")]
    NotConnected(String),

    /// The connection dropped before the agent answered.
    #[error("Agent {0} disconnected before answering")]
    Disconnected(String),

    /// The agent did not answer in time.
    #[error("Agent {0} did not answer in time")]
    Timeout(String),

    /// A frame could not be encoded or decoded.
    #[error("Protocol error: {0}")]
    Protocol(String),
}
