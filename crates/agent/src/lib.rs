//! Agent channel: RPC with the remote agents that run stacks.
//!
//! Defines the [`AgentChannel`] / [`AgentChannelFactory`] seam used by the
//! orchestrator, the JSON wire protocol, and a WebSocket implementation
//! that keeps one persistent, auto-reconnecting connection per endpoint.

pub mod channel;
pub mod client;
pub mod connection;
pub mod manager;
pub mod messages;
pub mod reconnect;

pub use channel::{
    AgentChannel, AgentChannelFactory, AgentNotification, ChannelError, ServiceHealthReport,
    UpdateAck,
};
pub use connection::WsAgentChannel;
pub use manager::{AgentManager, AgentManagerConfig};
pub use reconnect::ReconnectConfig;
