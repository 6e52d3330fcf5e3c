//! WebSocket infrastructure for browser clients.
//!
//! Provides connection management, heartbeat monitoring, and the HTTP
//! upgrade handler that streams batch events to the dashboard.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::ws_handler;
pub use heartbeat::{start_heartbeat, HEARTBEAT_INTERVAL};
pub use manager::WsManager;
