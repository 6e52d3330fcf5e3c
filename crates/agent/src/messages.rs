//! Agent WebSocket wire protocol.
//!
//! Every frame is a JSON text message tagged by its `event` field.
//!
//! Requests (server → agent) carry a numeric `id`:
//!
//! ```json
//! {"event":"updateStack","id":7,"stack":"immich"}
//! {"event":"serviceHealth","id":8,"stack":"immich"}
//! ```
//!
//! The agent answers each with a `response` frame echoing the id, and pushes
//! `statusChanged` frames on its own:
//!
//! ```json
//! {"event":"response","id":7,"ok":true}
//! {"event":"response","id":8,"ok":true,"services":[{"name":"server","state":"running"}]}
//! {"event":"statusChanged","stack":"immich","runState":"running"}
//! ```

use rollout_core::health::ServiceStatus;
use rollout_core::run_state::RunState;
use serde::{Deserialize, Serialize};

/// Frames sent to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum AgentRequest {
    UpdateStack { id: u64, stack: String },
    ServiceHealth { id: u64, stack: String },
}

impl AgentRequest {
    pub fn id(&self) -> u64 {
        match self {
            Self::UpdateStack { id, .. } | Self::ServiceHealth { id, .. } => *id,
        }
    }
}

/// Frames received from the agent.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum AgentMessage {
    /// Answer to a request.
    Response(ResponseData),
    /// A stack changed run state.
    StatusChanged(StatusChangedData),
}

/// Payload of `response` frames.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseData {
    pub id: u64,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// Present on `serviceHealth` answers.
    #[serde(default)]
    pub services: Vec<ServiceStatus>,
}

/// Payload of `statusChanged` frames.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusChangedData {
    pub stack: String,
    #[serde(rename = "runState")]
    pub run_state: RunState,
}

/// Parse an agent text frame.
///
/// Returns `Err` for malformed JSON or unknown `event` values; callers
/// log and continue.
pub fn parse_message(text: &str) -> Result<AgentMessage, serde_json::Error> {
    serde_json::from_str(text)
}

/// Encode a request frame.
pub fn encode_request(request: &AgentRequest) -> Result<String, serde_json::Error> {
    serde_json::to_string(request)
}
