//! Registry records as stored on disk and returned over the API.

use serde::{Deserialize, Serialize};

/// One registered host and the stack updates known to be pending on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostEntry {
    pub hostname: String,
    pub endpoint: String,
    #[serde(default)]
    pub updates: Vec<PendingUpdate>,
}

/// A stack with a newer image available.
///
/// Fields other than `stack` and `image` written by other tools (e.g. the
/// per-container breakdown) are kept as-is across rewrites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingUpdate {
    pub stack: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl HostEntry {
    pub fn new(hostname: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            endpoint: endpoint.into(),
            updates: Vec::new(),
        }
    }

    /// Whether the host has any pending update.
    pub fn has_updates(&self) -> bool {
        !self.updates.is_empty()
    }

    /// Whether an update for `stack` is pending (case-insensitive).
    pub fn has_update(&self, stack: &str) -> bool {
        self.updates
            .iter()
            .any(|u| u.stack.eq_ignore_ascii_case(stack))
    }
}

impl PendingUpdate {
    pub fn new(stack: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            image: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}
