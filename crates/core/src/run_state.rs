//! Stack run states reported by agents in `statusChanged` notifications.

use serde::{Deserialize, Serialize};

/// Run state of a stack as reported by its agent.
///
/// Parsing is case-insensitive; unrecognised values become
/// [`RunState::Unknown`] so a newer agent never breaks the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum RunState {
    Running,
    Exited,
    Error,
    Updating,
    Starting,
    Created,
    Unknown,
}

/// How the update state machine reacts to a run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStateClass {
    /// The stack is up; health verification may begin.
    Started,
    /// The stack stopped or errored after the update.
    Stopped,
    /// Intermediate state, nothing to do yet.
    Transitional,
}

impl RunState {
    pub fn classify(self) -> RunStateClass {
        match self {
            Self::Running => RunStateClass::Started,
            Self::Exited | Self::Error => RunStateClass::Stopped,
            Self::Updating | Self::Starting | Self::Created | Self::Unknown => {
                RunStateClass::Transitional
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Exited => "exited",
            Self::Error => "error",
            Self::Updating => "updating",
            Self::Starting => "starting",
            Self::Created => "created",
            Self::Unknown => "unknown",
        }
    }
}

impl From<String> for RunState {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "running" => Self::Running,
            "exited" => Self::Exited,
            "error" => Self::Error,
            "updating" => Self::Updating,
            "starting" => Self::Starting,
            "created" => Self::Created,
            _ => Self::Unknown,
        }
    }
}
