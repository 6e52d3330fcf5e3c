//! Update requests and their identity keys.
//!
//! An [`UpdateRequest`] names one stack on one endpoint. Within a batch a
//! request is identified by its [`UpdateKey`]; the comparison is exact
//! (case-sensitive) on both parts.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A caller's request to update one stack on one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    /// Name of the stack (compose project) to update.
    pub stack_name: String,
    /// Opaque identifier of the agent hosting the stack.
    pub endpoint: String,
}

impl UpdateRequest {
    pub fn new(stack_name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            stack_name: stack_name.into(),
            endpoint: endpoint.into(),
        }
    }

    /// Identity of this request within a batch.
    pub fn key(&self) -> UpdateKey {
        UpdateKey {
            stack_name: self.stack_name.clone(),
            endpoint: self.endpoint.clone(),
        }
    }
}

/// Identity of an update item: `(stack_name, endpoint)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UpdateKey {
    pub stack_name: String,
    pub endpoint: String,
}

impl fmt::Display for UpdateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.stack_name, self.endpoint)
    }
}

/// Reject requests with a blank stack name or endpoint.
pub fn validate_request(request: &UpdateRequest) -> Result<(), CoreError> {
    if request.stack_name.trim().is_empty() {
        return Err(CoreError::Validation(
            "Update request is missing a stack name".to_string(),
        ));
    }
    if request.endpoint.trim().is_empty() {
        return Err(CoreError::Validation(format!(
            "Update request for stack '{}' is missing an endpoint",
            request.stack_name
        )));
    }
    Ok(())
}

/// Drop repeated requests, keeping the first occurrence of each key.
///
/// Submission order of the surviving requests is preserved.
pub fn dedup_requests(requests: Vec<UpdateRequest>) -> Vec<UpdateRequest> {
    let mut seen = HashSet::new();
    requests
        .into_iter()
        .filter(|r| seen.insert(r.key()))
        .collect()
}
