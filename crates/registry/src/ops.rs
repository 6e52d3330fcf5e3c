//! Mutations on an in-memory host list, shared by every registry backend.
//!
//! Hostnames, endpoints and stack names are matched case-insensitively.

use crate::error::RegistryError;
use crate::models::{HostEntry, PendingUpdate};

/// Find the host registered under `endpoint`.
pub fn find_by_endpoint<'a>(hosts: &'a [HostEntry], endpoint: &str) -> Option<&'a HostEntry> {
    hosts
        .iter()
        .find(|h| h.endpoint.eq_ignore_ascii_case(endpoint))
}

/// Whether `(stack, endpoint)` is still listed as pending.
pub fn is_pending(hosts: &[HostEntry], stack: &str, endpoint: &str) -> bool {
    find_by_endpoint(hosts, endpoint).is_some_and(|h| h.has_update(stack))
}

/// Reject blank hostnames and endpoints.
pub fn validate_host(hostname: &str, endpoint: &str) -> Result<(), RegistryError> {
    if hostname.trim().is_empty() {
        return Err(RegistryError::Invalid("hostname must not be empty".into()));
    }
    if endpoint.trim().is_empty() {
        return Err(RegistryError::Invalid("endpoint must not be empty".into()));
    }
    Ok(())
}

/// Remove every pending update named `stack` from the host `hostname`.
pub fn remove_update(
    hosts: &mut [HostEntry],
    stack: &str,
    hostname: &str,
) -> Result<bool, RegistryError> {
    let host = hosts
        .iter_mut()
        .find(|h| h.hostname.eq_ignore_ascii_case(hostname))
        .ok_or_else(|| RegistryError::HostNotFound(hostname.to_string()))?;

    let before = host.updates.len();
    host.updates.retain(|u| !u.stack.eq_ignore_ascii_case(stack));
    Ok(host.updates.len() < before)
}

/// Remove every pending update named `stack` from the host at `endpoint`.
///
/// Several endpoints may share a hostname; this form touches only one.
pub fn remove_update_at(
    hosts: &mut [HostEntry],
    stack: &str,
    endpoint: &str,
) -> Result<bool, RegistryError> {
    let host = hosts
        .iter_mut()
        .find(|h| h.endpoint.eq_ignore_ascii_case(endpoint))
        .ok_or_else(|| RegistryError::HostNotFound(endpoint.to_string()))?;

    let before = host.updates.len();
    host.updates.retain(|u| !u.stack.eq_ignore_ascii_case(stack));
    Ok(host.updates.len() < before)
}

/// Replace the update list of `endpoint`, adding the host if it is new.
pub fn set_updates(
    hosts: &mut Vec<HostEntry>,
    hostname: &str,
    endpoint: &str,
    updates: Vec<PendingUpdate>,
) -> Result<HostEntry, RegistryError> {
    validate_host(hostname, endpoint)?;
    if let Some(blank) = updates.iter().find(|u| u.stack.trim().is_empty()) {
        return Err(RegistryError::Invalid(format!(
            "pending update without a stack name: {blank:?}"
        )));
    }

    let entry = HostEntry {
        hostname: hostname.to_string(),
        endpoint: endpoint.to_string(),
        updates,
    };
    match hosts
        .iter_mut()
        .find(|h| h.endpoint.eq_ignore_ascii_case(endpoint))
    {
        Some(existing) => *existing = entry.clone(),
        None => hosts.push(entry.clone()),
    }
    Ok(entry)
}

/// Register an agent; returns `true` when the endpoint was not known yet.
pub fn register_agent(
    hosts: &mut Vec<HostEntry>,
    hostname: &str,
    endpoint: &str,
) -> Result<bool, RegistryError> {
    validate_host(hostname, endpoint)?;
    match hosts
        .iter_mut()
        .find(|h| h.endpoint.eq_ignore_ascii_case(endpoint))
    {
        Some(existing) => {
            existing.hostname = hostname.to_string();
            Ok(false)
        }
        None => {
            hosts.push(HostEntry::new(hostname, endpoint));
            Ok(true)
        }
    }
}
