//! Post-update health classification.
//!
//! Agents report one free-form state string per service (container). Each
//! string is bucketed into healthy / unhealthy / converging, the buckets are
//! counted into a [`HealthSnapshot`], and the snapshot yields a
//! [`HealthVerdict`] for the update state machine.

use serde::{Deserialize, Serialize};

/// Substrings marking a service as failed. Checked first, so
/// `"Up 2 minutes (unhealthy)"` counts as unhealthy.
const UNHEALTHY_MARKERS: &[&str] = &["unhealthy", "exited", "dead", "down", "stopped", "error"];

/// Substrings marking a service as still coming up. Checked before the
/// healthy markers, so `"Up 5 seconds (health: starting)"` keeps converging.
const CONVERGING_MARKERS: &[&str] = &["starting", "created", "restarting", "paused"];

/// Substrings marking a service as up.
const HEALTHY_MARKERS: &[&str] = &["running", "healthy", "up"];

/// One service's state as reported by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub name: String,
    pub state: String,
}

/// Bucket a single service belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceHealth {
    Healthy,
    Unhealthy,
    Converging,
}

/// Classify an agent-reported state string.
pub fn classify_service_state(state: &str) -> ServiceHealth {
    let state = state.to_ascii_lowercase();
    if UNHEALTHY_MARKERS.iter().any(|m| state.contains(m)) {
        ServiceHealth::Unhealthy
    } else if CONVERGING_MARKERS.iter().any(|m| state.contains(m)) {
        ServiceHealth::Converging
    } else if HEALTHY_MARKERS.iter().any(|m| state.contains(m)) {
        ServiceHealth::Healthy
    } else {
        ServiceHealth::Converging
    }
}

/// Aggregate health counts of a stack's services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub total: u32,
    pub healthy: u32,
    pub unhealthy: u32,
}

/// What a snapshot means for an item in `VerifyingHealth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthVerdict {
    Healthy,
    Degraded,
    Converging,
}

impl HealthSnapshot {
    pub fn new(total: u32, healthy: u32, unhealthy: u32) -> Self {
        Self {
            total,
            healthy,
            unhealthy,
        }
    }

    /// Count services into a snapshot.
    pub fn from_services(services: &[ServiceStatus]) -> Self {
        services.iter().fold(Self::default(), |mut acc, svc| {
            acc.total += 1;
            match classify_service_state(&svc.state) {
                ServiceHealth::Healthy => acc.healthy += 1,
                ServiceHealth::Unhealthy => acc.unhealthy += 1,
                ServiceHealth::Converging => {}
            }
            acc
        })
    }

    /// Any unhealthy service fails the item, even if others are healthy.
    /// An empty service list is not treated as success.
    pub fn verdict(&self) -> HealthVerdict {
        if self.unhealthy > 0 {
            HealthVerdict::Degraded
        } else if self.total > 0 && self.healthy == self.total {
            HealthVerdict::Healthy
        } else {
            HealthVerdict::Converging
        }
    }
}
