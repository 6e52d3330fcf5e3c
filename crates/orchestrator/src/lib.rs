//! Batch update orchestration.
//!
//! [`BatchOrchestrator`] rolls a stack update out to a caller-selected set of
//! `(stack, endpoint)` pairs, one at a time, verifying each update through
//! the agent's status notifications and service-health polls before moving
//! on. Collaborators are injected: a [`HostRegistry`](rollout_registry::HostRegistry)
//! for pending-update bookkeeping and an
//! [`AgentChannelFactory`](rollout_agent::AgentChannelFactory) for talking to agents.

pub mod config;
pub mod error;
pub mod events;
pub mod orchestrator;
mod runner;
pub mod schedule;

pub use config::OrchestratorConfig;
pub use error::OrchestratorError;
pub use events::BatchEvent;
pub use orchestrator::BatchOrchestrator;
pub use schedule::ScheduledTask;
