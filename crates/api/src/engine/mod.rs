//! Background plumbing between the orchestrator and browser clients.

pub mod forwarder;
