//! Host registry: which hosts exist and which stack updates are pending.
//!
//! The orchestrator and the API talk to the registry through the
//! [`HostRegistry`] trait. Two implementations ship here:
//!
//! - [`FileRegistry`]: a flat JSON file (the production store).
//! - [`MemoryRegistry`]: an in-process store for tests and tooling.
//!
//! Matching of hostnames, endpoints and stack names is case-insensitive in
//! every implementation; see [`ops`].

use async_trait::async_trait;

pub mod error;
pub mod file;
pub mod memory;
pub mod models;
pub mod ops;

pub use error::RegistryError;
pub use file::FileRegistry;
pub use memory::MemoryRegistry;
pub use models::{HostEntry, PendingUpdate};

/// Query and mutation interface of the host registry.
#[async_trait]
pub trait HostRegistry: Send + Sync {
    /// Every known host with its pending updates.
    async fn list_hosts(&self) -> Result<Vec<HostEntry>, RegistryError>;

    /// Drop the pending update for `stack` on the host named `hostname`.
    ///
    /// Returns `false` when the host exists but has no such update.
    async fn remove_update(&self, stack: &str, hostname: &str) -> Result<bool, RegistryError>;

    /// Drop the pending update for `stack` on the host at `endpoint`.
    ///
    /// Returns `false` when the host exists but has no such update.
    async fn remove_update_at(&self, stack: &str, endpoint: &str) -> Result<bool, RegistryError>;

    /// Replace the whole registry.
    async fn replace_all(&self, hosts: Vec<HostEntry>) -> Result<(), RegistryError>;

    /// Replace the pending updates of one endpoint, creating the host if new.
    async fn set_updates(
        &self,
        hostname: &str,
        endpoint: &str,
        updates: Vec<PendingUpdate>,
    ) -> Result<HostEntry, RegistryError>;

    /// Record that an agent is alive, refreshing its hostname.
    ///
    /// Pending updates of a known endpoint are kept.
    async fn register_agent(&self, hostname: &str, endpoint: &str) -> Result<bool, RegistryError>;
}
