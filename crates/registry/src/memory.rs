//! In-process registry, used by tests and by tools that do not persist.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::RegistryError;
use crate::models::{HostEntry, PendingUpdate};
use crate::{ops, HostRegistry};

#[derive(Default)]
pub struct MemoryRegistry {
    hosts: RwLock<Vec<HostEntry>>,
}

impl MemoryRegistry {
    pub fn new(hosts: Vec<HostEntry>) -> Self {
        Self {
            hosts: RwLock::new(hosts),
        }
    }
}

#[async_trait]
impl HostRegistry for MemoryRegistry {
    async fn list_hosts(&self) -> Result<Vec<HostEntry>, RegistryError> {
        Ok(self.hosts.read().await.clone())
    }

    async fn remove_update(&self, stack: &str, hostname: &str) -> Result<bool, RegistryError> {
        ops::remove_update(&mut *self.hosts.write().await, stack, hostname)
    }

    async fn remove_update_at(&self, stack: &str, endpoint: &str) -> Result<bool, RegistryError> {
        ops::remove_update_at(&mut *self.hosts.write().await, stack, endpoint)
    }

    async fn replace_all(&self, hosts: Vec<HostEntry>) -> Result<(), RegistryError> {
        for host in &hosts {
            ops::validate_host(&host.hostname, &host.endpoint)?;
        }
        *self.hosts.write().await = hosts;
        Ok(())
    }

    async fn set_updates(
        &self,
        hostname: &str,
        endpoint: &str,
        updates: Vec<PendingUpdate>,
    ) -> Result<HostEntry, RegistryError> {
        ops::set_updates(&mut *self.hosts.write().await, hostname, endpoint, updates)
    }

    async fn register_agent(&self, hostname: &str, endpoint: &str) -> Result<bool, RegistryError> {
        ops::register_agent(&mut *self.hosts.write().await, hostname, endpoint)
    }
}
