//! Flat-file JSON registry.
//!
//! The file holds a JSON array of [`HostEntry`] records. A missing file
//! reads as an empty registry; so does an unparsable one (with a warning),
//! matching how the rest of the system treats the file. Writes go to a
//! sibling temp file which is then renamed over the original.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::RegistryError;
use crate::models::{HostEntry, PendingUpdate};
use crate::{ops, HostRegistry};

/// Host registry backed by a JSON file on disk.
pub struct FileRegistry {
    path: PathBuf,
    /// Serialises read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_hosts(&self) -> Result<Vec<HostEntry>, RegistryError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<Vec<HostEntry>>(&raw) {
            Ok(hosts) => Ok(hosts),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Registry file is not a valid host list, treating as empty",
                );
                Ok(Vec::new())
            }
        }
    }

    async fn write_hosts(&self, hosts: &[HostEntry]) -> Result<(), RegistryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(hosts)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!(
            path = %self.path.display(),
            hosts = hosts.len(),
            "Registry file written",
        );
        Ok(())
    }

    /// Run one locked read-modify-write cycle.
    async fn mutate<T>(
        &self,
        op: impl FnOnce(&mut Vec<HostEntry>) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let _guard = self.write_lock.lock().await;
        let mut hosts = self.read_hosts().await?;
        let result = op(&mut hosts)?;
        self.write_hosts(&hosts).await?;
        Ok(result)
    }
}

#[async_trait]
impl HostRegistry for FileRegistry {
    async fn list_hosts(&self) -> Result<Vec<HostEntry>, RegistryError> {
        self.read_hosts().await
    }

    async fn remove_update(&self, stack: &str, hostname: &str) -> Result<bool, RegistryError> {
        let removed = self
            .mutate(|hosts| ops::remove_update(hosts, stack, hostname))
            .await?;
        tracing::info!(stack, hostname, removed, "Pending update removed from registry");
        Ok(removed)
    }

    async fn remove_update_at(&self, stack: &str, endpoint: &str) -> Result<bool, RegistryError> {
        let removed = self
            .mutate(|hosts| ops::remove_update_at(hosts, stack, endpoint))
            .await?;
        tracing::info!(stack, endpoint, removed, "Pending update removed from registry");
        Ok(removed)
    }

    async fn replace_all(&self, hosts: Vec<HostEntry>) -> Result<(), RegistryError> {
        for host in &hosts {
            ops::validate_host(&host.hostname, &host.endpoint)?;
        }
        let _guard = self.write_lock.lock().await;
        self.write_hosts(&hosts).await?;
        tracing::info!(hosts = hosts.len(), "Registry replaced");
        Ok(())
    }

    async fn set_updates(
        &self,
        hostname: &str,
        endpoint: &str,
        updates: Vec<PendingUpdate>,
    ) -> Result<HostEntry, RegistryError> {
        let entry = self
            .mutate(|hosts| ops::set_updates(hosts, hostname, endpoint, updates))
            .await?;
        tracing::info!(
            hostname,
            endpoint,
            updates = entry.updates.len(),
            "Pending updates recorded",
        );
        Ok(entry)
    }

    async fn register_agent(&self, hostname: &str, endpoint: &str) -> Result<bool, RegistryError> {
        let created = self
            .mutate(|hosts| ops::register_agent(hosts, hostname, endpoint))
            .await?;
        if created {
            tracing::info!(hostname, endpoint, "New agent registered");
        } else {
            tracing::info!(hostname, endpoint, "Agent refreshed");
        }
        Ok(created)
    }
}
