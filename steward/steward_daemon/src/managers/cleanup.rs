use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use log::{error, info, warn};

use super::deployment::instance_data_dir;
use super::instance::AppInstance;
use super::naming::{self, ProxyHash};
use super::runtime::{ContainerRuntime, RuntimeError};

const BACKUP_DIR: &str = "backup";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Stops and removes instance containers. Failures never abort a removal;
/// they are logged and returned so callers can report them.
pub struct ContainerCleaner {
    runtime: Arc<dyn ContainerRuntime + Send + Sync>,
    data_root: PathBuf,
}

impl ContainerCleaner {
    pub fn new(runtime: Arc<dyn ContainerRuntime + Send + Sync>, data_root: PathBuf) -> Self {
        Self { runtime, data_root }
    }

    /// Stop, back up the per-instance data directory and force remove.
    pub async fn remove_instance(&self, instance: &AppInstance) -> Vec<String> {
        let mut failures = vec![];
        let name = &instance.container_name;

        if let Err(err) = self.runtime.stop(name).await {
            if err != RuntimeError::NotFound(name.clone()) {
                warn!("Failed to stop container {name}: {err}");
            }
        }
        if let Err(err) = self.backup_data_dir(instance).await {
            error!("Failed to back up data of {name}: {err}");
            failures.push(format!("{}: backup failed: {err}", instance.id));
        }
        match self.runtime.remove(name).await {
            Ok(()) => info!("Removed container {name}"),
            Err(RuntimeError::NotFound(_)) => info!("Container {name} was already gone"),
            Err(err) => {
                error!("Failed to remove container {name}: {err}");
                failures.push(format!("{}: {err}", instance.id));
            }
        }
        failures
    }

    /// Stops the container, logging failures, then force removes it.
    pub async fn stop_and_remove(&self, name: &str) -> Result<(), RuntimeError> {
        if let Err(err) = self.runtime.stop(name).await {
            warn!("Failed to stop container {name}: {err}");
        }
        match self.runtime.remove(name).await {
            Ok(()) | Err(RuntimeError::NotFound(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Removes the tunnel container of a proxy and then its network. The
    /// network removal is attempted even when the container removal fails;
    /// the first error is returned.
    pub async fn remove_tunnel(&self, hash: &ProxyHash) -> Result<(), RuntimeError> {
        let tunnel = naming::tunnel_container_name(hash);
        let container = self.stop_and_remove(&tunnel).await;
        if let Err(err) = &container {
            warn!("Failed to remove tunnel container {tunnel}: {err}");
        }
        let network = self
            .runtime
            .network_remove(&naming::tunnel_network_name(hash))
            .await;
        container.and(network)?;
        info!("Removed tunnel {tunnel}");
        Ok(())
    }

    /// Moves the instance data directory under `backup/`. Returns the new
    /// location or `None` when the instance had no data directory.
    async fn backup_data_dir(&self, instance: &AppInstance) -> std::io::Result<Option<PathBuf>> {
        let data_dir = instance_data_dir(
            &self.data_root,
            &instance.container_name,
            &instance.app_id,
        );
        if !tokio::fs::try_exists(&data_dir).await? {
            return Ok(None);
        }
        let backup_root = self.data_root.join(BACKUP_DIR);
        tokio::fs::create_dir_all(&backup_root).await?;
        let backup_dir = backup_root.join(format!(
            "{}_{}_{}",
            instance.container_name,
            instance.app_id,
            Local::now().format(BACKUP_TIMESTAMP_FORMAT)
        ));
        tokio::fs::rename(&data_dir, &backup_dir).await?;
        info!(
            "Backed up {} to {}",
            data_dir.display(),
            backup_dir.display()
        );
        Ok(Some(backup_dir))
    }
}
