use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use thiserror::Error;
use utils::file_system::fs_repository::FileRepositoryError;

use crate::docker::docker_cli::DockerCli;
use crate::managers::manifest::{ManifestCatalog, ManifestError};
use crate::managers::runtime::ContainerRuntime;
use crate::managers::steward::Steward;
use crate::managers::steward_manager::{StewardConfig, StewardDaemon};
use crate::probe::http_probe::HttpProbe;
use crate::storage::credential_repository::CredentialRepository;

#[derive(Debug, Error)]
pub enum StewardFabricError {
    #[error("Failed to prepare directory {path:?}: {source}")]
    DirectoryFail {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to open credentials: {0}")]
    CredentialsFail(#[from] FileRepositoryError),
    #[error(transparent)]
    ManifestFail(#[from] ManifestError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StewardFabricConfig {
    pub workdir: PathBuf,
    pub data_root: PathBuf,
    pub docker_path: PathBuf,
    pub docker_host: Option<String>,
    pub command_timeout: Duration,
    pub tunnel_image: String,
    pub probe_url: String,
    pub probe_timeout: Duration,
    pub manifests_path: Option<PathBuf>,
    pub auto_deploy_configured: bool,
}

pub struct StewardFabric {
    config: StewardFabricConfig,
}

impl StewardFabric {
    pub async fn new(config: StewardFabricConfig) -> Result<Self, StewardFabricError> {
        for path in [&config.workdir, &config.data_root] {
            tokio::fs::create_dir_all(path)
                .await
                .map_err(|source| StewardFabricError::DirectoryFail {
                    path: path.clone(),
                    source,
                })?;
        }
        Ok(Self { config })
    }

    pub async fn create_steward(self) -> Result<Arc<dyn Steward + Send + Sync>, StewardFabricError> {
        let config = self.config;
        let runtime = Arc::new(DockerCli::new(
            config.docker_path,
            config.docker_host,
            config.command_timeout,
        ));
        // Deploys surface their own errors, so an unreachable runtime doesn't stop the daemon.
        match runtime.test_connection().await {
            Ok(()) => info!("Container runtime is reachable."),
            Err(err) => warn!("Container runtime is unreachable: {err}"),
        }

        let mut manifests = ManifestCatalog::builtin();
        if let Some(path) = &config.manifests_path {
            manifests = manifests.with_overrides(path).await?;
        }
        let credentials = Arc::new(CredentialRepository::open(&config.workdir).await?);
        let probe = Box::new(HttpProbe::new(config.probe_url, config.probe_timeout));

        Ok(Arc::new(StewardDaemon::new(
            manifests,
            probe,
            runtime,
            credentials,
            StewardConfig {
                data_root: config.data_root,
                tunnel_image: config.tunnel_image,
                auto_deploy_configured: config.auto_deploy_configured,
            },
        )))
    }
}
