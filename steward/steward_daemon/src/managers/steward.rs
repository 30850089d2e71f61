use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::credentials::CredentialStoreError;
use super::deployment::{
    AppDeployment, BatchDeploymentRequest, BatchDeploymentResult, DeploymentError,
    DeploymentRequest,
};
use super::instance::{AppInstance, InstanceError};
use super::manifest::{AppManifest, ManifestError};
use super::proxy::{ProxyError, ProxyHealth, ProxyOverview};
use super::runtime::{ContainerInfo, NetworkStats, RuntimeError};
use super::teardown::{RemovalPreview, TeardownError, TeardownReport};

#[derive(Debug, Error, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum StewardError {
    #[error(transparent)]
    Proxy(#[from] ProxyError),
    #[error(transparent)]
    Instance(#[from] InstanceError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error(transparent)]
    Teardown(#[from] TeardownError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Credentials(#[from] CredentialStoreError),
}

/// Apps deployed behind a proxy right after it has been added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AutoDeploy {
    #[default]
    Nothing,
    /// Every app with stored credentials.
    Configured,
    Selected(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProxyAddition {
    pub overview: ProxyOverview,
    pub deployments: Vec<AppDeployment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceTraffic {
    pub instance_id: String,
    pub container_name: String,
    pub stats: NetworkStats,
    pub started_at: Option<DateTime<Utc>>,
}

/// Lists are ordered newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dashboard {
    pub proxies_total: usize,
    pub proxies_healthy: usize,
    pub proxies_unhealthy: usize,
    pub proxies_unknown: usize,
    pub instances_total: usize,
    pub instances_running: usize,
    /// Instances whose container is not running, including missing ones.
    pub instances_stopped: usize,
    pub containers_total: usize,
    pub traffic: Vec<InstanceTraffic>,
    pub recent_instances: Vec<AppInstance>,
    pub recent_activity: Vec<Activity>,
}

#[async_trait]
pub trait Steward {
    async fn add_proxy(
        &self,
        uri: &str,
        auto_deploy: AutoDeploy,
    ) -> Result<ProxyAddition, StewardError>;
    fn list_proxies(&self) -> Vec<ProxyOverview>;
    async fn test_proxy(&self, id: &Uuid) -> Result<ProxyHealth, StewardError>;
    fn inspect_proxy_removal(&self, id: &Uuid) -> Result<RemovalPreview, StewardError>;
    async fn confirm_proxy_removal(&self, id: &Uuid) -> Result<TeardownReport, StewardError>;
    fn abort_proxy_removal(&self, id: &Uuid) -> Result<(), StewardError>;

    async fn deploy_app(&self, request: DeploymentRequest) -> Result<AppInstance, StewardError>;
    async fn deploy_app_with_proxies(
        &self,
        request: BatchDeploymentRequest,
    ) -> Result<BatchDeploymentResult, StewardError>;
    async fn deploy_apps_on_proxy(
        &self,
        proxy_id: &Uuid,
        app_ids: &[String],
    ) -> Result<Vec<AppDeployment>, StewardError>;
    fn list_instances(&self, app_id: Option<String>, proxy_id: Option<Uuid>) -> Vec<AppInstance>;
    async fn remove_instance(&self, id: &str) -> Result<(), StewardError>;
    /// Removes every instance of the app and its stored credentials.
    async fn remove_app(&self, app_id: &str) -> Result<Vec<String>, StewardError>;

    async fn list_containers(&self) -> Result<Vec<ContainerInfo>, StewardError>;
    async fn start_container(&self, name: &str) -> Result<(), StewardError>;
    async fn stop_container(&self, name: &str) -> Result<(), StewardError>;
    async fn restart_container(&self, name: &str) -> Result<(), StewardError>;
    /// `None` shows the default tail, `Some(0)` the whole log.
    async fn container_logs(&self, name: &str, tail: Option<usize>)
        -> Result<String, StewardError>;
    async fn container_env(&self, name: &str) -> Result<BTreeMap<String, String>, StewardError>;

    async fn configured_apps(&self) -> Result<Vec<String>, StewardError>;
    fn list_manifests(&self) -> Vec<(String, AppManifest)>;
    async fn dashboard(&self) -> Result<Dashboard, StewardError>;
    /// Aligns instance statuses with the runtime. Returns how many changed.
    async fn refresh_statuses(&self) -> Result<usize, StewardError>;
}
