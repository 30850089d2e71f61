use std::collections::BTreeMap;
use std::path::PathBuf;

use request_handlers::{connect_to_steward_socket, Communicator};
use steward_client::{
    container::ContainerDescription,
    dashboard::DashboardSummary,
    deployment::{AppDeploymentOutcome, BatchDeployRequest, BatchDeploymentReport, DeployRequest},
    instance::InstanceDescription,
    manifest::ManifestDescription,
    proxy::{
        AddedProxy, AutoDeploy, ProxyDescription, ProxyHealthDescription, ProxyRemovalPreview,
        TeardownReportDescription,
    },
};
use steward_client_error::StewardClientError;
use uuid::Uuid;

pub mod request_handlers;
pub mod steward_client_error;

/// A single connection to the Steward daemon socket. Requests are answered in order.
pub struct StewardConnection {
    communicator: Communicator,
}

impl StewardConnection {
    pub async fn connect(steward_socket_path: PathBuf) -> Result<Self, StewardClientError> {
        Ok(Self {
            communicator: Communicator::new(connect_to_steward_socket(steward_socket_path).await?),
        })
    }

    pub async fn add_proxy(
        &mut self,
        uri: String,
        auto_deploy: AutoDeploy,
    ) -> Result<AddedProxy, StewardClientError> {
        request_handlers::add_proxy(&mut self.communicator, uri, auto_deploy).await
    }

    pub async fn list_proxies(&mut self) -> Result<Vec<ProxyDescription>, StewardClientError> {
        request_handlers::list_proxies(&mut self.communicator).await
    }

    pub async fn test_proxy(
        &mut self,
        id: Uuid,
    ) -> Result<ProxyHealthDescription, StewardClientError> {
        request_handlers::test_proxy(&mut self.communicator, id).await
    }

    pub async fn inspect_proxy_removal(
        &mut self,
        id: Uuid,
    ) -> Result<ProxyRemovalPreview, StewardClientError> {
        request_handlers::inspect_proxy_removal(&mut self.communicator, id).await
    }

    pub async fn confirm_proxy_removal(
        &mut self,
        id: Uuid,
    ) -> Result<TeardownReportDescription, StewardClientError> {
        request_handlers::confirm_proxy_removal(&mut self.communicator, id).await
    }

    pub async fn abort_proxy_removal(&mut self, id: Uuid) -> Result<(), StewardClientError> {
        request_handlers::abort_proxy_removal(&mut self.communicator, id).await
    }

    pub async fn deploy_app(
        &mut self,
        request: DeployRequest,
    ) -> Result<InstanceDescription, StewardClientError> {
        request_handlers::deploy_app(&mut self.communicator, request).await
    }

    pub async fn deploy_app_with_proxies(
        &mut self,
        request: BatchDeployRequest,
    ) -> Result<BatchDeploymentReport, StewardClientError> {
        request_handlers::deploy_app_with_proxies(&mut self.communicator, request).await
    }

    pub async fn deploy_apps_on_proxy(
        &mut self,
        proxy_id: Uuid,
        app_ids: Vec<String>,
    ) -> Result<Vec<AppDeploymentOutcome>, StewardClientError> {
        request_handlers::deploy_apps_on_proxy(&mut self.communicator, proxy_id, app_ids).await
    }

    pub async fn list_instances(
        &mut self,
        app_id: Option<String>,
        proxy_id: Option<Uuid>,
    ) -> Result<Vec<InstanceDescription>, StewardClientError> {
        request_handlers::list_instances(&mut self.communicator, app_id, proxy_id).await
    }

    pub async fn remove_instance(&mut self, id: String) -> Result<(), StewardClientError> {
        request_handlers::remove_instance(&mut self.communicator, id).await
    }

    pub async fn remove_app(&mut self, app_id: String) -> Result<Vec<String>, StewardClientError> {
        request_handlers::remove_app(&mut self.communicator, app_id).await
    }

    pub async fn list_containers(
        &mut self,
    ) -> Result<Vec<ContainerDescription>, StewardClientError> {
        request_handlers::list_containers(&mut self.communicator).await
    }

    pub async fn start_container(&mut self, name: String) -> Result<(), StewardClientError> {
        request_handlers::start_container(&mut self.communicator, name).await
    }

    pub async fn stop_container(&mut self, name: String) -> Result<(), StewardClientError> {
        request_handlers::stop_container(&mut self.communicator, name).await
    }

    pub async fn restart_container(&mut self, name: String) -> Result<(), StewardClientError> {
        request_handlers::restart_container(&mut self.communicator, name).await
    }

    pub async fn container_logs(
        &mut self,
        name: String,
        tail: Option<usize>,
    ) -> Result<String, StewardClientError> {
        request_handlers::container_logs(&mut self.communicator, name, tail).await
    }

    pub async fn container_environment(
        &mut self,
        name: String,
    ) -> Result<BTreeMap<String, String>, StewardClientError> {
        request_handlers::container_environment(&mut self.communicator, name).await
    }

    pub async fn list_configured_apps(&mut self) -> Result<Vec<String>, StewardClientError> {
        request_handlers::list_configured_apps(&mut self.communicator).await
    }

    pub async fn list_manifests(&mut self) -> Result<Vec<ManifestDescription>, StewardClientError> {
        request_handlers::list_manifests(&mut self.communicator).await
    }

    pub async fn dashboard(&mut self) -> Result<DashboardSummary, StewardClientError> {
        request_handlers::dashboard(&mut self.communicator).await
    }

    pub async fn refresh_statuses(&mut self) -> Result<usize, StewardClientError> {
        request_handlers::refresh_statuses(&mut self.communicator).await
    }
}
