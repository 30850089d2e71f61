use std::collections::BTreeMap;
use std::path::PathBuf;

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
    steward::{StewardCommand, StewardResponse},
};
use tokio::net::UnixStream;
use utils::serde::json_framed::JsonFramed;
use uuid::Uuid;

use crate::steward_client_error::StewardClientError;

pub type Communicator = JsonFramed<UnixStream, StewardResponse, StewardCommand>;

pub async fn add_proxy(
    communicator: &mut Communicator,
    uri: String,
    auto_deploy: AutoDeploy,
) -> Result<AddedProxy, StewardClientError> {
    match communicate(communicator, StewardCommand::AddProxy { uri, auto_deploy }).await? {
        StewardResponse::AddedProxy { added } => Ok(added),
        response => Err(handle_error_response(response)),
    }
}

pub async fn list_proxies(
    communicator: &mut Communicator,
) -> Result<Vec<ProxyDescription>, StewardClientError> {
    match communicate(communicator, StewardCommand::ListProxies).await? {
        StewardResponse::ListedProxies { proxies } => Ok(proxies),
        response => Err(handle_error_response(response)),
    }
}

pub async fn test_proxy(
    communicator: &mut Communicator,
    id: Uuid,
) -> Result<ProxyHealthDescription, StewardClientError> {
    match communicate(communicator, StewardCommand::TestProxy { id }).await? {
        StewardResponse::TestedProxy { health } => Ok(health),
        response => Err(handle_error_response(response)),
    }
}

pub async fn inspect_proxy_removal(
    communicator: &mut Communicator,
    id: Uuid,
) -> Result<ProxyRemovalPreview, StewardClientError> {
    match communicate(communicator, StewardCommand::InspectProxyRemoval { id }).await? {
        StewardResponse::RemovalPreview { preview } => Ok(preview),
        response => Err(handle_error_response(response)),
    }
}

pub async fn confirm_proxy_removal(
    communicator: &mut Communicator,
    id: Uuid,
) -> Result<TeardownReportDescription, StewardClientError> {
    match communicate(communicator, StewardCommand::ConfirmProxyRemoval { id }).await? {
        StewardResponse::ProxyRemoved { report } => Ok(report),
        response => Err(handle_error_response(response)),
    }
}

pub async fn abort_proxy_removal(
    communicator: &mut Communicator,
    id: Uuid,
) -> Result<(), StewardClientError> {
    match communicate(communicator, StewardCommand::AbortProxyRemoval { id }).await? {
        StewardResponse::Ok => Ok(()),
        response => Err(handle_error_response(response)),
    }
}

pub async fn deploy_app(
    communicator: &mut Communicator,
    request: DeployRequest,
) -> Result<InstanceDescription, StewardClientError> {
    match communicate(communicator, StewardCommand::DeployApp { request }).await? {
        StewardResponse::DeployedApp { instance } => Ok(instance),
        response => Err(handle_error_response(response)),
    }
}

pub async fn deploy_app_with_proxies(
    communicator: &mut Communicator,
    request: BatchDeployRequest,
) -> Result<BatchDeploymentReport, StewardClientError> {
    match communicate(communicator, StewardCommand::DeployAppWithProxies { request }).await? {
        StewardResponse::BatchDeployed { report } => Ok(report),
        response => Err(handle_error_response(response)),
    }
}

pub async fn deploy_apps_on_proxy(
    communicator: &mut Communicator,
    proxy_id: Uuid,
    app_ids: Vec<String>,
) -> Result<Vec<AppDeploymentOutcome>, StewardClientError> {
    match communicate(
        communicator,
        StewardCommand::DeployAppsOnProxy { proxy_id, app_ids },
    )
    .await?
    {
        StewardResponse::DeployedOnProxy { outcomes } => Ok(outcomes),
        response => Err(handle_error_response(response)),
    }
}

pub async fn list_instances(
    communicator: &mut Communicator,
    app_id: Option<String>,
    proxy_id: Option<Uuid>,
) -> Result<Vec<InstanceDescription>, StewardClientError> {
    match communicate(communicator, StewardCommand::ListInstances { app_id, proxy_id }).await? {
        StewardResponse::ListedInstances { instances } => Ok(instances),
        response => Err(handle_error_response(response)),
    }
}

pub async fn remove_instance(
    communicator: &mut Communicator,
    id: String,
) -> Result<(), StewardClientError> {
    match communicate(communicator, StewardCommand::RemoveInstance { id }).await? {
        StewardResponse::Ok => Ok(()),
        response => Err(handle_error_response(response)),
    }
}

pub async fn remove_app(
    communicator: &mut Communicator,
    app_id: String,
) -> Result<Vec<String>, StewardClientError> {
    match communicate(communicator, StewardCommand::RemoveApp { app_id }).await? {
        StewardResponse::RemovedApp { removed_instances } => Ok(removed_instances),
        response => Err(handle_error_response(response)),
    }
}

pub async fn list_containers(
    communicator: &mut Communicator,
) -> Result<Vec<ContainerDescription>, StewardClientError> {
    match communicate(communicator, StewardCommand::ListContainers).await? {
        StewardResponse::ListedContainers { containers } => Ok(containers),
        response => Err(handle_error_response(response)),
    }
}

pub async fn start_container(
    communicator: &mut Communicator,
    name: String,
) -> Result<(), StewardClientError> {
    match communicate(communicator, StewardCommand::StartContainer { name }).await? {
        StewardResponse::Ok => Ok(()),
        response => Err(handle_error_response(response)),
    }
}

pub async fn stop_container(
    communicator: &mut Communicator,
    name: String,
) -> Result<(), StewardClientError> {
    match communicate(communicator, StewardCommand::StopContainer { name }).await? {
        StewardResponse::Ok => Ok(()),
        response => Err(handle_error_response(response)),
    }
}

pub async fn restart_container(
    communicator: &mut Communicator,
    name: String,
) -> Result<(), StewardClientError> {
    match communicate(communicator, StewardCommand::RestartContainer { name }).await? {
        StewardResponse::Ok => Ok(()),
        response => Err(handle_error_response(response)),
    }
}

pub async fn container_logs(
    communicator: &mut Communicator,
    name: String,
    tail: Option<usize>,
) -> Result<String, StewardClientError> {
    match communicate(communicator, StewardCommand::ContainerLogs { name, tail }).await? {
        StewardResponse::ContainerLogs { logs } => Ok(logs),
        response => Err(handle_error_response(response)),
    }
}

pub async fn container_environment(
    communicator: &mut Communicator,
    name: String,
) -> Result<BTreeMap<String, String>, StewardClientError> {
    match communicate(communicator, StewardCommand::ContainerEnvironment { name }).await? {
        StewardResponse::ContainerEnvironment { variables } => Ok(variables),
        response => Err(handle_error_response(response)),
    }
}

pub async fn list_configured_apps(
    communicator: &mut Communicator,
) -> Result<Vec<String>, StewardClientError> {
    match communicate(communicator, StewardCommand::ListConfiguredApps).await? {
        StewardResponse::ListedConfiguredApps { app_ids } => Ok(app_ids),
        response => Err(handle_error_response(response)),
    }
}

pub async fn list_manifests(
    communicator: &mut Communicator,
) -> Result<Vec<ManifestDescription>, StewardClientError> {
    match communicate(communicator, StewardCommand::ListManifests).await? {
        StewardResponse::ListedManifests { manifests } => Ok(manifests),
        response => Err(handle_error_response(response)),
    }
}

pub async fn dashboard(
    communicator: &mut Communicator,
) -> Result<DashboardSummary, StewardClientError> {
    match communicate(communicator, StewardCommand::Dashboard).await? {
        StewardResponse::Dashboard { summary } => Ok(summary),
        response => Err(handle_error_response(response)),
    }
}

pub async fn refresh_statuses(communicator: &mut Communicator) -> Result<usize, StewardClientError> {
    match communicate(communicator, StewardCommand::RefreshStatuses).await? {
        StewardResponse::RefreshedStatuses { changed } => Ok(changed),
        response => Err(handle_error_response(response)),
    }
}

pub async fn connect_to_steward_socket(
    steward_socket_path: PathBuf,
) -> Result<UnixStream, StewardClientError> {
    UnixStream::connect(&steward_socket_path)
        .await
        .map_err(|err| StewardClientError::ConnectionFailed {
            socket_path: steward_socket_path,
            details: err,
        })
}

async fn communicate(
    communicator: &mut Communicator,
    command: StewardCommand,
) -> Result<StewardResponse, StewardClientError> {
    communicator
        .send(command)
        .await
        .map_err(StewardClientError::CommunicationFail)?;
    communicator
        .recv()
        .await
        .map_err(StewardClientError::CommunicationFail)
}

fn handle_error_response(response: StewardResponse) -> StewardClientError {
    match response {
        StewardResponse::Error { steward_error } => {
            StewardClientError::StewardOperationFail(steward_error)
        }
        response => StewardClientError::InvalidResponse {
            response: Box::new(response),
        },
    }
}
