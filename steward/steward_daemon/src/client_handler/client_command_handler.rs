use std::io::ErrorKind;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info, trace};
use steward_client::steward::{StewardCommand, StewardDaemonError, StewardResponse};
use thiserror::Error;
use tokio::{net::UnixStream, select};
use tokio_util::sync::CancellationToken;
use utils::serde::json_framed::{JsonFramed, JsonFramedError};

use crate::managers::steward::{Steward, StewardError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to read request: {0}")]
    ReadingRequestFail(#[source] JsonFramedError),
    #[error("Failed to send response: {0}")]
    SendingResponseFail(#[source] JsonFramedError),
}

#[async_trait]
pub trait Client {
    async fn handle_connection(
        steward: Arc<dyn Steward + Send + Sync>,
        socket: UnixStream,
        token: Arc<CancellationToken>,
    ) -> Result<(), ClientError>;
}

type Communicator = JsonFramed<UnixStream, StewardCommand, StewardResponse>;

pub struct ClientHandler {
    steward: Arc<dyn Steward + Send + Sync>,
    communicator: Communicator,
    token: Arc<CancellationToken>,
}

impl ClientHandler {
    pub async fn handle_requests(&mut self) -> Result<(), ClientError> {
        loop {
            select! {
                request = self.communicator.recv() => {
                    match request {
                        Ok(command) => {
                            let response = self.handle_command(command).await;
                            self.respond(response).await?;
                        }
                        Err(JsonFramedError::StreamIsClosed()) => {
                            debug!("Client disconnected.");
                            break;
                        }
                        Err(JsonFramedError::SerdeReadError(err)) if err.kind() == ErrorKind::InvalidData => {
                            error!("Received unrecognised command: {err}");
                            self.respond(StewardResponse::Error {
                                steward_error: StewardDaemonError::UnknownCommand,
                            }).await?;
                        }
                        Err(err) => {
                            return Err(ClientError::ReadingRequestFail(err));
                        }
                    }
                }
                _ = self.token.cancelled() => {
                    break;
                }
            }
        }
        Ok(())
    }

    async fn respond(&mut self, response: StewardResponse) -> Result<(), ClientError> {
        trace!("Sending response: {response:?}");
        self.communicator
            .send(response)
            .await
            .map_err(ClientError::SendingResponseFail)
    }

    async fn handle_command(&self, command: StewardCommand) -> StewardResponse {
        debug!("Handling command: {command:?}");
        match self.execute(command).await {
            Ok(response) => response,
            Err(err) => {
                error!("Steward operation failed: {err}");
                StewardResponse::Error {
                    steward_error: StewardDaemonError::StewardDaemonFail {
                        message: err.to_string(),
                    },
                }
            }
        }
    }

    async fn execute(&self, command: StewardCommand) -> Result<StewardResponse, StewardError> {
        let steward = &self.steward;
        Ok(match command {
            StewardCommand::AddProxy { uri, auto_deploy } => {
                info!("Adding proxy.");
                let added = steward.add_proxy(&uri, auto_deploy.into()).await?;
                info!("Added proxy: {}", added.overview.proxy);
                StewardResponse::AddedProxy {
                    added: added.into(),
                }
            }
            StewardCommand::ListProxies => StewardResponse::ListedProxies {
                proxies: steward.list_proxies().into_iter().map(Into::into).collect(),
            },
            StewardCommand::TestProxy { id } => {
                info!("Testing proxy: {id}");
                StewardResponse::TestedProxy {
                    health: steward.test_proxy(&id).await?.into(),
                }
            }
            StewardCommand::InspectProxyRemoval { id } => StewardResponse::RemovalPreview {
                preview: steward.inspect_proxy_removal(&id)?.into(),
            },
            StewardCommand::ConfirmProxyRemoval { id } => {
                info!("Removing proxy: {id}");
                let report = steward.confirm_proxy_removal(&id).await?;
                info!("Proxy: {id} removed.");
                StewardResponse::ProxyRemoved {
                    report: report.into(),
                }
            }
            StewardCommand::AbortProxyRemoval { id } => {
                steward.abort_proxy_removal(&id)?;
                info!("Removal of proxy: {id} aborted.");
                StewardResponse::Ok
            }
            StewardCommand::DeployApp { request } => {
                info!("Deploying app: {}", request.app_id);
                let instance = steward.deploy_app(request.into()).await?;
                info!("Deployed instance: {}", instance.id);
                StewardResponse::DeployedApp {
                    instance: instance.into(),
                }
            }
            StewardCommand::DeployAppWithProxies { request } => {
                info!(
                    "Deploying app: {} locally and behind {} proxies",
                    request.app_id,
                    request.proxy_ids.len()
                );
                StewardResponse::BatchDeployed {
                    report: steward.deploy_app_with_proxies(request.into()).await?.into(),
                }
            }
            StewardCommand::DeployAppsOnProxy { proxy_id, app_ids } => {
                info!("Deploying {app_ids:?} behind proxy: {proxy_id}");
                StewardResponse::DeployedOnProxy {
                    outcomes: steward
                        .deploy_apps_on_proxy(&proxy_id, &app_ids)
                        .await?
                        .into_iter()
                        .map(Into::into)
                        .collect(),
                }
            }
            StewardCommand::ListInstances { app_id, proxy_id } => {
                StewardResponse::ListedInstances {
                    instances: steward
                        .list_instances(app_id, proxy_id)
                        .into_iter()
                        .map(Into::into)
                        .collect(),
                }
            }
            StewardCommand::RemoveInstance { id } => {
                info!("Removing instance: {id}");
                steward.remove_instance(&id).await?;
                StewardResponse::Ok
            }
            StewardCommand::RemoveApp { app_id } => {
                info!("Removing app: {app_id}");
                StewardResponse::RemovedApp {
                    removed_instances: steward.remove_app(&app_id).await?,
                }
            }
            StewardCommand::ListContainers => StewardResponse::ListedContainers {
                containers: steward
                    .list_containers()
                    .await?
                    .into_iter()
                    .map(Into::into)
                    .collect(),
            },
            StewardCommand::StartContainer { name } => {
                steward.start_container(&name).await?;
                StewardResponse::Ok
            }
            StewardCommand::StopContainer { name } => {
                steward.stop_container(&name).await?;
                StewardResponse::Ok
            }
            StewardCommand::RestartContainer { name } => {
                steward.restart_container(&name).await?;
                StewardResponse::Ok
            }
            StewardCommand::ContainerLogs { name, tail } => StewardResponse::ContainerLogs {
                logs: steward.container_logs(&name, tail).await?,
            },
            StewardCommand::ContainerEnvironment { name } => {
                StewardResponse::ContainerEnvironment {
                    variables: steward.container_env(&name).await?,
                }
            }
            StewardCommand::ListConfiguredApps => StewardResponse::ListedConfiguredApps {
                app_ids: steward.configured_apps().await?,
            },
            StewardCommand::ListManifests => StewardResponse::ListedManifests {
                manifests: steward
                    .list_manifests()
                    .into_iter()
                    .map(super::client_helper::manifest_description)
                    .collect(),
            },
            StewardCommand::Dashboard => StewardResponse::Dashboard {
                summary: steward.dashboard().await?.into(),
            },
            StewardCommand::RefreshStatuses => StewardResponse::RefreshedStatuses {
                changed: steward.refresh_statuses().await?,
            },
        })
    }
}

#[async_trait]
impl Client for ClientHandler {
    async fn handle_connection(
        steward: Arc<dyn Steward + Send + Sync>,
        socket: UnixStream,
        token: Arc<CancellationToken>,
    ) -> Result<(), ClientError> {
        let mut handler = ClientHandler {
            steward,
            communicator: Communicator::new(socket),
            token,
        };
        handler.handle_requests().await
    }
}
