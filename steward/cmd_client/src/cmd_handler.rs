use std::collections::BTreeMap;
use std::str::FromStr;

use client_lib::StewardConnection;
use log::info;
use steward_client::{
    deployment::{BatchDeployRequest, DeployRequest},
    proxy::AutoDeploy,
};
use uuid::Uuid;

use crate::commands::Command;

pub struct CommandHanlder {
    connection: StewardConnection,
}

impl CommandHanlder {
    pub fn new(connection: StewardConnection) -> Self {
        Self { connection }
    }

    pub async fn handle_command(&mut self, command: Command) -> Result<(), anyhow::Error> {
        match command {
            Command::AddProxy {
                uri,
                configured,
                apps,
            } => {
                let added = self
                    .connection
                    .add_proxy(uri, auto_deploy(configured, apps))
                    .await?;
                info!("Added proxy: {added:#?}");
                Ok(())
            }
            Command::ListProxies => {
                let proxies = self.connection.list_proxies().await?;
                info!("Proxies: {proxies:#?}");
                Ok(())
            }
            Command::TestProxy { id } => {
                let health = self.connection.test_proxy(Uuid::from_str(&id)?).await?;
                info!("Proxy health: {health:#?}");
                Ok(())
            }
            Command::InspectRemoval { id } => {
                let preview = self
                    .connection
                    .inspect_proxy_removal(Uuid::from_str(&id)?)
                    .await?;
                info!("Removal preview: {preview:#?}");
                Ok(())
            }
            Command::ConfirmRemoval { id } => {
                let report = self
                    .connection
                    .confirm_proxy_removal(Uuid::from_str(&id)?)
                    .await?;
                info!("Teardown report: {report:#?}");
                Ok(())
            }
            Command::AbortRemoval { id } => Ok(self
                .connection
                .abort_proxy_removal(Uuid::from_str(&id)?)
                .await?),
            Command::Deploy {
                app_id,
                device_name,
                fields,
                proxy_id,
            } => {
                let request = DeployRequest {
                    app_id,
                    device_name,
                    fields: BTreeMap::from_iter(fields),
                    proxy_id: proxy_id.as_deref().map(Uuid::from_str).transpose()?,
                };
                let instance = self.connection.deploy_app(request).await?;
                info!("Deployed instance: {instance:#?}");
                Ok(())
            }
            Command::DeployBatch {
                app_id,
                device_name,
                fields,
                proxy_ids,
            } => {
                let request = BatchDeployRequest {
                    app_id,
                    device_name,
                    fields: BTreeMap::from_iter(fields),
                    proxy_ids: proxy_ids
                        .iter()
                        .map(|id| Uuid::from_str(id))
                        .collect::<Result<_, _>>()?,
                };
                let report = self.connection.deploy_app_with_proxies(request).await?;
                info!("Batch deployment report: {report:#?}");
                Ok(())
            }
            Command::DeployOnProxy { proxy_id, apps } => {
                let outcomes = self
                    .connection
                    .deploy_apps_on_proxy(Uuid::from_str(&proxy_id)?, apps)
                    .await?;
                info!("Deployments: {outcomes:#?}");
                Ok(())
            }
            Command::ListInstances { app_id, proxy_id } => {
                let instances = self
                    .connection
                    .list_instances(app_id, proxy_id.as_deref().map(Uuid::from_str).transpose()?)
                    .await?;
                info!("Instances: {instances:#?}");
                Ok(())
            }
            Command::RemoveInstance { id } => Ok(self.connection.remove_instance(id).await?),
            Command::RemoveApp { app_id } => {
                let removed = self.connection.remove_app(app_id).await?;
                info!("Removed instances: {removed:?}");
                Ok(())
            }
            Command::ListContainers => {
                let containers = self.connection.list_containers().await?;
                info!("Containers: {containers:#?}");
                Ok(())
            }
            Command::StartContainer { name } => Ok(self.connection.start_container(name).await?),
            Command::StopContainer { name } => Ok(self.connection.stop_container(name).await?),
            Command::RestartContainer { name } => {
                Ok(self.connection.restart_container(name).await?)
            }
            Command::Logs { name, tail } => {
                let logs = self.connection.container_logs(name, tail).await?;
                info!("Logs:\n{logs}");
                Ok(())
            }
            Command::Env { name } => {
                let variables = self.connection.container_environment(name).await?;
                info!("Environment: {variables:#?}");
                Ok(())
            }
            Command::ListConfiguredApps => {
                let app_ids = self.connection.list_configured_apps().await?;
                info!("Configured apps: {app_ids:?}");
                Ok(())
            }
            Command::ListManifests => {
                let manifests = self.connection.list_manifests().await?;
                info!("Manifests: {manifests:#?}");
                Ok(())
            }
            Command::Dashboard => {
                let summary = self.connection.dashboard().await?;
                info!("Dashboard: {summary:#?}");
                Ok(())
            }
            Command::RefreshStatuses => {
                let changed = self.connection.refresh_statuses().await?;
                info!("Instances with changed status: {changed}");
                Ok(())
            }
        }
    }
}

fn auto_deploy(configured: bool, apps: Vec<String>) -> AutoDeploy {
    match (configured, apps.is_empty()) {
        (true, _) => AutoDeploy::Configured,
        (false, false) => AutoDeploy::Selected(apps),
        (false, true) => AutoDeploy::Nothing,
    }
}

#[cfg(test)]
mod test {
    use steward_client::proxy::AutoDeploy;

    use super::auto_deploy;

    #[test]
    fn auto_deploy_selection() {
        assert_eq!(auto_deploy(false, vec![]), AutoDeploy::Nothing);
        assert_eq!(auto_deploy(true, vec![]), AutoDeploy::Configured);
        assert_eq!(
            auto_deploy(false, vec![String::from("grass")]),
            AutoDeploy::Selected(vec![String::from("grass")])
        );
    }
}
