use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
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

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, PartialOrd)]
pub enum StewardCommand {
    AddProxy {
        uri: String,
        auto_deploy: AutoDeploy,
    },
    ListProxies,
    TestProxy {
        id: Uuid,
    },
    InspectProxyRemoval {
        id: Uuid,
    },
    ConfirmProxyRemoval {
        id: Uuid,
    },
    AbortProxyRemoval {
        id: Uuid,
    },
    DeployApp {
        request: DeployRequest,
    },
    DeployAppWithProxies {
        request: BatchDeployRequest,
    },
    DeployAppsOnProxy {
        proxy_id: Uuid,
        app_ids: Vec<String>,
    },
    ListInstances {
        app_id: Option<String>,
        proxy_id: Option<Uuid>,
    },
    RemoveInstance {
        id: String,
    },
    RemoveApp {
        app_id: String,
    },
    ListContainers,
    StartContainer {
        name: String,
    },
    StopContainer {
        name: String,
    },
    RestartContainer {
        name: String,
    },
    ContainerLogs {
        name: String,
        tail: Option<usize>,
    },
    ContainerEnvironment {
        name: String,
    },
    ListConfiguredApps,
    ListManifests,
    Dashboard,
    RefreshStatuses,
}

#[derive(Debug, Error, Clone, Serialize, Deserialize, PartialEq, PartialOrd)]
pub enum StewardDaemonError {
    #[error("Failed to read request.")]
    ReadingRequestFail,
    #[error("Can't recognise a command.")]
    UnknownCommand,
    #[error("Error occured: {message}")]
    StewardDaemonFail { message: String },
    #[error("Failed to send response.")]
    SendingResponseFail,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, PartialOrd)]
pub enum StewardResponse {
    Ok,
    AddedProxy {
        added: AddedProxy,
    },
    ListedProxies {
        proxies: Vec<ProxyDescription>,
    },
    TestedProxy {
        health: ProxyHealthDescription,
    },
    RemovalPreview {
        preview: ProxyRemovalPreview,
    },
    ProxyRemoved {
        report: TeardownReportDescription,
    },
    DeployedApp {
        instance: InstanceDescription,
    },
    BatchDeployed {
        report: BatchDeploymentReport,
    },
    DeployedOnProxy {
        outcomes: Vec<AppDeploymentOutcome>,
    },
    ListedInstances {
        instances: Vec<InstanceDescription>,
    },
    RemovedApp {
        removed_instances: Vec<String>,
    },
    ListedContainers {
        containers: Vec<ContainerDescription>,
    },
    ContainerLogs {
        logs: String,
    },
    ContainerEnvironment {
        variables: BTreeMap<String, String>,
    },
    ListedConfiguredApps {
        app_ids: Vec<String>,
    },
    ListedManifests {
        manifests: Vec<ManifestDescription>,
    },
    Dashboard {
        summary: DashboardSummary,
    },
    RefreshedStatuses {
        changed: usize,
    },
    Error {
        steward_error: StewardDaemonError,
    },
}

#[cfg(test)]
mod test {
    use super::{StewardCommand, StewardDaemonError, StewardResponse};
    use crate::proxy::AutoDeploy;

    #[test]
    fn command_wire_shape() {
        let command = StewardCommand::AddProxy {
            uri: String::from("socks5://1.2.3.4:1080"),
            auto_deploy: AutoDeploy::Selected(vec![String::from("earnapp")]),
        };
        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "AddProxy": {
                    "uri": "socks5://1.2.3.4:1080",
                    "auto_deploy": { "Selected": ["earnapp"] }
                }
            })
        );
    }

    #[test]
    fn error_response_wire_shape() {
        let response = StewardResponse::Error {
            steward_error: StewardDaemonError::StewardDaemonFail {
                message: String::from("boom"),
            },
        };
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(
            json,
            r#"{"Error":{"steward_error":{"StewardDaemonFail":{"message":"boom"}}}}"#
        );
    }
}
