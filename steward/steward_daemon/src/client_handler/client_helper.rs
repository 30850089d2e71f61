use steward_client::{
    container::ContainerDescription,
    dashboard::{ActivityEntry, DashboardSummary},
    deployment::{
        AppDeploymentOutcome, BatchDeployRequest, BatchDeploymentReport, DeployRequest,
        DeploymentStatus, ProxyDeploymentOutcome,
    },
    instance::InstanceDescription,
    manifest::ManifestDescription,
    proxy::{
        AddedProxy, ProxyDescription, ProxyHealthDescription, ProxyRemovalPreview,
        TeardownReportDescription,
    },
};

use crate::managers::{
    deployment::{
        AppDeployment, BatchDeploymentRequest, BatchDeploymentResult, DeploymentOutcome,
        DeploymentRequest,
    },
    instance::{AppInstance, InstanceStatus},
    manifest::AppManifest,
    proxy::{HealthStatus, ProxyHealth, ProxyOverview},
    runtime::ContainerInfo,
    steward::{Activity, AutoDeploy, Dashboard, InstanceTraffic, ProxyAddition},
    teardown::{RemovalPreview, TeardownReport},
};

impl From<DeployRequest> for DeploymentRequest {
    fn from(request: DeployRequest) -> Self {
        Self {
            app_id: request.app_id,
            device_name: request.device_name,
            fields: request.fields,
            proxy_id: request.proxy_id,
        }
    }
}

impl From<BatchDeployRequest> for BatchDeploymentRequest {
    fn from(request: BatchDeployRequest) -> Self {
        Self {
            app_id: request.app_id,
            device_name: request.device_name,
            fields: request.fields,
            proxy_ids: request.proxy_ids,
        }
    }
}

impl From<steward_client::proxy::AutoDeploy> for AutoDeploy {
    fn from(auto_deploy: steward_client::proxy::AutoDeploy) -> Self {
        type CAutoDeploy = steward_client::proxy::AutoDeploy;
        match auto_deploy {
            CAutoDeploy::Nothing => Self::Nothing,
            CAutoDeploy::Configured => Self::Configured,
            CAutoDeploy::Selected(app_ids) => Self::Selected(app_ids),
        }
    }
}

impl From<HealthStatus> for steward_client::proxy::HealthStatus {
    fn from(status: HealthStatus) -> Self {
        match status {
            HealthStatus::Healthy => Self::Healthy,
            HealthStatus::Unhealthy => Self::Unhealthy,
            HealthStatus::Unknown => Self::Unknown,
        }
    }
}

impl From<ProxyHealth> for ProxyHealthDescription {
    fn from(health: ProxyHealth) -> Self {
        Self {
            status: health.status.into(),
            checked_at: health.checked_at,
            latency_ms: health
                .latency
                .map(|latency| u64::try_from(latency.as_millis()).unwrap_or(u64::MAX)),
            last_error: health.last_error,
        }
    }
}

impl From<ProxyOverview> for ProxyDescription {
    fn from(overview: ProxyOverview) -> Self {
        let proxy = overview.proxy;
        Self {
            id: proxy.id,
            display_uri: proxy.display_uri(),
            username: proxy.username().map(str::to_string),
            protocol: proxy.protocol,
            host: proxy.host,
            port: proxy.port,
            health: overview.health.into(),
            instances_count: overview.instances_count,
        }
    }
}

impl From<InstanceStatus> for steward_client::instance::InstanceStatus {
    fn from(status: InstanceStatus) -> Self {
        match status {
            InstanceStatus::Running => Self::Running,
            InstanceStatus::Stopped => Self::Stopped,
            InstanceStatus::Unknown => Self::Unknown,
        }
    }
}

/// Fields may hold secrets and stay in the daemon.
impl From<AppInstance> for InstanceDescription {
    fn from(instance: AppInstance) -> Self {
        Self {
            id: instance.id,
            app_id: instance.app_id,
            proxy_id: instance.proxy_id,
            container_id: instance.container_id,
            container_name: instance.container_name,
            device_name: instance.device_name,
            status: instance.status.into(),
            proxy_uri: instance.proxy_uri,
            sdk_node_id: instance.sdk_node_id,
            ports: instance.ports.iter().map(ToString::to_string).collect(),
            created_at: instance.created_at,
        }
    }
}

impl From<DeploymentOutcome> for DeploymentStatus {
    fn from(outcome: DeploymentOutcome) -> Self {
        match outcome {
            DeploymentOutcome::Deployed(instance) => Self::Deployed {
                instance: instance.into(),
            },
            DeploymentOutcome::PortsNotPublished { instance, ports } => Self::PortsNotPublished {
                instance: instance.into(),
                ports: ports.iter().map(ToString::to_string).collect(),
            },
            DeploymentOutcome::Skipped(reason) => Self::Skipped { reason },
            DeploymentOutcome::Failed(error) => Self::Failed {
                error: error.to_string(),
            },
        }
    }
}

impl From<AppDeployment> for AppDeploymentOutcome {
    fn from(deployment: AppDeployment) -> Self {
        Self {
            app_id: deployment.app_id,
            status: deployment.outcome.into(),
        }
    }
}

impl From<BatchDeploymentResult> for BatchDeploymentReport {
    fn from(result: BatchDeploymentResult) -> Self {
        Self {
            local: result.local.into(),
            proxies: result
                .proxies
                .into_iter()
                .map(|(proxy_id, outcome)| ProxyDeploymentOutcome {
                    proxy_id,
                    status: outcome.into(),
                })
                .collect(),
        }
    }
}

impl From<ProxyAddition> for AddedProxy {
    fn from(addition: ProxyAddition) -> Self {
        Self {
            proxy: addition.overview.into(),
            deployments: addition.deployments.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<RemovalPreview> for ProxyRemovalPreview {
    fn from(preview: RemovalPreview) -> Self {
        Self {
            proxy: preview.overview.into(),
            dependent_instances: preview.dependents.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<TeardownReport> for TeardownReportDescription {
    fn from(report: TeardownReport) -> Self {
        Self {
            proxy_id: report.proxy.id,
            removed_instances: report.removed_instances,
            failures: report.failures,
            tunnel_removed: report.tunnel_removed,
        }
    }
}

impl From<ContainerInfo> for ContainerDescription {
    fn from(container: ContainerInfo) -> Self {
        Self {
            id: container.id,
            name: container.name,
            image: container.image,
            status: container.status,
            state: container.state,
            published_ports: container.published_ports,
        }
    }
}

pub(crate) fn manifest_description((app_id, manifest): (String, AppManifest)) -> ManifestDescription {
    ManifestDescription {
        app_id,
        name: manifest.name,
        image: manifest.image,
        dashboard: manifest.dashboard,
        link: manifest.link,
        required_fields: manifest.required_fields.into_iter().collect(),
        ports: manifest.ports,
    }
}

impl From<Activity> for ActivityEntry {
    fn from(activity: Activity) -> Self {
        Self {
            timestamp: activity.timestamp,
            message: activity.message,
        }
    }
}

impl From<InstanceTraffic> for steward_client::dashboard::InstanceTraffic {
    fn from(traffic: InstanceTraffic) -> Self {
        Self {
            instance_id: traffic.instance_id,
            container_name: traffic.container_name,
            rx_bytes: traffic.stats.rx_bytes,
            tx_bytes: traffic.stats.tx_bytes,
            started_at: traffic.started_at,
        }
    }
}

impl From<Dashboard> for DashboardSummary {
    fn from(dashboard: Dashboard) -> Self {
        Self {
            proxies_total: dashboard.proxies_total,
            proxies_healthy: dashboard.proxies_healthy,
            proxies_unhealthy: dashboard.proxies_unhealthy,
            proxies_unknown: dashboard.proxies_unknown,
            instances_total: dashboard.instances_total,
            instances_running: dashboard.instances_running,
            instances_stopped: dashboard.instances_stopped,
            containers_total: dashboard.containers_total,
            traffic: dashboard.traffic.into_iter().map(Into::into).collect(),
            recent_instances: dashboard.recent_instances.into_iter().map(Into::into).collect(),
            recent_activity: dashboard.recent_activity.into_iter().map(Into::into).collect(),
        }
    }
}
