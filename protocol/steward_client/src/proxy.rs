use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{deployment::AppDeploymentOutcome, instance::InstanceDescription};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct ProxyHealthDescription {
    pub status: HealthStatus,
    pub checked_at: Option<DateTime<Utc>>,
    pub latency_ms: Option<u64>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct ProxyDescription {
    pub id: Uuid,
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    /// Proxy uri with the password masked.
    pub display_uri: String,
    pub health: ProxyHealthDescription,
    pub instances_count: usize,
}

/// Which apps get deployed behind a freshly added proxy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, PartialOrd)]
pub enum AutoDeploy {
    #[default]
    Nothing,
    Configured,
    Selected(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct AddedProxy {
    pub proxy: ProxyDescription,
    pub deployments: Vec<AppDeploymentOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct ProxyRemovalPreview {
    pub proxy: ProxyDescription,
    pub dependent_instances: Vec<InstanceDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct TeardownReportDescription {
    pub proxy_id: Uuid,
    pub removed_instances: Vec<String>,
    pub failures: Vec<String>,
    pub tunnel_removed: bool,
}
