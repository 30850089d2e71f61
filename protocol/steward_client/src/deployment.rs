use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::instance::InstanceDescription;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct DeployRequest {
    pub app_id: String,
    pub device_name: String,
    pub fields: BTreeMap<String, String>,
    pub proxy_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct BatchDeployRequest {
    pub app_id: String,
    pub device_name: String,
    /// `HOSTPORT` requests a host port for every proxied instance.
    pub fields: BTreeMap<String, String>,
    pub proxy_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, PartialOrd)]
pub enum DeploymentStatus {
    Deployed { instance: InstanceDescription },
    /// `ports` were assigned but the reused tunnel doesn't publish them.
    PortsNotPublished {
        instance: InstanceDescription,
        ports: Vec<String>,
    },
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct ProxyDeploymentOutcome {
    pub proxy_id: Uuid,
    pub status: DeploymentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct BatchDeploymentReport {
    pub local: DeploymentStatus,
    pub proxies: Vec<ProxyDeploymentOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct AppDeploymentOutcome {
    pub app_id: String,
    pub status: DeploymentStatus,
}
