use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::ports::PortMapping;

pub type FieldMap = BTreeMap<String, String>;

#[derive(Debug, Error, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum InstanceError {
    #[error("Instance with id: '{0}' already exists.")]
    DuplicateId(String),
    #[error("Instance with id: '{0}' doesn't exist.")]
    NotFound(String),
    #[error("App '{0}' already has a local instance.")]
    LocalInstanceExists(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    Running,
    Stopped,
    Unknown,
}

impl InstanceStatus {
    pub fn from_container_state(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "running" | "restarting" => Self::Running,
            "created" | "exited" | "paused" | "dead" | "removing" => Self::Stopped,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppInstance {
    pub id: String,
    pub app_id: String,
    /// `None` marks a local instance.
    pub proxy_id: Option<Uuid>,
    pub container_id: String,
    pub container_name: String,
    pub device_name: String,
    pub fields: FieldMap,
    pub status: InstanceStatus,
    pub proxy_uri: Option<String>,
    pub sdk_node_id: Option<String>,
    pub ports: Vec<PortMapping>,
    pub created_at: DateTime<Utc>,
}

impl AppInstance {
    pub fn is_local(&self) -> bool {
        self.proxy_id.is_none()
    }

    pub fn host_ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.ports.iter().filter_map(PortMapping::host_port)
    }
}
