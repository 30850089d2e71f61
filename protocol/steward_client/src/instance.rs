use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd)]
pub enum InstanceStatus {
    Running,
    Stopped,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct InstanceDescription {
    pub id: String,
    pub app_id: String,
    /// `None` for a local instance.
    pub proxy_id: Option<Uuid>,
    pub container_id: String,
    pub container_name: String,
    pub device_name: String,
    pub status: InstanceStatus,
    pub proxy_uri: Option<String>,
    pub sdk_node_id: Option<String>,
    pub ports: Vec<String>,
    pub created_at: DateTime<Utc>,
}
