use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::instance::InstanceDescription;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct InstanceTraffic {
    pub instance_id: String,
    pub container_name: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct DashboardSummary {
    pub proxies_total: usize,
    pub proxies_healthy: usize,
    pub proxies_unhealthy: usize,
    pub proxies_unknown: usize,
    pub instances_total: usize,
    pub instances_running: usize,
    pub instances_stopped: usize,
    pub containers_total: usize,
    pub traffic: Vec<InstanceTraffic>,
    /// Newest first.
    pub recent_instances: Vec<InstanceDescription>,
    /// Newest first.
    pub recent_activity: Vec<ActivityEntry>,
}
