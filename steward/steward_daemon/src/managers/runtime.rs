use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::manifest::ResourceLimits;
use super::ports::PortMapping;

#[derive(Debug, Error, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum RuntimeError {
    #[error("No such container: '{0}'.")]
    NotFound(String),
    #[error("Container runtime command failed: {0}")]
    CommandFail(String),
    #[error("Container runtime command timed out after {0} ms.")]
    Timeout(u64),
    #[error("Unexpected container runtime output: {0}")]
    InvalidOutput(String),
    #[error("Failed to spawn container runtime: {0}")]
    SpawnFail(String),
}

/// Everything needed to start one detached container. Every container the
/// steward starts is restarted by the runtime until it is removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub name: String,
    pub image: String,
    pub env: Vec<String>,
    pub volumes: Vec<String>,
    pub ports: Vec<PortMapping>,
    /// Value of `--network`, e.g. `container:<name>` or a network name.
    pub network: Option<String>,
    pub command: Vec<String>,
    pub capabilities: Vec<String>,
    pub privileged: bool,
    pub dns: Vec<String>,
    pub resource_limits: Option<ResourceLimits>,
}

impl RunSpec {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            env: vec![],
            volumes: vec![],
            ports: vec![],
            network: None,
            command: vec![],
            capabilities: vec![],
            privileged: false,
            dns: vec![],
            resource_limits: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: String,
    pub state: String,
    pub published_ports: Vec<u16>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkStats {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTail {
    Lines(usize),
    All,
}

#[async_trait]
pub trait ContainerRuntime {
    async fn test_connection(&self) -> Result<(), RuntimeError>;
    async fn pull(&self, image: &str) -> Result<(), RuntimeError>;
    /// Starts a detached container and returns its id.
    async fn run(&self, spec: &RunSpec) -> Result<String, RuntimeError>;
    async fn start(&self, name: &str) -> Result<(), RuntimeError>;
    async fn stop(&self, name: &str) -> Result<(), RuntimeError>;
    async fn restart(&self, name: &str) -> Result<(), RuntimeError>;
    /// Force removes the container.
    async fn remove(&self, name: &str) -> Result<(), RuntimeError>;
    async fn list(&self) -> Result<Vec<ContainerInfo>, RuntimeError>;
    async fn logs(&self, name: &str, tail: LogTail) -> Result<String, RuntimeError>;
    async fn inspect_env(&self, name: &str) -> Result<BTreeMap<String, String>, RuntimeError>;
    async fn network_create(&self, name: &str) -> Result<(), RuntimeError>;
    async fn network_remove(&self, name: &str) -> Result<(), RuntimeError>;
    /// Network counters of running containers keyed by container name.
    async fn network_stats(
        &self,
        names: &[String],
    ) -> Result<BTreeMap<String, NetworkStats>, RuntimeError>;
    async fn start_time(&self, name: &str) -> Result<Option<DateTime<Utc>>, RuntimeError>;
}
