use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::instance::AppInstance;
use super::proxy::{Proxy, ProxyError, ProxyOverview};

/// A removal request is answered synchronously by `inspect`, so a session
/// starts in `Inspecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Serialize, Deserialize)]
pub enum TeardownState {
    Inspecting,
    Confirmed,
    Removing,
    Removed,
    Aborted,
}

impl TeardownState {
    pub fn is_abortable(&self) -> bool {
        matches!(
            self,
            TeardownState::Inspecting | TeardownState::Aborted
        )
    }
}

#[derive(Debug, Error, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum TeardownError {
    #[error(transparent)]
    Proxy(#[from] ProxyError),
    #[error("Removal of proxy '{proxy_id}' can't be aborted in state {state:?}.")]
    NotAbortable { proxy_id: Uuid, state: TeardownState },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemovalPreview {
    pub overview: ProxyOverview,
    pub dependents: Vec<AppInstance>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeardownReport {
    pub proxy: Proxy,
    pub removed_instances: Vec<String>,
    pub failures: Vec<String>,
    pub tunnel_removed: bool,
}
