use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::instance::FieldMap;

#[derive(Debug, Error, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum CredentialStoreError {
    #[error("No credentials stored for app: '{0}'.")]
    NotFound(String),
    #[error("Failed to persist credentials: {0}")]
    PersistFail(String),
}

/// Fields a user supplied for an app, reused for later deployments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppCredentials {
    pub app_id: String,
    pub device_name: String,
    pub fields: FieldMap,
}

#[async_trait]
pub trait CredentialStore {
    async fn save(&self, credentials: AppCredentials) -> Result<(), CredentialStoreError>;
    async fn load(&self, app_id: &str) -> Result<AppCredentials, CredentialStoreError>;
    async fn delete(&self, app_id: &str) -> Result<(), CredentialStoreError>;
    async fn list_configured_app_ids(&self) -> Result<Vec<String>, CredentialStoreError>;
}
