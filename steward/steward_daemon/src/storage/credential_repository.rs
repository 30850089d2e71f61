use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use tokio::sync::Mutex;
use utils::file_system::fs_repository::{FileRepository, FileRepositoryError};

use crate::managers::credentials::{AppCredentials, CredentialStore, CredentialStoreError};

pub const CREDENTIALS_FILE_NAME: &str = "credentials.yaml";

type Credentials = BTreeMap<String, AppCredentials>;

/// Credentials of every configured app kept in one YAML file inside the workdir.
pub struct CredentialRepository {
    repository: Mutex<FileRepository<Credentials>>,
}

impl CredentialRepository {
    pub async fn open(workdir: &Path) -> Result<Self, FileRepositoryError> {
        let path = Self::path(workdir);
        debug!("Opening credentials at {path:?}");
        Ok(Self {
            repository: Mutex::new(FileRepository::open_or_create(&path, Credentials::new()).await?),
        })
    }

    pub fn path(workdir: &Path) -> PathBuf {
        workdir.join(CREDENTIALS_FILE_NAME)
    }
}

fn persist_fail(err: FileRepositoryError) -> CredentialStoreError {
    CredentialStoreError::PersistFail(err.to_string())
}

#[async_trait]
impl CredentialStore for CredentialRepository {
    async fn save(&self, credentials: AppCredentials) -> Result<(), CredentialStoreError> {
        let mut repository = self.repository.lock().await;
        let previous = repository
            .get_mut()
            .insert(credentials.app_id.clone(), credentials.clone());
        if let Err(err) = repository.save().await {
            // Memory must keep matching the file.
            match previous {
                Some(previous) => repository.get_mut().insert(credentials.app_id, previous),
                None => repository.get_mut().remove(&credentials.app_id),
            };
            return Err(persist_fail(err));
        }
        Ok(())
    }

    async fn load(&self, app_id: &str) -> Result<AppCredentials, CredentialStoreError> {
        self.repository
            .lock()
            .await
            .get()
            .get(app_id)
            .cloned()
            .ok_or_else(|| CredentialStoreError::NotFound(app_id.to_string()))
    }

    async fn delete(&self, app_id: &str) -> Result<(), CredentialStoreError> {
        let mut repository = self.repository.lock().await;
        let removed = repository
            .get_mut()
            .remove(app_id)
            .ok_or_else(|| CredentialStoreError::NotFound(app_id.to_string()))?;
        if let Err(err) = repository.save().await {
            repository.get_mut().insert(app_id.to_string(), removed);
            return Err(persist_fail(err));
        }
        Ok(())
    }

    async fn list_configured_app_ids(&self) -> Result<Vec<String>, CredentialStoreError> {
        Ok(self.repository.lock().await.get().keys().cloned().collect())
    }
}
