use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};

#[derive(Debug, Error)]
pub enum FileRepositoryError {
    #[error("Failed to create file at {path}: {source}")]
    CreationFail {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to save file: {0}")]
    SaveFail(String),
    #[error("Failed to read file: {0}")]
    ReadFail(String),
}

/// YAML file holding a single serializable value. Writes go through a sibling
/// temporary file that is renamed over the target.
pub struct FileRepository<Struct: Serialize + DeserializeOwned> {
    data: Struct,
    path: PathBuf,
}

impl<Struct: Serialize + DeserializeOwned> FileRepository<Struct> {
    pub async fn new(data: Struct, path: &Path) -> Result<Self, FileRepositoryError> {
        let mut repository = Self {
            data,
            path: path.to_path_buf(),
        };
        repository.save().await?;
        Ok(repository)
    }

    pub async fn from_file_path(path: &Path) -> Result<Self, FileRepositoryError> {
        let data = Self::read_file(path).await?;
        Ok(Self {
            data,
            path: path.to_path_buf(),
        })
    }

    /// Loads the file if it exists, otherwise creates it holding `default`.
    pub async fn open_or_create(path: &Path, default: Struct) -> Result<Self, FileRepositoryError> {
        if fs::try_exists(path)
            .await
            .map_err(|err| FileRepositoryError::ReadFail(err.to_string()))?
        {
            Self::from_file_path(path).await
        } else {
            Self::new(default, path).await
        }
    }

    pub async fn save(&mut self) -> Result<(), FileRepositoryError> {
        let yaml_data = serde_yaml::to_string(&self.data)
            .map_err(|err| FileRepositoryError::SaveFail(err.to_string()))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| FileRepositoryError::CreationFail {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let temporary_path = self.temporary_path();
        let mut file = fs::File::create(&temporary_path).await.map_err(|source| {
            FileRepositoryError::CreationFail {
                path: temporary_path.clone(),
                source,
            }
        })?;
        file.write_all(yaml_data.as_bytes())
            .await
            .map_err(|err| FileRepositoryError::SaveFail(err.to_string()))?;
        file.sync_all()
            .await
            .map_err(|err| FileRepositoryError::SaveFail(err.to_string()))?;
        fs::rename(&temporary_path, &self.path)
            .await
            .map_err(|err| FileRepositoryError::SaveFail(err.to_string()))
    }

    pub fn get_mut(&mut self) -> &mut Struct {
        &mut self.data
    }

    pub fn get(&self) -> &Struct {
        &self.data
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temporary_path(&self) -> PathBuf {
        let mut file_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        file_name.push(".tmp");
        self.path.with_file_name(file_name)
    }

    async fn read_file(path: &Path) -> Result<Struct, FileRepositoryError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|err| FileRepositoryError::ReadFail(err.to_string()))?;
        serde_yaml::from_str(&content).map_err(|err| FileRepositoryError::ReadFail(err.to_string()))
    }
}
