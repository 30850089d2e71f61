use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utils::file_system::fs_repository::FileRepository;

use super::manifest_catalog::builtin_manifests;

#[derive(Debug, Error, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum ManifestError {
    #[error("App '{0}' has no manifest.")]
    UnknownApp(String),
    #[error("Manifest of app '{app_id}' is invalid: {reason}")]
    InvalidManifest { app_id: String, reason: String },
    #[error("Failed to load manifests: {0}")]
    LoadFail(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub cpus: String,
    pub memory_reservation: String,
    pub memory_limit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoGenerateRule {
    pub length: usize,
    #[serde(default)]
    pub prefix: String,
    pub charset: String,
}

impl AutoGenerateRule {
    /// `prefix` followed by `length` characters drawn from `charset`.
    pub fn generate<R: Rng>(&self, rng: &mut R) -> String {
        let charset: Vec<char> = self.charset.chars().collect();
        let mut value = self.prefix.clone();
        if charset.is_empty() {
            return value;
        }
        value.extend((0..self.length).map(|_| charset[rng.gen_range(0..charset.len())]));
        value
    }
}

/// Static deployment template of one app kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppManifest {
    pub name: String,
    pub dashboard: String,
    pub link: String,
    pub image: String,
    /// Container variables. Values starting with `$` refer to fields.
    pub environment: BTreeMap<String, String>,
    pub required_fields: BTreeSet<String>,
    pub volumes: Vec<String>,
    pub ports: Vec<String>,
    pub command: Option<String>,
    pub resource_limits: Option<ResourceLimits>,
    pub auto_generate: BTreeMap<String, AutoGenerateRule>,
    /// Auto generated field doubling as SDK node id and claim url.
    pub node_id_field: Option<String>,
    /// Host side of the volume holding per-app state.
    pub instance_volume: Option<String>,
}

impl AppManifest {
    pub fn validate(&self, app_id: &str) -> Result<(), ManifestError> {
        let invalid = |reason: String| ManifestError::InvalidManifest {
            app_id: app_id.to_string(),
            reason,
        };
        if self.image.trim().is_empty() {
            return Err(invalid(String::from("Image is empty.")));
        }
        if let Some((field, _)) = self
            .auto_generate
            .iter()
            .find(|(_, rule)| rule.charset.is_empty() || rule.length == 0)
        {
            return Err(invalid(format!(
                "Auto generated field '{field}' needs a length and a charset."
            )));
        }
        if let Some(field) = &self.node_id_field {
            if !self.auto_generate.contains_key(field) {
                return Err(invalid(format!(
                    "Node id field '{field}' isn't auto generated."
                )));
            }
        }
        if let Some(volume) = &self.instance_volume {
            let declared = self
                .volumes
                .iter()
                .any(|template| template.split_once(':').map(|(host, _)| host) == Some(volume.as_str()));
            if !declared {
                return Err(invalid(format!("Instance volume '{volume}' isn't declared.")));
            }
        }
        Ok(())
    }
}

/// Read-only set of manifests keyed by app id.
#[derive(Debug, Clone, Default)]
pub struct ManifestCatalog {
    manifests: BTreeMap<String, AppManifest>,
}

impl ManifestCatalog {
    pub fn new(manifests: BTreeMap<String, AppManifest>) -> Result<Self, ManifestError> {
        for (app_id, manifest) in &manifests {
            manifest.validate(app_id)?;
        }
        Ok(Self { manifests })
    }

    pub fn builtin() -> Self {
        Self {
            manifests: builtin_manifests(),
        }
    }

    /// Merges manifests from a YAML file over the current ones, replacing
    /// entries with the same app id.
    pub async fn with_overrides(mut self, path: &Path) -> Result<Self, ManifestError> {
        let repository = FileRepository::<BTreeMap<String, AppManifest>>::from_file_path(path)
            .await
            .map_err(|err| ManifestError::LoadFail(err.to_string()))?;
        for (app_id, manifest) in repository.get() {
            manifest.validate(app_id)?;
            info!("Loaded manifest override for app: {app_id}");
            self.manifests.insert(app_id.clone(), manifest.clone());
        }
        Ok(self)
    }

    pub fn get(&self, app_id: &str) -> Result<&AppManifest, ManifestError> {
        self.manifests
            .get(app_id)
            .ok_or_else(|| ManifestError::UnknownApp(app_id.to_string()))
    }

    pub fn list(&self) -> impl Iterator<Item = (&String, &AppManifest)> {
        self.manifests.iter()
    }
}
