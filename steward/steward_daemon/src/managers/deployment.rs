use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::credentials::CredentialStoreError;
use super::environment::{self, Environment, CLAIM_URL_FIELD};
use super::instance::{AppInstance, FieldMap, InstanceError, InstanceStatus};
use super::manifest::{AppManifest, ManifestError};
use super::naming::{self, ProxyHash};
use super::ports::{self, PortMapping};
use super::proxy::{Proxy, ProxyError};
use super::runtime::RuntimeError;

const DATA_DIR_PREFIX: &str = ".data/";

#[derive(Debug, Error, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum DeploymentError {
    #[error(transparent)]
    Instance(#[from] InstanceError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Proxy(#[from] ProxyError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Credentials(#[from] CredentialStoreError),
    #[error("Missing required field: {0}")]
    MissingField(String),
    #[error("Invalid device name: '{0}'.")]
    InvalidDeviceName(String),
    #[error("App '{app_id}' is already deployed behind proxy '{proxy_id}'.")]
    ProxyInstanceExists { app_id: String, proxy_id: Uuid },
    #[error("Instance '{instance_id}' is running but its credentials weren't saved: {reason}")]
    CredentialsNotSaved { instance_id: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRequest {
    pub app_id: String,
    pub device_name: String,
    pub fields: FieldMap,
    pub proxy_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchDeploymentRequest {
    pub app_id: String,
    pub device_name: String,
    pub fields: FieldMap,
    pub proxy_ids: Vec<Uuid>,
}

impl BatchDeploymentRequest {
    pub fn single(&self, proxy_id: Option<Uuid>) -> DeploymentRequest {
        DeploymentRequest {
            app_id: self.app_id.clone(),
            device_name: self.device_name.clone(),
            fields: self.fields.clone(),
            proxy_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeploymentOutcome {
    Deployed(AppInstance),
    /// Running behind a tunnel that was created earlier with other host
    /// ports, so `ports` aren't reachable from the host.
    PortsNotPublished {
        instance: AppInstance,
        ports: Vec<PortMapping>,
    },
    Skipped(String),
    Failed(DeploymentError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchDeploymentResult {
    pub local: DeploymentOutcome,
    pub proxies: Vec<(Uuid, DeploymentOutcome)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppDeployment {
    pub app_id: String,
    pub outcome: DeploymentOutcome,
}

/// Resolved description of one container to launch, computed before any
/// runtime call is made.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentPlan {
    pub app_id: String,
    pub device_name: String,
    pub proxy: Option<Proxy>,
    pub hash: Option<ProxyHash>,
    pub instance_id: String,
    pub container_name: String,
    pub environment: Environment,
    /// User fields merged with generated values and the claim url.
    pub fields: FieldMap,
    pub ports: Vec<PortMapping>,
    pub volumes: Vec<String>,
    pub command: Vec<String>,
    pub sdk_node_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DeploymentPlan {
    pub fn build<R: Rng>(
        manifest: &AppManifest,
        request: &DeploymentRequest,
        proxy: Option<&Proxy>,
        data_root: &Path,
        explicit_ports: Option<Vec<PortMapping>>,
        rng: &mut R,
    ) -> Result<Self, DeploymentError> {
        if !naming::is_valid_device_name(&request.device_name) {
            return Err(DeploymentError::InvalidDeviceName(
                request.device_name.clone(),
            ));
        }
        let missing = environment::missing_fields(manifest, &request.fields);
        if !missing.is_empty() {
            return Err(DeploymentError::MissingField(missing.join(", ")));
        }

        let hash = proxy.map(Proxy::hash);
        let created_at = Utc::now();
        let container_name =
            naming::app_container_name(&request.device_name, &request.app_id, hash.as_ref());
        let instance_id = naming::instance_id(
            &request.app_id,
            &request.device_name,
            hash.as_ref(),
            &created_at,
        );

        let assembled =
            environment::assemble(manifest, &request.device_name, &request.fields, rng);
        let sdk_node_id = manifest
            .node_id_field
            .as_ref()
            .and_then(|field| assembled.generated.get(field))
            .cloned();
        let mut fields = request.fields.clone();
        fields.extend(assembled.generated.clone());
        if let Some(node_id) = &sdk_node_id {
            fields.insert(CLAIM_URL_FIELD.to_string(), node_id.clone());
        }

        let ports = match explicit_ports {
            Some(ports) => ports,
            None => {
                let resolved = ports::resolve_templates(&manifest.ports, &request.fields);
                match &hash {
                    Some(hash) => ports::apply_offset(&resolved, hash.port_offset()),
                    None => resolved,
                }
            }
        };
        let volumes = manifest
            .volumes
            .iter()
            .map(|template| {
                resolve_volume(
                    template,
                    manifest,
                    data_root,
                    hash.map(|_| (container_name.as_str(), request.app_id.as_str())),
                )
            })
            .collect();
        let command = manifest
            .command
            .as_deref()
            .map(|template| environment::render_command(template, &assembled.values))
            .unwrap_or_default();

        Ok(Self {
            app_id: request.app_id.clone(),
            device_name: request.device_name.clone(),
            proxy: proxy.cloned(),
            hash,
            instance_id,
            container_name,
            environment: assembled.environment,
            fields,
            ports,
            volumes,
            command,
            sdk_node_id,
            created_at,
        })
    }

    pub fn proxy_id(&self) -> Option<Uuid> {
        self.proxy.as_ref().map(|proxy| proxy.id)
    }

    pub fn into_instance(self, container_id: String) -> AppInstance {
        AppInstance {
            id: self.instance_id,
            app_id: self.app_id,
            proxy_id: self.proxy.as_ref().map(|proxy| proxy.id),
            container_id,
            container_name: self.container_name,
            device_name: self.device_name,
            fields: self.fields,
            status: InstanceStatus::Running,
            proxy_uri: self.proxy.as_ref().map(Proxy::display_uri),
            sdk_node_id: self.sdk_node_id,
            ports: self.ports,
            created_at: self.created_at,
        }
    }
}

/// Data directory of a container, shared with backups on removal.
pub fn instance_data_dir(data_root: &Path, container_name: &str, app_id: &str) -> PathBuf {
    data_root.join(format!("{container_name}_{app_id}"))
}

/// Resolves `.data/` host paths against `data_root`. Behind a proxy the
/// manifest's instance volume gets a directory of its own per container.
fn resolve_volume(
    template: &str,
    manifest: &AppManifest,
    data_root: &Path,
    proxied: Option<(&str, &str)>,
) -> String {
    let Some((host, container)) = template.split_once(':') else {
        return template.to_string();
    };
    let host_path = match proxied {
        Some((container_name, app_id)) if manifest.instance_volume.as_deref() == Some(host) => {
            instance_data_dir(data_root, container_name, app_id)
        }
        _ => match host.strip_prefix(DATA_DIR_PREFIX) {
            Some(relative) => data_root.join(relative),
            None => PathBuf::from(host),
        },
    };
    format!("{}:{}", host_path.display(), container)
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::managers::manifest::AutoGenerateRule;
    use crate::utils::test_utilities::{create_example_manifest, create_example_proxy_uri};

    fn request(fields: &[(&str, &str)]) -> DeploymentRequest {
        DeploymentRequest {
            app_id: String::from("test"),
            device_name: String::from("box"),
            fields: fields
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            proxy_id: None,
        }
    }

    fn build(
        manifest: &AppManifest,
        request: &DeploymentRequest,
        proxy: Option<&Proxy>,
    ) -> Result<DeploymentPlan, DeploymentError> {
        DeploymentPlan::build(
            manifest,
            request,
            proxy,
            Path::new("/srv/steward"),
            None,
            &mut StdRng::seed_from_u64(2),
        )
    }

    #[test]
    fn local_plan() {
        let plan = build(&create_example_manifest(), &request(&[]), None).unwrap();
        assert_eq!(plan.container_name, "box_test_local");
        assert!(plan.instance_id.starts_with("test_box_local_"));
        assert_eq!(plan.ports, vec![PortMapping::new("8080", "80")]);
        assert_eq!(plan.volumes, vec!["/srv/steward/.test:/data"]);
        assert_eq!(plan.hash, None);
    }

    #[test]
    fn proxied_plan_offsets_ports_and_namespaces_volume() {
        let proxy = Proxy::parse(create_example_proxy_uri()).unwrap();
        let hash = proxy.hash();
        let plan = build(&create_example_manifest(), &request(&[]), Some(&proxy)).unwrap();

        let container_name = format!("box_test_proxy{hash}");
        assert_eq!(plan.container_name, container_name);
        assert_eq!(
            plan.ports,
            vec![PortMapping::new((8080 + hash.port_offset()).to_string(), "80")]
        );
        assert_eq!(
            plan.volumes,
            vec![format!("/srv/steward/{container_name}_test:/data")]
        );
        let instance = plan.into_instance(String::from("cid"));
        assert_eq!(instance.proxy_id, Some(proxy.id));
        assert_eq!(instance.proxy_uri, Some(proxy.display_uri()));
    }

    #[test]
    fn explicit_ports_are_used_verbatim() {
        let proxy = Proxy::parse(create_example_proxy_uri()).unwrap();
        let plan = DeploymentPlan::build(
            &create_example_manifest(),
            &request(&[]),
            Some(&proxy),
            Path::new("/srv/steward"),
            Some(vec![PortMapping::new("23456", "80")]),
            &mut StdRng::seed_from_u64(2),
        )
        .unwrap();
        assert_eq!(plan.ports, vec![PortMapping::new("23456", "80")]);
    }

    #[test]
    fn node_id_becomes_claim_url_and_sdk_node_id() {
        let mut manifest = create_example_manifest();
        manifest.auto_generate.insert(
            String::from("NODE_UUID"),
            AutoGenerateRule {
                length: 16,
                prefix: String::from("sdk-node-"),
                charset: String::from("abc123"),
            },
        );
        manifest.node_id_field = Some(String::from("NODE_UUID"));

        let plan = build(&manifest, &request(&[]), None).unwrap();

        let node_id = plan.sdk_node_id.clone().unwrap();
        assert!(node_id.starts_with("sdk-node-"));
        assert_eq!(plan.fields.get(CLAIM_URL_FIELD), Some(&node_id));
        assert_eq!(plan.fields.get("NODE_UUID"), Some(&node_id));
        assert_eq!(plan.environment.get("NODE_UUID"), Some(node_id.as_str()));
    }

    #[test]
    fn missing_field_is_reported() {
        let mut manifest = create_example_manifest();
        manifest.required_fields.insert(String::from("TOKEN"));
        assert_eq!(
            build(&manifest, &request(&[]), None),
            Err(DeploymentError::MissingField(String::from("TOKEN")))
        );
        assert!(build(&manifest, &request(&[("TOKEN", "t")]), None).is_ok());
    }

    #[test]
    fn invalid_device_name_is_rejected() {
        let mut request = request(&[]);
        request.device_name = String::from("my box");
        assert_eq!(
            build(&create_example_manifest(), &request, None),
            Err(DeploymentError::InvalidDeviceName(String::from("my box")))
        );
    }

    #[test]
    fn command_is_rendered_from_fields() {
        let mut manifest = create_example_manifest();
        manifest.command = Some(String::from("-token $TOKEN -device $DEVICE_NAME"));
        let plan = build(&manifest, &request(&[("TOKEN", "t0k")]), None).unwrap();
        assert_eq!(plan.command, vec!["-token", "t0k", "-device", "box"]);
    }
}
