use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, warn};
use uuid::Uuid;

use super::cleanup::ContainerCleaner;
use super::credentials::{AppCredentials, CredentialStore};
use super::deployment::{
    AppDeployment, BatchDeploymentRequest, BatchDeploymentResult, DeploymentError,
    DeploymentOutcome, DeploymentPlan, DeploymentRequest,
};
use super::environment::HOST_PORT_FIELD;
use super::instance::{AppInstance, InstanceError};
use super::instance_registry::{InstanceRegistry, LocalReservation};
use super::manifest::ManifestCatalog;
use super::naming;
use super::ports::{self, PortAllocator, PortMapping};
use super::proxy::{Proxy, ProxyError};
use super::proxy_registry::ProxyRegistry;
use super::runtime::{ContainerRuntime, RunSpec};

pub const DEFAULT_TUNNEL_IMAGE: &str = "xjasonlyu/tun2socks:latest";
const TUNNEL_DNS: [&str; 2] = ["1.1.1.1", "8.8.8.8"];
const TUNNEL_EXTRA_COMMANDS: &str = "ip rule add iif lo ipproto udp dport 53 lookup main;";

/// Where a new instance goes. A local deploy holds the app's local slot
/// until the instance is committed.
enum Scope<'a> {
    Local(LocalReservation<'a>),
    Proxied(Proxy),
}

struct Tunnel {
    name: String,
    /// Ports an existing tunnel was asked for but doesn't publish.
    unpublished: Vec<PortMapping>,
}

struct Launched {
    instance: AppInstance,
    unpublished: Vec<PortMapping>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerConfig {
    pub data_root: PathBuf,
    pub tunnel_image: String,
}

/// Turns deployment requests into running containers and registered
/// instances. Runtime calls never run under a registry lock.
pub struct DeploymentPlanner {
    manifests: Arc<ManifestCatalog>,
    proxies: Arc<ProxyRegistry>,
    instances: Arc<InstanceRegistry>,
    runtime: Arc<dyn ContainerRuntime + Send + Sync>,
    credentials: Arc<dyn CredentialStore + Send + Sync>,
    cleaner: Arc<ContainerCleaner>,
    tunnel_lock: Arc<tokio::sync::Mutex<()>>,
    config: PlannerConfig,
}

impl DeploymentPlanner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        manifests: Arc<ManifestCatalog>,
        proxies: Arc<ProxyRegistry>,
        instances: Arc<InstanceRegistry>,
        runtime: Arc<dyn ContainerRuntime + Send + Sync>,
        credentials: Arc<dyn CredentialStore + Send + Sync>,
        cleaner: Arc<ContainerCleaner>,
        tunnel_lock: Arc<tokio::sync::Mutex<()>>,
        config: PlannerConfig,
    ) -> Self {
        Self {
            manifests,
            proxies,
            instances,
            runtime,
            credentials,
            cleaner,
            tunnel_lock,
            config,
        }
    }

    /// Deploys one instance and stores the request fields as the app's credentials.
    pub async fn deploy(&self, request: DeploymentRequest) -> Result<AppInstance, DeploymentError> {
        self.launch(request, None, true)
            .await
            .map(|launched| launched.instance)
    }

    /// Deploys the local instance and then one instance per proxy. Each
    /// proxy gets freshly allocated host ports and its own outcome.
    pub async fn deploy_with_proxies(
        &self,
        batch: BatchDeploymentRequest,
    ) -> Result<BatchDeploymentResult, DeploymentError> {
        let manifest = self.manifests.get(&batch.app_id)?.clone();

        let local = match self.deploy(batch.single(None)).await {
            Ok(instance) => DeploymentOutcome::Deployed(instance),
            Err(DeploymentError::Instance(InstanceError::LocalInstanceExists(_))) => {
                DeploymentOutcome::Skipped(String::from("Local instance already exists."))
            }
            Err(err @ DeploymentError::CredentialsNotSaved { .. }) => {
                DeploymentOutcome::Failed(err)
            }
            Err(err) => return Err(err),
        };

        let mut allocator = PortAllocator::new(self.used_host_ports().await);
        let requested_port = batch
            .fields
            .get(HOST_PORT_FIELD)
            .and_then(|port| port.trim().parse::<u16>().ok());
        let templates = ports::resolve_templates(&manifest.ports, &batch.fields);

        let mut proxies = Vec::with_capacity(batch.proxy_ids.len());
        for proxy_id in &batch.proxy_ids {
            if self.instances.find(&batch.app_id, Some(proxy_id)).is_some() {
                proxies.push((*proxy_id, Self::already_deployed(&batch.app_id)));
                continue;
            }
            let mut requested = requested_port;
            let assigned: Vec<PortMapping> = templates
                .iter()
                .map(|template| {
                    if template.host.is_empty() {
                        return template.clone();
                    }
                    let host = allocator.allocate_preferring(requested.take());
                    PortMapping::new(host.to_string(), template.container.clone())
                })
                .collect();
            debug!("Assigned ports for proxy {proxy_id}: {assigned:?}");

            let outcome = self
                .launch(batch.single(Some(*proxy_id)), Some(assigned), false)
                .await;
            proxies.push((*proxy_id, Self::outcome(&batch.app_id, outcome)));
        }

        Ok(BatchDeploymentResult { local, proxies })
    }

    /// Deploys each app behind one proxy using its stored credentials.
    pub async fn deploy_on_proxy(
        &self,
        proxy_id: &Uuid,
        app_ids: &[String],
    ) -> Result<Vec<AppDeployment>, DeploymentError> {
        self.proxies.get_active(proxy_id)?;
        let mut deployments = Vec::with_capacity(app_ids.len());
        for app_id in app_ids {
            let outcome = match self.credentials.load(app_id).await {
                Ok(credentials) => {
                    let request = DeploymentRequest {
                        app_id: app_id.clone(),
                        device_name: credentials.device_name,
                        fields: credentials.fields,
                        proxy_id: Some(*proxy_id),
                    };
                    Self::outcome(app_id, self.launch(request, None, false).await)
                }
                Err(err) => DeploymentOutcome::Failed(err.into()),
            };
            deployments.push(AppDeployment {
                app_id: app_id.clone(),
                outcome,
            });
        }
        Ok(deployments)
    }

    /// Host ports published by any container plus the ones recorded on instances.
    pub async fn used_host_ports(&self) -> HashSet<u16> {
        let mut used = self.instances.reserved_host_ports();
        match self.runtime.list().await {
            Ok(containers) => used.extend(
                containers
                    .into_iter()
                    .flat_map(|container| container.published_ports),
            ),
            Err(err) => warn!("Can't list published ports, using recorded ones only: {err}"),
        }
        used
    }

    async fn launch(
        &self,
        request: DeploymentRequest,
        explicit_ports: Option<Vec<PortMapping>>,
        persist_credentials: bool,
    ) -> Result<Launched, DeploymentError> {
        let manifest = self.manifests.get(&request.app_id)?.clone();
        let scope = match &request.proxy_id {
            None => Scope::Local(self.instances.reserve_local(&request.app_id)?),
            Some(proxy_id) => {
                let proxy = self.proxies.get_active(proxy_id)?;
                if self.instances.find(&request.app_id, Some(proxy_id)).is_some() {
                    return Err(DeploymentError::ProxyInstanceExists {
                        app_id: request.app_id.clone(),
                        proxy_id: *proxy_id,
                    });
                }
                Scope::Proxied(proxy)
            }
        };
        let proxy = match &scope {
            Scope::Local(_) => None,
            Scope::Proxied(proxy) => Some(proxy.clone()),
        };

        let plan = DeploymentPlan::build(
            &manifest,
            &request,
            proxy.as_ref(),
            &self.config.data_root,
            explicit_ports,
            &mut rand::thread_rng(),
        )?;

        self.runtime.pull(&manifest.image).await?;
        let mut spec = RunSpec::new(plan.container_name.clone(), manifest.image.clone());
        spec.env = plan.environment.to_vars();
        spec.volumes = plan.volumes.clone();
        spec.command = plan.command.clone();
        spec.resource_limits = manifest.resource_limits.clone();
        let mut unpublished = vec![];
        match &proxy {
            None => spec.ports = plan.ports.clone(),
            Some(proxy) => {
                let tunnel = self.ensure_tunnel(proxy, &plan.ports).await?;
                spec.network = Some(format!("container:{}", tunnel.name));
                unpublished = tunnel.unpublished;
            }
        }

        let container_id = self.runtime.run(&spec).await?;
        info!(
            "Started container {} for app {}",
            plan.container_name, plan.app_id
        );

        let credentials = AppCredentials {
            app_id: plan.app_id.clone(),
            device_name: plan.device_name.clone(),
            fields: plan
                .fields
                .iter()
                .filter(|(key, _)| key.as_str() != HOST_PORT_FIELD)
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        };
        let instance = plan.into_instance(container_id);
        let committed: Result<(), DeploymentError> = match scope {
            Scope::Local(reservation) => reservation.commit(instance.clone()).map_err(Into::into),
            Scope::Proxied(proxy) => self
                .proxies
                .with_active(&proxy.id, |_| self.instances.add(instance.clone()))
                .map_err(DeploymentError::from)
                .and_then(|added| added.map_err(Into::into)),
        };
        if let Err(err) = committed {
            warn!(
                "Instance {} couldn't be registered, removing its container: {err}",
                instance.id
            );
            if let Err(cleanup_err) = self.cleaner.stop_and_remove(&instance.container_name).await {
                warn!(
                    "Failed to remove container {}: {cleanup_err}",
                    instance.container_name
                );
            }
            return Err(err);
        }

        if persist_credentials {
            if let Err(err) = self.credentials.save(credentials).await {
                warn!("Credentials of instance {} weren't saved: {err}", instance.id);
                return Err(DeploymentError::CredentialsNotSaved {
                    instance_id: instance.id,
                    reason: err.to_string(),
                });
            }
        }
        Ok(Launched {
            instance,
            unpublished,
        })
    }

    /// Returns the tunnel container of `proxy`, creating its network and
    /// container when missing. `ports` are only published by a new tunnel.
    async fn ensure_tunnel(
        &self,
        proxy: &Proxy,
        ports: &[PortMapping],
    ) -> Result<Tunnel, DeploymentError> {
        let _provisioning = self.tunnel_lock.lock().await;
        if !self.proxies.is_active(&proxy.id) {
            return Err(ProxyError::NotFound(proxy.id).into());
        }
        let hash = proxy.hash();
        let tunnel = naming::tunnel_container_name(&hash);

        let containers = self.runtime.list().await?;
        if let Some(existing) = containers.iter().find(|container| container.name == tunnel) {
            if !existing.state.eq_ignore_ascii_case("running") {
                self.runtime.start(&tunnel).await?;
            }
            if !ports.is_empty() {
                warn!(
                    "Tunnel {tunnel} already exists, ports {} are recorded but not published.",
                    ports
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
            debug!("Reusing tunnel {tunnel}");
            return Ok(Tunnel {
                name: tunnel,
                unpublished: ports.to_vec(),
            });
        }

        let network = naming::tunnel_network_name(&hash);
        self.runtime.network_create(&network).await?;
        self.runtime.pull(&self.config.tunnel_image).await?;
        let mut spec = RunSpec::new(tunnel.clone(), self.config.tunnel_image.clone());
        spec.env = vec![
            format!("PROXY={}", proxy.format()),
            String::from("LOGLEVEL=info"),
            format!("EXTRA_COMMANDS={TUNNEL_EXTRA_COMMANDS}"),
        ];
        spec.volumes = vec![String::from("/dev/net/tun:/dev/net/tun")];
        spec.ports = ports.to_vec();
        spec.network = Some(network);
        spec.capabilities = vec![String::from("NET_ADMIN")];
        spec.privileged = true;
        spec.dns = TUNNEL_DNS.iter().map(|dns| dns.to_string()).collect();
        self.runtime.run(&spec).await?;
        info!("Created tunnel {tunnel} for proxy {proxy}");
        Ok(Tunnel {
            name: tunnel,
            unpublished: vec![],
        })
    }

    fn outcome(app_id: &str, result: Result<Launched, DeploymentError>) -> DeploymentOutcome {
        match result {
            Ok(Launched {
                instance,
                unpublished,
            }) if unpublished.is_empty() => DeploymentOutcome::Deployed(instance),
            Ok(Launched {
                instance,
                unpublished,
            }) => DeploymentOutcome::PortsNotPublished {
                instance,
                ports: unpublished,
            },
            Err(DeploymentError::ProxyInstanceExists { .. }) => Self::already_deployed(app_id),
            Err(err) => DeploymentOutcome::Failed(err),
        }
    }

    fn already_deployed(app_id: &str) -> DeploymentOutcome {
        DeploymentOutcome::Skipped(format!("App {app_id} is already deployed on this proxy."))
    }
}
