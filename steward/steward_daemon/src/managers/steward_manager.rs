use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use log::{info, warn};
use uuid::Uuid;

use super::cleanup::ContainerCleaner;
use super::credentials::{CredentialStore, CredentialStoreError};
use super::deployment::{
    AppDeployment, BatchDeploymentRequest, BatchDeploymentResult, DeploymentOutcome,
    DeploymentRequest,
};
use super::deployment_planner::{DeploymentPlanner, PlannerConfig};
use super::instance::{AppInstance, InstanceStatus};
use super::instance_registry::InstanceRegistry;
use super::manifest::{AppManifest, ManifestCatalog};
use super::proxy::{HealthStatus, ProxyError, ProxyHealth, ProxyOverview, ProxyProbe};
use super::proxy_registry::ProxyRegistry;
use super::runtime::{ContainerInfo, ContainerRuntime, LogTail};
use super::steward::{
    Activity, AutoDeploy, Dashboard, InstanceTraffic, ProxyAddition, Steward, StewardError,
};
use super::teardown::{RemovalPreview, TeardownReport};
use super::teardown_manager::TeardownCoordinator;

pub const DEFAULT_LOG_TAIL: usize = 300;
pub const MAX_LOG_TAIL: usize = 10000;
const ACTIVITY_CAPACITY: usize = 50;
const RECENT_INSTANCES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StewardConfig {
    pub data_root: PathBuf,
    pub tunnel_image: String,
    /// Deploy every configured app behind proxies added without an explicit choice.
    pub auto_deploy_configured: bool,
}

/// Bounded log of the most recent user visible events.
#[derive(Default)]
pub struct ActivityLog {
    entries: Mutex<VecDeque<Activity>>,
}

impl ActivityLog {
    pub fn record(&self, message: impl Into<String>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == ACTIVITY_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(Activity {
            timestamp: Utc::now(),
            message: message.into(),
        });
    }

    /// Newest first.
    pub fn recent(&self) -> Vec<Activity> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .cloned()
            .collect()
    }
}

pub struct StewardDaemon {
    proxies: Arc<ProxyRegistry>,
    instances: Arc<InstanceRegistry>,
    manifests: Arc<ManifestCatalog>,
    runtime: Arc<dyn ContainerRuntime + Send + Sync>,
    credentials: Arc<dyn CredentialStore + Send + Sync>,
    cleaner: Arc<ContainerCleaner>,
    planner: DeploymentPlanner,
    teardown: TeardownCoordinator,
    activity: Arc<ActivityLog>,
    auto_deploy_configured: bool,
}

impl StewardDaemon {
    pub fn new(
        manifests: ManifestCatalog,
        probe: Box<dyn ProxyProbe + Send + Sync>,
        runtime: Arc<dyn ContainerRuntime + Send + Sync>,
        credentials: Arc<dyn CredentialStore + Send + Sync>,
        config: StewardConfig,
    ) -> Self {
        let activity = Arc::new(ActivityLog::default());
        let added_log = activity.clone();
        let removed_log = activity.clone();
        let proxies = Arc::new(
            ProxyRegistry::new(probe)
                .with_added_callback(Box::new(move |proxy| {
                    added_log.record(format!("Added proxy {}", proxy.display_uri()))
                }))
                .with_removed_callback(Box::new(move |proxy| {
                    removed_log.record(format!("Removed proxy {}", proxy.display_uri()))
                })),
        );
        let instances = Arc::new(InstanceRegistry::new());
        let manifests = Arc::new(manifests);
        let cleaner = Arc::new(ContainerCleaner::new(
            runtime.clone(),
            config.data_root.clone(),
        ));
        let tunnel_lock = Arc::new(tokio::sync::Mutex::new(()));
        let planner = DeploymentPlanner::new(
            manifests.clone(),
            proxies.clone(),
            instances.clone(),
            runtime.clone(),
            credentials.clone(),
            cleaner.clone(),
            tunnel_lock.clone(),
            PlannerConfig {
                data_root: config.data_root,
                tunnel_image: config.tunnel_image,
            },
        );
        let teardown = TeardownCoordinator::new(
            proxies.clone(),
            instances.clone(),
            cleaner.clone(),
            tunnel_lock,
        );
        Self {
            proxies,
            instances,
            manifests,
            runtime,
            credentials,
            cleaner,
            planner,
            teardown,
            activity,
            auto_deploy_configured: config.auto_deploy_configured,
        }
    }

    fn overview(&self, proxy_id: &Uuid) -> Result<ProxyOverview, ProxyError> {
        Ok(ProxyOverview {
            proxy: self.proxies.get(proxy_id)?,
            health: self.proxies.health(proxy_id).unwrap_or_default(),
            instances_count: self.instances.by_proxy(proxy_id).len(),
        })
    }

    fn record_deployments<'a>(
        &self,
        scope: &str,
        deployments: impl IntoIterator<Item = (&'a str, &'a DeploymentOutcome)>,
    ) {
        for (app_id, outcome) in deployments {
            match outcome {
                DeploymentOutcome::Deployed(instance)
                | DeploymentOutcome::PortsNotPublished { instance, .. } => self
                    .activity
                    .record(format!("Deployed {app_id} {scope} as {}", instance.id)),
                DeploymentOutcome::Failed(err) => self
                    .activity
                    .record(format!("Deployment of {app_id} {scope} failed: {err}")),
                DeploymentOutcome::Skipped(_) => {}
            }
        }
    }

    async fn auto_deploy_apps(
        &self,
        proxy_id: &Uuid,
        auto_deploy: AutoDeploy,
    ) -> Result<Vec<AppDeployment>, StewardError> {
        let app_ids = match auto_deploy {
            AutoDeploy::Nothing if self.auto_deploy_configured => {
                self.credentials.list_configured_app_ids().await?
            }
            AutoDeploy::Nothing => return Ok(vec![]),
            AutoDeploy::Configured => self.credentials.list_configured_app_ids().await?,
            AutoDeploy::Selected(app_ids) => app_ids,
        };
        if app_ids.is_empty() {
            return Ok(vec![]);
        }
        Ok(self.planner.deploy_on_proxy(proxy_id, &app_ids).await?)
    }
}

#[async_trait]
impl Steward for StewardDaemon {
    async fn add_proxy(
        &self,
        uri: &str,
        auto_deploy: AutoDeploy,
    ) -> Result<ProxyAddition, StewardError> {
        let proxy = self.proxies.add(uri)?;
        let health = match self.proxies.validate(&proxy.id).await {
            Ok(health) => health,
            Err(err) => {
                warn!("Proxy {proxy} failed validation: {err}");
                self.proxies.health(&proxy.id)?
            }
        };

        let deployments = if health.status == HealthStatus::Healthy {
            self.auto_deploy_apps(&proxy.id, auto_deploy).await?
        } else {
            if auto_deploy != AutoDeploy::Nothing {
                warn!("Proxy {proxy} isn't healthy, skipping auto deployment.");
            }
            vec![]
        };
        self.record_deployments(
            &format!("on proxy {}", proxy.display_uri()),
            deployments
                .iter()
                .map(|deployment| (deployment.app_id.as_str(), &deployment.outcome)),
        );

        Ok(ProxyAddition {
            overview: self.overview(&proxy.id)?,
            deployments,
        })
    }

    fn list_proxies(&self) -> Vec<ProxyOverview> {
        self.proxies
            .list()
            .into_iter()
            .map(|(proxy, health)| {
                let instances_count = self.instances.by_proxy(&proxy.id).len();
                ProxyOverview {
                    proxy,
                    health,
                    instances_count,
                }
            })
            .collect()
    }

    async fn test_proxy(&self, id: &Uuid) -> Result<ProxyHealth, StewardError> {
        match self.proxies.validate(id).await {
            Ok(health) => Ok(health),
            Err(ProxyError::ConnectFailed(_) | ProxyError::BadStatus(_)) => {
                Ok(self.proxies.health(id)?)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn inspect_proxy_removal(&self, id: &Uuid) -> Result<RemovalPreview, StewardError> {
        Ok(self.teardown.inspect(id)?)
    }

    async fn confirm_proxy_removal(&self, id: &Uuid) -> Result<TeardownReport, StewardError> {
        let report = self.teardown.confirm_and_remove(id).await?;
        self.activity.record(format!(
            "Tore down proxy {} with {} instances",
            report.proxy.display_uri(),
            report.removed_instances.len()
        ));
        Ok(report)
    }

    fn abort_proxy_removal(&self, id: &Uuid) -> Result<(), StewardError> {
        Ok(self.teardown.abort(id)?)
    }

    async fn deploy_app(&self, request: DeploymentRequest) -> Result<AppInstance, StewardError> {
        let instance = self.planner.deploy(request).await?;
        self.activity
            .record(format!("Deployed {} as {}", instance.app_id, instance.id));
        Ok(instance)
    }

    async fn deploy_app_with_proxies(
        &self,
        request: BatchDeploymentRequest,
    ) -> Result<BatchDeploymentResult, StewardError> {
        let app_id = request.app_id.clone();
        let result = self.planner.deploy_with_proxies(request).await?;
        self.record_deployments("locally", [(app_id.as_str(), &result.local)]);
        for (proxy_id, outcome) in &result.proxies {
            self.record_deployments(
                &format!("on proxy {proxy_id}"),
                [(app_id.as_str(), outcome)],
            );
        }
        Ok(result)
    }

    async fn deploy_apps_on_proxy(
        &self,
        proxy_id: &Uuid,
        app_ids: &[String],
    ) -> Result<Vec<AppDeployment>, StewardError> {
        let deployments = self.planner.deploy_on_proxy(proxy_id, app_ids).await?;
        self.record_deployments(
            &format!("on proxy {proxy_id}"),
            deployments
                .iter()
                .map(|deployment| (deployment.app_id.as_str(), &deployment.outcome)),
        );
        Ok(deployments)
    }

    fn list_instances(&self, app_id: Option<String>, proxy_id: Option<Uuid>) -> Vec<AppInstance> {
        let mut instances = match (app_id, proxy_id) {
            (Some(app_id), Some(proxy_id)) => self
                .instances
                .by_app(&app_id)
                .into_iter()
                .filter(|instance| instance.proxy_id == Some(proxy_id))
                .collect(),
            (Some(app_id), None) => self.instances.by_app(&app_id),
            (None, Some(proxy_id)) => self.instances.by_proxy(&proxy_id),
            (None, None) => self.instances.all(),
        };
        instances.sort_by(|left, right| left.id.cmp(&right.id));
        instances
    }

    async fn remove_instance(&self, id: &str) -> Result<(), StewardError> {
        let instance = self.instances.get(id)?;
        for failure in self.cleaner.remove_instance(&instance).await {
            warn!("Cleanup of instance {id}: {failure}");
        }
        self.instances.remove(id)?;
        self.activity.record(format!("Removed instance {id}"));
        Ok(())
    }

    async fn remove_app(&self, app_id: &str) -> Result<Vec<String>, StewardError> {
        let mut removed = vec![];
        for instance in self.instances.by_app(app_id) {
            for failure in self.cleaner.remove_instance(&instance).await {
                warn!("Cleanup of instance {}: {failure}", instance.id);
            }
            if self.instances.remove(&instance.id).is_ok() {
                removed.push(instance.id);
            }
        }
        match self.credentials.delete(app_id).await {
            Ok(()) | Err(CredentialStoreError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }
        info!("Removed app {app_id} with {} instances", removed.len());
        self.activity.record(format!("Removed app {app_id}"));
        Ok(removed)
    }

    async fn list_containers(&self) -> Result<Vec<ContainerInfo>, StewardError> {
        Ok(self.runtime.list().await?)
    }

    async fn start_container(&self, name: &str) -> Result<(), StewardError> {
        self.runtime.start(name).await?;
        self.activity.record(format!("Started container {name}"));
        Ok(())
    }

    async fn stop_container(&self, name: &str) -> Result<(), StewardError> {
        self.runtime.stop(name).await?;
        self.activity.record(format!("Stopped container {name}"));
        Ok(())
    }

    async fn restart_container(&self, name: &str) -> Result<(), StewardError> {
        self.runtime.restart(name).await?;
        self.activity.record(format!("Restarted container {name}"));
        Ok(())
    }

    async fn container_logs(
        &self,
        name: &str,
        tail: Option<usize>,
    ) -> Result<String, StewardError> {
        let tail = match tail {
            None => LogTail::Lines(DEFAULT_LOG_TAIL),
            Some(0) => LogTail::All,
            Some(lines) => LogTail::Lines(lines.min(MAX_LOG_TAIL)),
        };
        Ok(self.runtime.logs(name, tail).await?)
    }

    async fn container_env(&self, name: &str) -> Result<BTreeMap<String, String>, StewardError> {
        Ok(self.runtime.inspect_env(name).await?)
    }

    async fn configured_apps(&self) -> Result<Vec<String>, StewardError> {
        Ok(self.credentials.list_configured_app_ids().await?)
    }

    fn list_manifests(&self) -> Vec<(String, AppManifest)> {
        self.manifests
            .list()
            .map(|(app_id, manifest)| (app_id.clone(), manifest.clone()))
            .collect()
    }

    async fn dashboard(&self) -> Result<Dashboard, StewardError> {
        let containers = self.runtime.list().await?;
        let proxies = self.proxies.list();
        let instances = self.instances.all();

        let running: Vec<&AppInstance> = instances
            .iter()
            .filter(|instance| {
                containers.iter().any(|container| {
                    container.name == instance.container_name
                        && InstanceStatus::from_container_state(&container.state)
                            == InstanceStatus::Running
                })
            })
            .collect();
        let names: Vec<String> = running
            .iter()
            .map(|instance| instance.container_name.clone())
            .collect();
        let stats = self.runtime.network_stats(&names).await.unwrap_or_else(|err| {
            warn!("Can't read network stats: {err}");
            BTreeMap::new()
        });

        let mut traffic = Vec::with_capacity(running.len());
        for instance in &running {
            let started_at = match self.runtime.start_time(&instance.container_name).await {
                Ok(started_at) => started_at,
                Err(err) => {
                    warn!(
                        "Can't read start time of {}: {err}",
                        instance.container_name
                    );
                    None
                }
            };
            traffic.push(InstanceTraffic {
                instance_id: instance.id.clone(),
                container_name: instance.container_name.clone(),
                stats: stats
                    .get(&instance.container_name)
                    .copied()
                    .unwrap_or_default(),
                started_at,
            });
        }

        let proxies_with = |status: HealthStatus| {
            proxies
                .iter()
                .filter(|(_, health)| health.status == status)
                .count()
        };
        let instances_running = running.len();
        let mut recent_instances = instances.clone();
        recent_instances.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent_instances.truncate(RECENT_INSTANCES);

        Ok(Dashboard {
            proxies_total: proxies.len(),
            proxies_healthy: proxies_with(HealthStatus::Healthy),
            proxies_unhealthy: proxies_with(HealthStatus::Unhealthy),
            proxies_unknown: proxies_with(HealthStatus::Unknown),
            instances_total: instances.len(),
            instances_running,
            instances_stopped: instances.len() - instances_running,
            containers_total: containers.len(),
            traffic,
            recent_instances,
            recent_activity: self.activity.recent(),
        })
    }

    async fn refresh_statuses(&self) -> Result<usize, StewardError> {
        let containers = self.runtime.list().await?;
        let mut changed = 0;
        for instance in self.instances.all() {
            let status = containers
                .iter()
                .find(|container| container.name == instance.container_name)
                .map(|container| InstanceStatus::from_container_state(&container.state))
                .unwrap_or(InstanceStatus::Unknown);
            if status != instance.status && self.instances.update_status(&instance.id, status).is_ok()
            {
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use uuid::Uuid;

    use super::{ActivityLog, StewardConfig, StewardDaemon, ACTIVITY_CAPACITY, MAX_LOG_TAIL};
    use crate::managers::credentials::{AppCredentials, CredentialStoreError};
    use crate::managers::deployment::{DeploymentOutcome, DeploymentRequest};
    use crate::managers::instance::{FieldMap, InstanceStatus};
    use crate::managers::manifest::ManifestCatalog;
    use crate::managers::proxy::{HealthStatus, ProxyError};
    use crate::managers::runtime::{ContainerInfo, LogTail, NetworkStats};
    use crate::managers::steward::{AutoDeploy, Steward, StewardError};
    use crate::managers::teardown::TeardownError;
    use crate::utils::test_utilities::{
        create_example_instance, create_example_manifest, create_example_proxy_uri,
        MockContainerRuntime, MockCredentialStore, MockProxyProbe,
    };

    fn create_steward(
        probe: Option<MockProxyProbe>,
        runtime: Option<MockContainerRuntime>,
        credentials: Option<MockCredentialStore>,
    ) -> StewardDaemon {
        let manifests = ManifestCatalog::new(BTreeMap::from([(
            String::from("test"),
            create_example_manifest(),
        )]))
        .unwrap();
        StewardDaemon::new(
            manifests,
            Box::new(probe.unwrap_or_default()),
            Arc::new(runtime.unwrap_or_default()),
            Arc::new(credentials.unwrap_or_default()),
            StewardConfig {
                data_root: PathBuf::from("/srv/steward/.data"),
                tunnel_image: String::from("xjasonlyu/tun2socks:latest"),
                auto_deploy_configured: false,
            },
        )
    }

    fn healthy_probe() -> MockProxyProbe {
        let mut probe = MockProxyProbe::new();
        probe
            .expect_test_connectivity()
            .returning(|_| Ok(Duration::from_millis(10)));
        probe
    }

    fn running(name: &str) -> ContainerInfo {
        ContainerInfo {
            id: format!("{name}-id"),
            name: name.to_string(),
            image: String::from("example/app:latest"),
            status: String::from("Up 1 hour"),
            state: String::from("running"),
            published_ports: vec![],
        }
    }

    fn deploying_runtime() -> MockContainerRuntime {
        let mut runtime = MockContainerRuntime::new();
        runtime.expect_pull().returning(|_| Ok(()));
        runtime.expect_network_create().returning(|_| Ok(()));
        runtime.expect_list().returning(|| Ok(vec![]));
        runtime
            .expect_run()
            .returning(|spec| Ok(format!("{}-id", spec.name)));
        runtime.expect_stop().returning(|_| Ok(()));
        runtime.expect_remove().returning(|_| Ok(()));
        runtime.expect_network_remove().returning(|_| Ok(()));
        runtime
    }

    fn stored_credentials() -> MockCredentialStore {
        let mut credentials = MockCredentialStore::new();
        credentials.expect_save().returning(|_| Ok(()));
        credentials
            .expect_list_configured_app_ids()
            .returning(|| Ok(vec![String::from("test")]));
        credentials.expect_load().returning(|app_id| {
            Ok(AppCredentials {
                app_id: app_id.to_string(),
                device_name: String::from("box"),
                fields: FieldMap::new(),
            })
        });
        credentials
    }

    fn local_request() -> DeploymentRequest {
        DeploymentRequest {
            app_id: String::from("test"),
            device_name: String::from("box"),
            fields: FieldMap::new(),
            proxy_id: None,
        }
    }

    #[tokio::test]
    async fn add_healthy_proxy_deploys_configured_apps() {
        let steward = create_steward(
            Some(healthy_probe()),
            Some(deploying_runtime()),
            Some(stored_credentials()),
        );

        let added = steward
            .add_proxy(create_example_proxy_uri(), AutoDeploy::Configured)
            .await
            .unwrap();

        assert_eq!(added.overview.health.status, HealthStatus::Healthy);
        assert_eq!(added.deployments.len(), 1);
        assert!(matches!(
            added.deployments[0].outcome,
            DeploymentOutcome::Deployed(_)
        ));
        assert_eq!(added.overview.instances_count, 1);
        assert_eq!(steward.list_proxies()[0].instances_count, 1);
    }

    #[tokio::test]
    async fn add_unhealthy_proxy_skips_deployment() {
        let mut probe = MockProxyProbe::new();
        probe
            .expect_test_connectivity()
            .returning(|_| Err(ProxyError::BadStatus(502)));
        let mut runtime = MockContainerRuntime::new();
        runtime.expect_run().never();
        let steward = create_steward(Some(probe), Some(runtime), Some(stored_credentials()));

        let added = steward
            .add_proxy(create_example_proxy_uri(), AutoDeploy::Configured)
            .await
            .unwrap();

        assert_eq!(added.overview.health.status, HealthStatus::Unhealthy);
        assert!(added.deployments.is_empty());
        assert_eq!(steward.list_proxies().len(), 1);
    }

    #[tokio::test]
    async fn add_malformed_proxy() {
        let steward = create_steward(None, None, None);
        assert!(matches!(
            steward.add_proxy("garbage", AutoDeploy::Nothing).await,
            Err(StewardError::Proxy(ProxyError::InvalidFormat { .. }))
        ));
    }

    #[tokio::test]
    async fn test_proxy_reports_failed_health() {
        let mut probe = MockProxyProbe::new();
        probe
            .expect_test_connectivity()
            .returning(|_| Err(ProxyError::ConnectFailed(String::from("timeout"))));
        let steward = create_steward(Some(probe), None, None);
        let added = steward
            .add_proxy(create_example_proxy_uri(), AutoDeploy::Nothing)
            .await
            .unwrap();

        let health = steward.test_proxy(&added.overview.proxy.id).await.unwrap();
        assert_eq!(health.status, HealthStatus::Unhealthy);

        let unknown = Uuid::new_v4();
        assert_eq!(
            steward.test_proxy(&unknown).await,
            Err(StewardError::Proxy(ProxyError::NotFound(unknown)))
        );
    }

    #[tokio::test]
    async fn list_instances_filters_by_app_and_proxy() {
        let steward = create_steward(
            Some(healthy_probe()),
            Some(deploying_runtime()),
            Some(stored_credentials()),
        );
        let local = steward.deploy_app(local_request()).await.unwrap();
        let added = steward
            .add_proxy(create_example_proxy_uri(), AutoDeploy::Configured)
            .await
            .unwrap();
        let proxy_id = added.overview.proxy.id;

        assert_eq!(steward.list_instances(None, None).len(), 2);
        assert_eq!(steward.list_instances(Some(String::from("test")), None).len(), 2);
        assert_eq!(steward.list_instances(Some(String::from("other")), None).len(), 0);
        let proxied = steward.list_instances(None, Some(proxy_id));
        assert_eq!(proxied.len(), 1);
        assert_ne!(proxied[0].id, local.id);
        assert_eq!(steward.list_instances(Some(String::from("test")), Some(proxy_id)), proxied);
    }

    #[tokio::test]
    async fn teardown_through_steward() {
        let steward = create_steward(
            Some(healthy_probe()),
            Some(deploying_runtime()),
            Some(stored_credentials()),
        );
        let added = steward
            .add_proxy(create_example_proxy_uri(), AutoDeploy::Configured)
            .await
            .unwrap();
        let proxy_id = added.overview.proxy.id;

        let preview = steward.inspect_proxy_removal(&proxy_id).unwrap();
        assert_eq!(preview.dependents.len(), 1);
        let report = steward.confirm_proxy_removal(&proxy_id).await.unwrap();
        assert_eq!(report.removed_instances.len(), 1);
        assert!(steward.list_instances(None, None).is_empty());
        assert!(steward.list_proxies().is_empty());
        assert_eq!(
            steward.confirm_proxy_removal(&proxy_id).await,
            Err(StewardError::Teardown(TeardownError::Proxy(
                ProxyError::NotFound(proxy_id)
            )))
        );
    }

    #[tokio::test]
    async fn remove_app_removes_instances_and_credentials() {
        let mut credentials = stored_credentials();
        credentials
            .expect_delete()
            .times(1)
            .returning(|_| Err(CredentialStoreError::NotFound(String::from("test"))));
        let steward = create_steward(
            Some(healthy_probe()),
            Some(deploying_runtime()),
            Some(credentials),
        );
        let local = steward.deploy_app(local_request()).await.unwrap();

        assert_eq!(steward.remove_app("test").await, Ok(vec![local.id]));
        assert!(steward.list_instances(Some(String::from("test")), None).is_empty());
    }

    #[tokio::test]
    async fn remove_missing_instance() {
        let steward = create_steward(None, None, None);
        assert!(matches!(
            steward.remove_instance("missing").await,
            Err(StewardError::Instance(_))
        ));
    }

    #[tokio::test]
    async fn log_tail_defaults_and_bounds() {
        let mut runtime = MockContainerRuntime::new();
        runtime
            .expect_logs()
            .withf(|_, tail| *tail == LogTail::Lines(300))
            .times(1)
            .returning(|_, _| Ok(String::from("default")));
        runtime
            .expect_logs()
            .withf(|_, tail| *tail == LogTail::Lines(MAX_LOG_TAIL))
            .times(1)
            .returning(|_, _| Ok(String::from("clamped")));
        runtime
            .expect_logs()
            .withf(|_, tail| *tail == LogTail::All)
            .times(1)
            .returning(|_, _| Ok(String::from("all")));
        let steward = create_steward(None, Some(runtime), None);

        assert_eq!(steward.container_logs("c", None).await.unwrap(), "default");
        assert_eq!(
            steward.container_logs("c", Some(50_000)).await.unwrap(),
            "clamped"
        );
        assert_eq!(steward.container_logs("c", Some(0)).await.unwrap(), "all");
    }

    #[tokio::test]
    async fn dashboard_counts_and_traffic() {
        let mut runtime = MockContainerRuntime::new();
        runtime.expect_pull().returning(|_| Ok(()));
        runtime
            .expect_run()
            .returning(|spec| Ok(format!("{}-id", spec.name)));
        runtime.expect_list().returning(|| {
            let mut stopped = running("box_other_proxy");
            stopped.state = String::from("exited");
            Ok(vec![running("box_test_local"), running("unrelated"), stopped])
        });
        runtime.expect_network_stats().returning(|names| {
            Ok(names
                .iter()
                .map(|name| {
                    (
                        name.clone(),
                        NetworkStats {
                            rx_bytes: 1200,
                            tx_bytes: 3400,
                        },
                    )
                })
                .collect())
        });
        runtime.expect_start_time().returning(|_| Ok(None));
        let steward = create_steward(None, Some(runtime), Some(stored_credentials()));
        let local = steward.deploy_app(local_request()).await.unwrap();
        let proxy = steward.proxies.add(create_example_proxy_uri()).unwrap();
        let mut newer = create_example_instance("other", Some(proxy.id));
        newer.container_name = String::from("box_other_proxy");
        newer.created_at = local.created_at + chrono::Duration::hours(1);
        steward.instances.add(newer.clone()).unwrap();

        let dashboard = steward.dashboard().await.unwrap();

        assert_eq!(dashboard.containers_total, 3);
        assert_eq!(dashboard.proxies_total, 1);
        assert_eq!(dashboard.proxies_unknown, 1);
        assert_eq!(dashboard.proxies_healthy, 0);
        assert_eq!(dashboard.instances_total, 2);
        assert_eq!(dashboard.instances_running, 1);
        assert_eq!(dashboard.instances_stopped, 1);
        assert_eq!(dashboard.recent_instances, vec![newer, local]);
        assert_eq!(dashboard.traffic.len(), 1);
        assert_eq!(dashboard.traffic[0].stats.rx_bytes, 1200);
        assert!(dashboard
            .recent_activity
            .iter()
            .any(|activity| activity.message.starts_with("Deployed test")));
    }

    #[tokio::test]
    async fn refresh_statuses_follows_runtime() {
        let mut runtime = MockContainerRuntime::new();
        runtime.expect_pull().returning(|_| Ok(()));
        runtime
            .expect_run()
            .returning(|spec| Ok(format!("{}-id", spec.name)));
        runtime.expect_list().returning(|| {
            let mut container = running("box_test_local");
            container.state = String::from("exited");
            Ok(vec![container])
        });
        let steward = create_steward(None, Some(runtime), Some(stored_credentials()));
        let instance = steward.deploy_app(local_request()).await.unwrap();

        assert_eq!(steward.refresh_statuses().await, Ok(1));
        assert_eq!(
            steward.list_instances(None, None)[0].status,
            InstanceStatus::Stopped
        );
        assert_eq!(steward.refresh_statuses().await, Ok(0));
        assert_eq!(instance.status, InstanceStatus::Running);
    }

    #[test]
    fn activity_log_keeps_latest_entries() {
        let log = ActivityLog::default();
        for index in 0..(ACTIVITY_CAPACITY + 5) {
            log.record(format!("event {index}"));
        }
        let recent = log.recent();
        assert_eq!(recent.len(), ACTIVITY_CAPACITY);
        assert_eq!(recent[0].message, format!("event {}", ACTIVITY_CAPACITY + 4));
        assert_eq!(recent[ACTIVITY_CAPACITY - 1].message, "event 5");
    }
}
