use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, error, info};
use uuid::Uuid;

use super::cleanup::ContainerCleaner;
use super::instance::InstanceError;
use super::instance_registry::InstanceRegistry;
use super::proxy::{ProxyError, ProxyOverview};
use super::proxy_registry::ProxyRegistry;
use super::teardown::{RemovalPreview, TeardownError, TeardownReport, TeardownState};

/// Drives proxy removal: preview, confirmation and the ordered removal of
/// dependents, the tunnel and finally the proxy itself.
pub struct TeardownCoordinator {
    proxies: Arc<ProxyRegistry>,
    instances: Arc<InstanceRegistry>,
    cleaner: Arc<ContainerCleaner>,
    tunnel_lock: Arc<tokio::sync::Mutex<()>>,
    sessions: Mutex<HashMap<Uuid, TeardownState>>,
}

impl TeardownCoordinator {
    pub fn new(
        proxies: Arc<ProxyRegistry>,
        instances: Arc<InstanceRegistry>,
        cleaner: Arc<ContainerCleaner>,
        tunnel_lock: Arc<tokio::sync::Mutex<()>>,
    ) -> Self {
        Self {
            proxies,
            instances,
            cleaner,
            tunnel_lock,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn state(&self, proxy_id: &Uuid) -> Option<TeardownState> {
        self.sessions().get(proxy_id).copied()
    }

    /// Read only preview of what a removal would delete.
    pub fn inspect(&self, proxy_id: &Uuid) -> Result<RemovalPreview, TeardownError> {
        let proxy = self.proxies.get_active(proxy_id)?;
        let health = self.proxies.health(proxy_id).unwrap_or_default();
        let dependents = self.instances.by_proxy(proxy_id);
        self.set_state(proxy_id, TeardownState::Inspecting);
        debug!(
            "Proxy {proxy} has {} dependent instances.",
            dependents.len()
        );
        Ok(RemovalPreview {
            overview: ProxyOverview {
                proxy,
                health,
                instances_count: dependents.len(),
            },
            dependents,
        })
    }

    pub fn abort(&self, proxy_id: &Uuid) -> Result<(), TeardownError> {
        let mut sessions = self.sessions();
        match sessions.get(proxy_id).copied() {
            Some(state) if !state.is_abortable() => Err(TeardownError::NotAbortable {
                proxy_id: *proxy_id,
                state,
            }),
            Some(_) => {
                sessions.insert(*proxy_id, TeardownState::Aborted);
                info!("Aborted removal of proxy: {proxy_id}");
                Ok(())
            }
            None => Err(TeardownError::Proxy(ProxyError::NotFound(*proxy_id))),
        }
    }

    /// Removes every dependent instance, then the tunnel, then the proxy.
    /// Only the first caller for a proxy gets past the claim, later or
    /// concurrent callers observe `NotFound` without touching the runtime.
    pub async fn confirm_and_remove(
        &self,
        proxy_id: &Uuid,
    ) -> Result<TeardownReport, TeardownError> {
        let proxy = self.proxies.retire(proxy_id)?;
        self.set_state(proxy_id, TeardownState::Confirmed);
        info!("Removing proxy {proxy}");
        self.set_state(proxy_id, TeardownState::Removing);

        let mut removed_instances = vec![];
        let mut failures = vec![];
        loop {
            let dependents = self.instances.by_proxy(proxy_id);
            if dependents.is_empty() {
                break;
            }
            for instance in dependents {
                failures.extend(self.cleaner.remove_instance(&instance).await);
                match self.instances.remove(&instance.id) {
                    Ok(_) => removed_instances.push(instance.id),
                    Err(InstanceError::NotFound(_)) => {
                        debug!("Instance {} was removed concurrently.", instance.id)
                    }
                    Err(err) => failures.push(err.to_string()),
                }
            }
        }

        let tunnel_removed = {
            let _provisioning = self.tunnel_lock.lock().await;
            match self.cleaner.remove_tunnel(&proxy.hash()).await {
                Ok(()) => true,
                Err(err) => {
                    error!("Failed to remove tunnel of proxy {proxy}: {err}");
                    failures.push(format!("tunnel: {err}"));
                    false
                }
            }
        };

        let proxy = self.proxies.remove(proxy_id)?;
        self.set_state(proxy_id, TeardownState::Removed);
        info!(
            "Proxy {proxy} removed with {} instances.",
            removed_instances.len()
        );
        Ok(TeardownReport {
            proxy,
            removed_instances,
            failures,
            tunnel_removed,
        })
    }

    fn set_state(&self, proxy_id: &Uuid, state: TeardownState) {
        self.sessions().insert(*proxy_id, state);
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, TeardownState>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
