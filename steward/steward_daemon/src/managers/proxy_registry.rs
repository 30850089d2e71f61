use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use log::{debug, info};
use uuid::Uuid;

use super::proxy::{Proxy, ProxyError, ProxyHealth, ProxyProbe};

pub type ProxyCallback = Box<dyn Fn(&Proxy) + Send + Sync>;

#[derive(Default)]
struct ProxyState {
    proxies: HashMap<Uuid, Proxy>,
    health: HashMap<Uuid, ProxyHealth>,
    retiring: HashSet<Uuid>,
}

/// Owns every known proxy and its health. Lock guards never outlive a method
/// call, so probes and callbacks always run unlocked.
pub struct ProxyRegistry {
    state: RwLock<ProxyState>,
    probe: Box<dyn ProxyProbe + Send + Sync>,
    on_added: Option<ProxyCallback>,
    on_removed: Option<ProxyCallback>,
}

impl ProxyRegistry {
    pub fn new(probe: Box<dyn ProxyProbe + Send + Sync>) -> Self {
        Self {
            state: RwLock::new(ProxyState::default()),
            probe,
            on_added: None,
            on_removed: None,
        }
    }

    pub fn with_added_callback(mut self, callback: ProxyCallback) -> Self {
        self.on_added = Some(callback);
        self
    }

    pub fn with_removed_callback(mut self, callback: ProxyCallback) -> Self {
        self.on_removed = Some(callback);
        self
    }

    pub fn add(&self, uri: &str) -> Result<Proxy, ProxyError> {
        let proxy = Proxy::parse(uri)?;
        {
            let mut state = self.write();
            state.proxies.insert(proxy.id, proxy.clone());
            state.health.insert(proxy.id, ProxyHealth::default());
        }
        info!("Added proxy: {proxy}");
        if let Some(callback) = &self.on_added {
            callback(&proxy);
        }
        Ok(proxy)
    }

    /// Deletes the proxy and its health record. Instances routed through the
    /// proxy are left untouched.
    pub fn remove(&self, id: &Uuid) -> Result<Proxy, ProxyError> {
        let proxy = {
            let mut state = self.write();
            let proxy = state.proxies.remove(id).ok_or(ProxyError::NotFound(*id))?;
            state.health.remove(id);
            state.retiring.remove(id);
            proxy
        };
        info!("Removed proxy: {proxy}");
        if let Some(callback) = &self.on_removed {
            callback(&proxy);
        }
        Ok(proxy)
    }

    pub fn get(&self, id: &Uuid) -> Result<Proxy, ProxyError> {
        self.read()
            .proxies
            .get(id)
            .cloned()
            .ok_or(ProxyError::NotFound(*id))
    }

    /// Like [`ProxyRegistry::get`] but proxies scheduled for removal are hidden.
    pub fn get_active(&self, id: &Uuid) -> Result<Proxy, ProxyError> {
        let state = self.read();
        Self::active_proxy(&state, id).cloned()
    }

    pub fn is_active(&self, id: &Uuid) -> bool {
        let state = self.read();
        Self::active_proxy(&state, id).is_ok()
    }

    /// Runs `operation` while the proxy is guaranteed to stay active. Used to
    /// commit state that references the proxy.
    pub fn with_active<T>(
        &self,
        id: &Uuid,
        operation: impl FnOnce(&Proxy) -> T,
    ) -> Result<T, ProxyError> {
        let state = self.read();
        let proxy = Self::active_proxy(&state, id)?;
        Ok(operation(proxy))
    }

    /// Marks the proxy for removal. Only the first caller succeeds, everyone
    /// else observes `NotFound`.
    pub fn retire(&self, id: &Uuid) -> Result<Proxy, ProxyError> {
        let mut state = self.write();
        let proxy = Self::active_proxy(&state, id)?.clone();
        state.retiring.insert(*id);
        debug!("Proxy {proxy} is retiring.");
        Ok(proxy)
    }

    pub fn health(&self, id: &Uuid) -> Result<ProxyHealth, ProxyError> {
        self.read()
            .health
            .get(id)
            .cloned()
            .ok_or(ProxyError::NotFound(*id))
    }

    pub fn list(&self) -> Vec<(Proxy, ProxyHealth)> {
        let state = self.read();
        let mut proxies: Vec<(Proxy, ProxyHealth)> = state
            .proxies
            .values()
            .map(|proxy| {
                (
                    proxy.clone(),
                    state.health.get(&proxy.id).cloned().unwrap_or_default(),
                )
            })
            .collect();
        proxies.sort_by(|(left, _), (right, _)| {
            (&left.host, left.port, left.id).cmp(&(&right.host, right.port, right.id))
        });
        proxies
    }

    pub async fn test_connectivity(&self, proxy: &Proxy) -> Result<Duration, ProxyError> {
        self.probe.test_connectivity(proxy).await
    }

    /// Probes the proxy and stores the resulting health. The probe runs without
    /// holding the lock; a proxy removed meanwhile yields `NotFound`.
    pub async fn validate(&self, id: &Uuid) -> Result<ProxyHealth, ProxyError> {
        let proxy = self.get(id)?;
        let probe_result = self.probe.test_connectivity(&proxy).await;
        let health = match &probe_result {
            Ok(latency) => ProxyHealth::healthy(*latency),
            Err(err) => ProxyHealth::unhealthy(err),
        };
        {
            let mut state = self.write();
            if !state.proxies.contains_key(id) {
                return Err(ProxyError::NotFound(*id));
            }
            state.health.insert(*id, health.clone());
        }
        debug!("Proxy {proxy} health: {:?}", health.status);
        probe_result.map(|_| health)
    }

    fn active_proxy<'a>(state: &'a ProxyState, id: &Uuid) -> Result<&'a Proxy, ProxyError> {
        match state.proxies.get(id) {
            Some(proxy) if !state.retiring.contains(id) => Ok(proxy),
            _ => Err(ProxyError::NotFound(*id)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ProxyState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ProxyState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod test {
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    };
    use std::time::Duration;

    use uuid::Uuid;

    use super::ProxyRegistry;
    use crate::managers::proxy::{HealthStatus, ProxyError};
    use crate::utils::test_utilities::{create_example_proxy_uri, MockProxyProbe};

    #[test]
    fn add_and_get() {
        let registry = create_registry(None);
        let proxy = registry.add(create_example_proxy_uri()).unwrap();
        assert_eq!(registry.get(&proxy.id), Ok(proxy.clone()));
        assert_eq!(
            registry.health(&proxy.id).unwrap().status,
            HealthStatus::Unknown
        );
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn add_rejects_malformed_uri() {
        let registry = create_registry(None);
        assert!(matches!(
            registry.add("nonsense"),
            Err(ProxyError::InvalidFormat { .. })
        ));
        assert!(registry.list().is_empty());
    }

    #[test]
    fn remove_deletes_proxy_and_health() {
        let registry = create_registry(None);
        let proxy = registry.add(create_example_proxy_uri()).unwrap();
        assert_eq!(registry.remove(&proxy.id), Ok(proxy.clone()));
        assert_eq!(registry.get(&proxy.id), Err(ProxyError::NotFound(proxy.id)));
        assert_eq!(
            registry.health(&proxy.id),
            Err(ProxyError::NotFound(proxy.id))
        );
    }

    #[test]
    fn remove_unknown_proxy() {
        let registry = create_registry(None);
        let id = Uuid::new_v4();
        assert_eq!(registry.remove(&id), Err(ProxyError::NotFound(id)));
    }

    #[test]
    fn callbacks_are_invoked() {
        let added = Arc::new(AtomicUsize::new(0));
        let removed = Arc::new(AtomicUsize::new(0));
        let added_counter = added.clone();
        let removed_counter = removed.clone();
        let registry = create_registry(None)
            .with_added_callback(Box::new(move |_| {
                added_counter.fetch_add(1, Ordering::SeqCst);
            }))
            .with_removed_callback(Box::new(move |_| {
                removed_counter.fetch_add(1, Ordering::SeqCst);
            }));

        let proxy = registry.add(create_example_proxy_uri()).unwrap();
        registry.remove(&proxy.id).unwrap();
        let _ = registry.remove(&proxy.id);

        assert_eq!(added.load(Ordering::SeqCst), 1);
        assert_eq!(removed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retire_is_granted_once() {
        let registry = create_registry(None);
        let proxy = registry.add(create_example_proxy_uri()).unwrap();

        assert_eq!(registry.retire(&proxy.id), Ok(proxy.clone()));
        assert_eq!(
            registry.retire(&proxy.id),
            Err(ProxyError::NotFound(proxy.id))
        );
        assert_eq!(
            registry.get_active(&proxy.id),
            Err(ProxyError::NotFound(proxy.id))
        );
        assert!(!registry.is_active(&proxy.id));
        assert_eq!(registry.get(&proxy.id), Ok(proxy));
    }

    #[test]
    fn with_active_refuses_retiring_proxy() {
        let registry = create_registry(None);
        let proxy = registry.add(create_example_proxy_uri()).unwrap();
        assert_eq!(registry.with_active(&proxy.id, |proxy| proxy.port), Ok(1080));
        registry.retire(&proxy.id).unwrap();
        assert_eq!(
            registry.with_active(&proxy.id, |proxy| proxy.port),
            Err(ProxyError::NotFound(proxy.id))
        );
    }

    #[tokio::test]
    async fn validate_records_healthy_probe() {
        let mut probe = MockProxyProbe::new();
        probe
            .expect_test_connectivity()
            .returning(|_| Ok(Duration::from_millis(42)));
        let registry = create_registry(Some(probe));
        let proxy = registry.add(create_example_proxy_uri()).unwrap();

        let health = registry.validate(&proxy.id).await.unwrap();

        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.latency, Some(Duration::from_millis(42)));
        assert!(health.checked_at.is_some());
        assert_eq!(registry.health(&proxy.id), Ok(health));
    }

    #[tokio::test]
    async fn validate_records_failed_probe() {
        let mut probe = MockProxyProbe::new();
        probe
            .expect_test_connectivity()
            .returning(|_| Err(ProxyError::ConnectFailed(String::from("refused"))));
        let registry = create_registry(Some(probe));
        let proxy = registry.add(create_example_proxy_uri()).unwrap();

        assert_eq!(
            registry.validate(&proxy.id).await,
            Err(ProxyError::ConnectFailed(String::from("refused")))
        );
        let health = registry.health(&proxy.id).unwrap();
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert_eq!(
            health.last_error,
            Some(ProxyError::ConnectFailed(String::from("refused")).to_string())
        );
    }

    #[tokio::test]
    async fn validate_unknown_proxy_does_not_probe() {
        let mut probe = MockProxyProbe::new();
        probe.expect_test_connectivity().never();
        let registry = create_registry(Some(probe));
        let id = Uuid::new_v4();
        assert_eq!(registry.validate(&id).await, Err(ProxyError::NotFound(id)));
    }

    #[test]
    fn list_and_get_do_not_probe() {
        let mut probe = MockProxyProbe::new();
        probe.expect_test_connectivity().never();
        let registry = create_registry(Some(probe));
        let proxy = registry.add(create_example_proxy_uri()).unwrap();
        let _ = registry.get(&proxy.id);
        let _ = registry.list();
    }

    #[test]
    fn list_stays_consistent_under_concurrent_writers() {
        const WRITERS: usize = 4;
        const ROUNDS: usize = 200;
        let added = Arc::new(AtomicUsize::new(0));
        let removed = Arc::new(AtomicUsize::new(0));
        let (on_added, on_removed) = (added.clone(), removed.clone());
        let registry = Arc::new(
            create_registry(None)
                .with_added_callback(Box::new(move |_| {
                    on_added.fetch_add(1, Ordering::SeqCst);
                }))
                .with_removed_callback(Box::new(move |_| {
                    on_removed.fetch_add(1, Ordering::SeqCst);
                })),
        );
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..WRITERS)
            .map(|_| {
                let (registry, done) = (registry.clone(), done.clone());
                std::thread::spawn(move || {
                    while !done.load(Ordering::Acquire) {
                        let listed = registry.list();
                        assert!(listed.len() <= WRITERS);
                        assert!(listed
                            .iter()
                            .all(|(proxy, health)| health.status == HealthStatus::Unknown
                                && proxy.host == "1.2.3.4"));
                    }
                })
            })
            .collect();

        let writers: Vec<_> = (0..WRITERS)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..ROUNDS {
                        let proxy = registry.add(create_example_proxy_uri()).unwrap();
                        assert!(registry.health(&proxy.id).is_ok());
                        assert!(registry.list().iter().any(|(listed, _)| listed.id == proxy.id));
                        assert_eq!(registry.remove(&proxy.id), Ok(proxy.clone()));
                        assert_eq!(registry.health(&proxy.id), Err(ProxyError::NotFound(proxy.id)));
                        assert!(registry.list().iter().all(|(listed, _)| listed.id != proxy.id));
                    }
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }
        done.store(true, Ordering::Release);
        for reader in readers {
            reader.join().unwrap();
        }
        assert!(registry.list().is_empty());
        assert_eq!(added.load(Ordering::SeqCst), WRITERS * ROUNDS);
        assert_eq!(removed.load(Ordering::SeqCst), WRITERS * ROUNDS);
    }

    fn create_registry(probe: Option<MockProxyProbe>) -> ProxyRegistry {
        ProxyRegistry::new(Box::new(probe.unwrap_or_default()))
    }
}
