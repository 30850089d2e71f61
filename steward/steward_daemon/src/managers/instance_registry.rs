use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;
use uuid::Uuid;

use super::instance::{AppInstance, InstanceError, InstanceStatus};

#[derive(Default)]
struct InstanceIndex {
    instances: HashMap<String, AppInstance>,
    by_app: HashMap<String, BTreeSet<String>>,
    by_proxy: HashMap<Uuid, BTreeSet<String>>,
    pending_local: HashSet<String>,
}

impl InstanceIndex {
    fn has_local(&self, app_id: &str) -> bool {
        self.by_app.get(app_id).is_some_and(|ids| {
            ids.iter()
                .filter_map(|id| self.instances.get(id))
                .any(AppInstance::is_local)
        })
    }

    fn insert(&mut self, instance: AppInstance) -> Result<(), InstanceError> {
        if self.instances.contains_key(&instance.id) {
            return Err(InstanceError::DuplicateId(instance.id));
        }
        if instance.is_local() && self.has_local(&instance.app_id) {
            return Err(InstanceError::LocalInstanceExists(instance.app_id));
        }
        self.by_app
            .entry(instance.app_id.clone())
            .or_default()
            .insert(instance.id.clone());
        if let Some(proxy_id) = instance.proxy_id {
            self.by_proxy
                .entry(proxy_id)
                .or_default()
                .insert(instance.id.clone());
        }
        self.instances.insert(instance.id.clone(), instance);
        Ok(())
    }

    fn remove(&mut self, id: &str) -> Result<AppInstance, InstanceError> {
        let instance = self
            .instances
            .remove(id)
            .ok_or_else(|| InstanceError::NotFound(id.to_string()))?;
        Self::unlink(&mut self.by_app, &instance.app_id, id);
        if let Some(proxy_id) = instance.proxy_id {
            Self::unlink(&mut self.by_proxy, &proxy_id, id);
        }
        Ok(instance)
    }

    fn unlink<K: std::hash::Hash + Eq + Clone>(
        index: &mut HashMap<K, BTreeSet<String>>,
        key: &K,
        id: &str,
    ) {
        if let Some(ids) = index.get_mut(key) {
            ids.remove(id);
            if ids.is_empty() {
                index.remove(key);
            }
        }
    }

    fn collect(&self, ids: Option<&BTreeSet<String>>) -> Vec<AppInstance> {
        ids.map(|ids| {
            ids.iter()
                .filter_map(|id| self.instances.get(id))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
    }
}

/// Authoritative set of app instances plus the by-app and by-proxy indexes.
/// Every mutation updates all three under one write lock.
#[derive(Default)]
pub struct InstanceRegistry {
    index: RwLock<InstanceIndex>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, instance: AppInstance) -> Result<(), InstanceError> {
        let mut index = self.write();
        if instance.is_local() && index.pending_local.contains(&instance.app_id) {
            return Err(InstanceError::LocalInstanceExists(instance.app_id));
        }
        debug!("Adding instance: {}", instance.id);
        index.insert(instance)
    }

    pub fn remove(&self, id: &str) -> Result<AppInstance, InstanceError> {
        let instance = self.write().remove(id)?;
        debug!("Removed instance: {id}");
        Ok(instance)
    }

    pub fn get(&self, id: &str) -> Result<AppInstance, InstanceError> {
        self.read()
            .instances
            .get(id)
            .cloned()
            .ok_or_else(|| InstanceError::NotFound(id.to_string()))
    }

    pub fn by_app(&self, app_id: &str) -> Vec<AppInstance> {
        let index = self.read();
        index.collect(index.by_app.get(app_id))
    }

    pub fn by_proxy(&self, proxy_id: &Uuid) -> Vec<AppInstance> {
        let index = self.read();
        index.collect(index.by_proxy.get(proxy_id))
    }

    pub fn all(&self) -> Vec<AppInstance> {
        let mut instances: Vec<AppInstance> = self.read().instances.values().cloned().collect();
        instances.sort_by(|left, right| left.id.cmp(&right.id));
        instances
    }

    /// The instance of `app_id` behind `proxy_id`, or its local instance for `None`.
    pub fn find(&self, app_id: &str, proxy_id: Option<&Uuid>) -> Option<AppInstance> {
        let index = self.read();
        index.by_app.get(app_id).and_then(|ids| {
            ids.iter()
                .filter_map(|id| index.instances.get(id))
                .find(|instance| instance.proxy_id.as_ref() == proxy_id)
                .cloned()
        })
    }

    pub fn local_instance(&self, app_id: &str) -> Option<AppInstance> {
        self.find(app_id, None)
    }

    pub fn update_status(&self, id: &str, status: InstanceStatus) -> Result<(), InstanceError> {
        self.update(id, |instance| instance.status = status)
    }

    pub fn update_container_id(&self, id: &str, container_id: &str) -> Result<(), InstanceError> {
        self.update(id, |instance| instance.container_id = container_id.to_string())
    }

    /// Host ports recorded on every known instance.
    pub fn reserved_host_ports(&self) -> HashSet<u16> {
        self.read()
            .instances
            .values()
            .flat_map(AppInstance::host_ports)
            .collect()
    }

    /// Claims the single local slot of `app_id` until the returned reservation
    /// is committed or dropped.
    pub fn reserve_local(&self, app_id: &str) -> Result<LocalReservation<'_>, InstanceError> {
        let mut index = self.write();
        if index.has_local(app_id) || index.pending_local.contains(app_id) {
            return Err(InstanceError::LocalInstanceExists(app_id.to_string()));
        }
        index.pending_local.insert(app_id.to_string());
        Ok(LocalReservation {
            registry: self,
            app_id: app_id.to_string(),
            committed: false,
        })
    }

    fn update(
        &self,
        id: &str,
        change: impl FnOnce(&mut AppInstance),
    ) -> Result<(), InstanceError> {
        let mut index = self.write();
        let instance = index
            .instances
            .get_mut(id)
            .ok_or_else(|| InstanceError::NotFound(id.to_string()))?;
        change(instance);
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, InstanceIndex> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, InstanceIndex> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct LocalReservation<'a> {
    registry: &'a InstanceRegistry,
    app_id: String,
    committed: bool,
}

impl LocalReservation<'_> {
    /// Releases the slot and inserts `instance` in the same critical section.
    pub fn commit(mut self, instance: AppInstance) -> Result<(), InstanceError> {
        let mut index = self.registry.write();
        index.pending_local.remove(&self.app_id);
        self.committed = true;
        index.insert(instance)
    }
}

impl Drop for LocalReservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.registry.write().pending_local.remove(&self.app_id);
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use uuid::Uuid;

    use super::InstanceRegistry;
    use crate::managers::instance::{AppInstance, InstanceError, InstanceStatus};
    use crate::utils::test_utilities::create_example_instance;

    #[test]
    fn add_and_get() {
        let registry = InstanceRegistry::new();
        let instance = create_example_instance("earnapp", None);
        registry.add(instance.clone()).unwrap();
        assert_eq!(registry.get(&instance.id), Ok(instance.clone()));
        assert_eq!(registry.by_app("earnapp"), vec![instance.clone()]);
        assert_eq!(registry.all(), vec![instance]);
    }

    #[test]
    fn add_duplicate_id() {
        let registry = InstanceRegistry::new();
        let instance = create_example_instance("earnapp", Some(Uuid::new_v4()));
        registry.add(instance.clone()).unwrap();
        assert_eq!(
            registry.add(instance.clone()),
            Err(InstanceError::DuplicateId(instance.id))
        );
    }

    #[test]
    fn second_local_instance_is_rejected() {
        let registry = InstanceRegistry::new();
        registry
            .add(create_example_instance("earnapp", None))
            .unwrap();
        let mut second = create_example_instance("earnapp", None);
        second.id = String::from("earnapp_other_local_1");
        assert_eq!(
            registry.add(second),
            Err(InstanceError::LocalInstanceExists(String::from("earnapp")))
        );
        assert_eq!(registry.by_app("earnapp").len(), 1);
    }

    #[test]
    fn remove_updates_every_index() {
        let registry = InstanceRegistry::new();
        let proxy_id = Uuid::new_v4();
        let instance = create_example_instance("honeygain", Some(proxy_id));
        registry.add(instance.clone()).unwrap();

        assert_eq!(registry.remove(&instance.id), Ok(instance.clone()));
        assert!(registry.by_app("honeygain").is_empty());
        assert!(registry.by_proxy(&proxy_id).is_empty());
        assert_eq!(
            registry.get(&instance.id),
            Err(InstanceError::NotFound(instance.id.clone()))
        );
        assert_eq!(
            registry.remove(&instance.id),
            Err(InstanceError::NotFound(instance.id))
        );
    }

    #[test]
    fn indexes_match_filtered_instances() {
        let registry = InstanceRegistry::new();
        let proxies = [Uuid::new_v4(), Uuid::new_v4()];
        let mut added = vec![];
        for app in ["earnapp", "honeygain", "repocket"] {
            registry.add(create_example_instance(app, None)).unwrap();
            for proxy_id in proxies {
                let instance = create_example_instance(app, Some(proxy_id));
                added.push(instance.id.clone());
                registry.add(instance).unwrap();
            }
        }
        registry.remove(&added[1]).unwrap();
        registry.remove(&added[4]).unwrap();
        registry
            .remove(&create_example_instance("repocket", None).id)
            .unwrap();

        let all = registry.all();
        for app in ["earnapp", "honeygain", "repocket"] {
            let mut expected: Vec<AppInstance> = all
                .iter()
                .filter(|instance| instance.app_id == app)
                .cloned()
                .collect();
            let mut indexed = registry.by_app(app);
            expected.sort_by(|l, r| l.id.cmp(&r.id));
            indexed.sort_by(|l, r| l.id.cmp(&r.id));
            assert_eq!(indexed, expected);
        }
        for proxy_id in proxies {
            let mut expected: Vec<AppInstance> = all
                .iter()
                .filter(|instance| instance.proxy_id == Some(proxy_id))
                .cloned()
                .collect();
            let mut indexed = registry.by_proxy(&proxy_id);
            expected.sort_by(|l, r| l.id.cmp(&r.id));
            indexed.sort_by(|l, r| l.id.cmp(&r.id));
            assert_eq!(indexed, expected);
        }
        assert_eq!(all.len(), 6);
    }

    #[test]
    fn find_by_scope() {
        let registry = InstanceRegistry::new();
        let proxy_id = Uuid::new_v4();
        let local = create_example_instance("earnapp", None);
        let proxied = create_example_instance("earnapp", Some(proxy_id));
        registry.add(local.clone()).unwrap();
        registry.add(proxied.clone()).unwrap();

        assert_eq!(registry.local_instance("earnapp"), Some(local));
        assert_eq!(registry.find("earnapp", Some(&proxy_id)), Some(proxied));
        assert_eq!(registry.find("earnapp", Some(&Uuid::new_v4())), None);
        assert_eq!(registry.local_instance("honeygain"), None);
    }

    #[test]
    fn update_fields() {
        let registry = InstanceRegistry::new();
        let instance = create_example_instance("earnapp", None);
        registry.add(instance.clone()).unwrap();

        registry
            .update_status(&instance.id, InstanceStatus::Stopped)
            .unwrap();
        registry
            .update_container_id(&instance.id, "feedbeef")
            .unwrap();

        let updated = registry.get(&instance.id).unwrap();
        assert_eq!(updated.status, InstanceStatus::Stopped);
        assert_eq!(updated.container_id, "feedbeef");
        assert_eq!(
            registry.update_status("missing", InstanceStatus::Running),
            Err(InstanceError::NotFound(String::from("missing")))
        );
    }

    #[test]
    fn reserved_host_ports() {
        let registry = InstanceRegistry::new();
        registry
            .add(create_example_instance("earnapp", None))
            .unwrap();
        assert!(registry.reserved_host_ports().contains(&8080));
    }

    #[test]
    fn reservation_blocks_second_local_deploy() {
        let registry = InstanceRegistry::new();
        let reservation = registry.reserve_local("earnapp").unwrap();
        assert!(matches!(
            registry.reserve_local("earnapp"),
            Err(InstanceError::LocalInstanceExists(_))
        ));
        assert_eq!(
            registry.add(create_example_instance("earnapp", None)),
            Err(InstanceError::LocalInstanceExists(String::from("earnapp")))
        );
        reservation
            .commit(create_example_instance("earnapp", None))
            .unwrap();
        assert!(registry.local_instance("earnapp").is_some());
        assert!(registry.reserve_local("earnapp").is_err());
    }

    #[test]
    fn dropped_reservation_releases_slot() {
        let registry = InstanceRegistry::new();
        {
            let _reservation = registry.reserve_local("earnapp").unwrap();
        }
        assert!(registry.reserve_local("earnapp").is_ok());
    }

    #[test]
    fn concurrent_reservations_grant_one_slot() {
        let registry = Arc::new(InstanceRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    registry
                        .reserve_local("earnapp")
                        .and_then(|reservation| {
                            reservation.commit(create_example_instance("earnapp", None))
                        })
                        .is_ok()
                })
            })
            .collect();
        let granted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|granted| *granted)
            .count();
        assert_eq!(granted, 1);
        assert_eq!(registry.by_app("earnapp").len(), 1);
    }

    #[test]
    fn indexes_agree_under_concurrent_writers() {
        const WRITERS: usize = 4;
        const ROUNDS: usize = 200;
        let registry = Arc::new(InstanceRegistry::new());
        let scopes: Arc<Vec<(String, Uuid)>> = Arc::new(
            (0..WRITERS)
                .map(|index| (format!("app-{index}"), Uuid::new_v4()))
                .collect(),
        );
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..WRITERS)
            .map(|_| {
                let (registry, scopes, done) = (registry.clone(), scopes.clone(), done.clone());
                std::thread::spawn(move || {
                    while !done.load(Ordering::Acquire) {
                        assert!(registry.all().len() <= WRITERS);
                        for (app_id, proxy_id) in scopes.iter() {
                            let by_proxy = registry.by_proxy(proxy_id);
                            assert!(by_proxy.len() <= 1);
                            assert!(by_proxy.iter().all(|instance| {
                                instance.proxy_id == Some(*proxy_id) && &instance.app_id == app_id
                            }));
                            let by_app = registry.by_app(app_id);
                            assert!(by_app.len() <= 1);
                            assert!(by_app
                                .iter()
                                .all(|instance| instance.proxy_id == Some(*proxy_id)));
                        }
                    }
                })
            })
            .collect();

        let writers: Vec<_> = (0..WRITERS)
            .map(|index| {
                let (registry, scopes) = (registry.clone(), scopes.clone());
                std::thread::spawn(move || {
                    let (app_id, proxy_id) = &scopes[index];
                    for round in 0..ROUNDS {
                        let mut instance = create_example_instance(app_id, Some(*proxy_id));
                        instance.id = format!("{app_id}-{round}");
                        registry.add(instance.clone()).unwrap();
                        assert_eq!(registry.by_app(app_id), vec![instance.clone()]);
                        assert_eq!(registry.by_proxy(proxy_id), vec![instance.clone()]);
                        assert_eq!(registry.remove(&instance.id), Ok(instance));
                        assert!(registry.by_app(app_id).is_empty());
                        assert!(registry.by_proxy(proxy_id).is_empty());
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
        assert!(registry.all().is_empty());
    }
}
