// ABOUTME: In-memory store for single-host use, dry runs and tests.
// ABOUTME: Records every field write so callers can assert what a mutation touched.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::net::IpAddr;

use crate::fsm::ResourceState;
use crate::resources::{
    AppServer, Instance, LoadBalancingServer, NewAppServer, NewInstance, NewLoadBalancer, Server,
    appserver, instance, server,
};
use crate::types::{AppServerId, InstanceId, LoadBalancerId, ServerId};

use super::traits::{AppServerStore, InstanceStore, LoadBalancerStore, ServerStore, StateStore};
use super::{ResourceKey, ResourceKind, StoreError};

/// One field-level write performed by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreWrite {
    pub key: ResourceKey,
    pub field: &'static str,
}

#[derive(Debug, Default)]
struct Tables {
    instances: BTreeMap<InstanceId, Instance>,
    appservers: BTreeMap<AppServerId, AppServer>,
    servers: BTreeMap<ServerId, Server>,
    load_balancers: BTreeMap<LoadBalancerId, LoadBalancingServer>,
    next_id: u64,
    /// Only kept when the store was built with [`MemoryStore::recording`].
    writes: Option<Vec<StoreWrite>>,
}

impl Tables {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn reserve(&mut self, id: u64) {
        self.next_id = self.next_id.max(id);
    }

    fn record(&mut self, key: impl Into<ResourceKey>, field: &'static str) {
        if let Some(writes) = &mut self.writes {
            writes.push(StoreWrite {
                key: key.into(),
                field,
            });
        }
    }

    fn instance_mut(&mut self, id: InstanceId) -> Result<&mut Instance, StoreError> {
        self.instances
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.into()))
    }

    fn appserver_mut(&mut self, id: AppServerId) -> Result<&mut AppServer, StoreError> {
        self.appservers
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.into()))
    }

    fn server_mut(&mut self, id: ServerId) -> Result<&mut Server, StoreError> {
        self.servers
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.into()))
    }

    fn load_balancer_mut(
        &mut self,
        id: LoadBalancerId,
    ) -> Result<&mut LoadBalancingServer, StoreError> {
        self.load_balancers
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.into()))
    }
}

/// Process-local store. Ids are allocated from one counter shared by all
/// resource kinds.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that also logs every field write, so tests can assert
    /// exactly what a mutation touched.
    pub fn recording() -> Self {
        let store = Self::default();
        store.tables.lock().writes = Some(Vec::new());
        store
    }

    /// Insert a complete instance record, keeping its id.
    pub fn insert_instance(&self, instance: Instance) {
        let mut t = self.tables.lock();
        t.reserve(instance.id.get());
        t.instances.insert(instance.id, instance);
    }

    pub fn insert_appserver(&self, appserver: AppServer) {
        let mut t = self.tables.lock();
        t.reserve(appserver.id.get());
        t.appservers.insert(appserver.id, appserver);
    }

    pub fn insert_server(&self, server: Server) {
        let mut t = self.tables.lock();
        t.reserve(server.id.get());
        t.servers.insert(server.id, server);
    }

    pub fn insert_load_balancer(&self, lb: LoadBalancingServer) {
        let mut t = self.tables.lock();
        t.reserve(lb.id.get());
        t.load_balancers.insert(lb.id, lb);
    }

    pub fn contains_load_balancer(&self, id: LoadBalancerId) -> bool {
        self.tables.lock().load_balancers.contains_key(&id)
    }

    /// Every field write since creation (or the last `clear_writes`).
    /// Always empty unless the store is recording.
    pub fn writes(&self) -> Vec<StoreWrite> {
        self.tables.lock().writes.clone().unwrap_or_default()
    }

    /// Writes that touched `key`.
    pub fn writes_for(&self, key: impl Into<ResourceKey>) -> Vec<StoreWrite> {
        let key = key.into();
        self.writes().into_iter().filter(|w| w.key == key).collect()
    }

    pub fn clear_writes(&self) {
        if let Some(writes) = &mut self.tables.lock().writes {
            writes.clear();
        }
    }
}

fn parse_state<S: ResourceState>(
    states: &crate::fsm::StateSet<S>,
    key: ResourceKey,
    state_id: &str,
) -> Result<S, StoreError> {
    states
        .from_state_id(state_id)
        .ok_or_else(|| StoreError::InvalidState {
            key,
            state_id: state_id.to_string(),
        })
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load_state(&self, key: ResourceKey) -> Result<String, StoreError> {
        let t = self.tables.lock();
        let state_id = match key.kind {
            ResourceKind::Instance => t
                .instances
                .get(&InstanceId::new(key.id))
                .map(|r| r.status.state_id()),
            ResourceKind::AppServer => t
                .appservers
                .get(&AppServerId::new(key.id))
                .map(|r| r.status.state_id()),
            ResourceKind::Server => t
                .servers
                .get(&ServerId::new(key.id))
                .map(|r| r.status.state_id()),
            ResourceKind::LoadBalancer => {
                return Err(StoreError::InvalidState {
                    key,
                    state_id: String::new(),
                });
            }
        };
        state_id
            .map(str::to_string)
            .ok_or(StoreError::NotFound(key))
    }

    async fn swap_state(
        &self,
        key: ResourceKey,
        expected: &str,
        new: &str,
    ) -> Result<bool, StoreError> {
        let mut t = self.tables.lock();
        let swapped = match key.kind {
            ResourceKind::Instance => {
                let new = parse_state(instance::machine().states(), key, new)?;
                let record = t.instance_mut(InstanceId::new(key.id))?;
                if record.status.state_id() != expected {
                    false
                } else {
                    record.status = new;
                    true
                }
            }
            ResourceKind::AppServer => {
                let new = parse_state(appserver::machine().states(), key, new)?;
                let record = t.appserver_mut(AppServerId::new(key.id))?;
                if record.status.state_id() != expected {
                    false
                } else {
                    record.status = new;
                    true
                }
            }
            ResourceKind::Server => {
                let new = parse_state(server::machine().states(), key, new)?;
                let record = t.server_mut(ServerId::new(key.id))?;
                if record.status.state_id() != expected {
                    false
                } else {
                    record.status = new;
                    true
                }
            }
            ResourceKind::LoadBalancer => {
                return Err(StoreError::InvalidState {
                    key,
                    state_id: new.to_string(),
                });
            }
        };
        if swapped {
            t.record(key, "status");
        }
        Ok(swapped)
    }
}

#[async_trait]
impl InstanceStore for MemoryStore {
    async fn create_instance(
        &self,
        new: NewInstance,
        now: DateTime<Utc>,
    ) -> Result<Instance, StoreError> {
        let mut t = self.tables.lock();
        let id = InstanceId::new(t.allocate());
        let record = Instance::new(id, new, now);
        t.instances.insert(id, record.clone());
        t.record(id, "*");
        Ok(record)
    }

    async fn instance(&self, id: InstanceId) -> Result<Instance, StoreError> {
        self.tables
            .lock()
            .instances
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.into()))
    }

    async fn instances(&self) -> Result<Vec<Instance>, StoreError> {
        Ok(self.tables.lock().instances.values().cloned().collect())
    }

    async fn instances_for_load_balancer(
        &self,
        lb: LoadBalancerId,
    ) -> Result<Vec<Instance>, StoreError> {
        Ok(self
            .tables
            .lock()
            .instances
            .values()
            .filter(|i| i.load_balancing_server == Some(lb))
            .cloned()
            .collect())
    }

    async fn set_successfully_provisioned(
        &self,
        id: InstanceId,
        value: bool,
    ) -> Result<(), StoreError> {
        let mut t = self.tables.lock();
        t.instance_mut(id)?.successfully_provisioned = value;
        t.record(id, "successfully_provisioned");
        Ok(())
    }

    async fn add_tag(&self, id: InstanceId, tag: &str) -> Result<(), StoreError> {
        let mut t = self.tables.lock();
        t.instance_mut(id)?.tags.insert(tag.to_string());
        t.record(id, "tags");
        Ok(())
    }

    async fn remove_tag(&self, id: InstanceId, tag: &str) -> Result<(), StoreError> {
        let mut t = self.tables.lock();
        t.instance_mut(id)?.tags.remove(tag);
        t.record(id, "tags");
        Ok(())
    }

    async fn set_load_balancer(
        &self,
        id: InstanceId,
        lb: Option<LoadBalancerId>,
    ) -> Result<(), StoreError> {
        let mut t = self.tables.lock();
        t.instance_mut(id)?.load_balancing_server = lb;
        t.record(id, "load_balancing_server");
        Ok(())
    }
}

#[async_trait]
impl AppServerStore for MemoryStore {
    async fn create_appserver(
        &self,
        new: NewAppServer,
        now: DateTime<Utc>,
    ) -> Result<AppServer, StoreError> {
        let mut t = self.tables.lock();
        if !t.instances.contains_key(&new.instance_id) {
            return Err(StoreError::NotFound(new.instance_id.into()));
        }
        if !t.servers.contains_key(&new.server_id) {
            return Err(StoreError::NotFound(new.server_id.into()));
        }
        let id = AppServerId::new(t.allocate());
        let record = AppServer::new(id, new, now);
        t.appservers.insert(id, record.clone());
        t.record(id, "*");
        Ok(record)
    }

    async fn appserver(&self, id: AppServerId) -> Result<AppServer, StoreError> {
        self.tables
            .lock()
            .appservers
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.into()))
    }

    async fn appservers_for_instance(
        &self,
        instance: InstanceId,
    ) -> Result<Vec<AppServer>, StoreError> {
        let mut list: Vec<AppServer> = self
            .tables
            .lock()
            .appservers
            .values()
            .filter(|a| a.instance_id == instance)
            .cloned()
            .collect();
        list.sort_by_key(|a| (a.created, a.id));
        Ok(list)
    }

    async fn set_appserver_active(
        &self,
        id: AppServerId,
        active: bool,
        activated_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut t = self.tables.lock();
        let record = t.appserver_mut(id)?;
        record.is_active = active;
        let stamped = activated_at.is_some();
        if let Some(at) = activated_at {
            record.last_activated = Some(at);
        }
        t.record(id, "is_active");
        if stamped {
            t.record(id, "last_activated");
        }
        Ok(())
    }

    async fn set_appserver_terminated(
        &self,
        id: AppServerId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut t = self.tables.lock();
        t.appserver_mut(id)?.terminated = Some(at);
        t.record(id, "terminated");
        Ok(())
    }
}

#[async_trait]
impl ServerStore for MemoryStore {
    async fn create_server(&self, name: &str, now: DateTime<Utc>) -> Result<Server, StoreError> {
        let mut t = self.tables.lock();
        let id = ServerId::new(t.allocate());
        let record = Server::new(id, name, now);
        t.servers.insert(id, record.clone());
        t.record(id, "*");
        Ok(record)
    }

    async fn server(&self, id: ServerId) -> Result<Server, StoreError> {
        self.tables
            .lock()
            .servers
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.into()))
    }

    async fn set_server_vm_id(&self, id: ServerId, vm_id: &str) -> Result<(), StoreError> {
        let mut t = self.tables.lock();
        t.server_mut(id)?.vm_id = Some(vm_id.to_string());
        t.record(id, "vm_id");
        Ok(())
    }

    async fn set_server_public_ip(
        &self,
        id: ServerId,
        ip: Option<IpAddr>,
    ) -> Result<(), StoreError> {
        let mut t = self.tables.lock();
        t.server_mut(id)?.public_ip = ip;
        t.record(id, "public_ip");
        Ok(())
    }
}

#[async_trait]
impl LoadBalancerStore for MemoryStore {
    async fn create_load_balancer(
        &self,
        new: NewLoadBalancer,
    ) -> Result<LoadBalancingServer, StoreError> {
        let mut t = self.tables.lock();
        if t.load_balancers.values().any(|lb| lb.domain == new.domain) {
            return Err(StoreError::Conflict(format!(
                "load balancer domain '{}' already registered",
                new.domain
            )));
        }
        let id = LoadBalancerId::new(t.allocate());
        let record = LoadBalancingServer::new(id, new);
        t.load_balancers.insert(id, record.clone());
        t.record(id, "*");
        Ok(record)
    }

    async fn load_balancer(&self, id: LoadBalancerId) -> Result<LoadBalancingServer, StoreError> {
        self.tables
            .lock()
            .load_balancers
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.into()))
    }

    async fn load_balancers(&self) -> Result<Vec<LoadBalancingServer>, StoreError> {
        Ok(self.tables.lock().load_balancers.values().cloned().collect())
    }

    async fn increment_configuration_version(
        &self,
        id: LoadBalancerId,
    ) -> Result<u64, StoreError> {
        let mut t = self.tables.lock();
        let record = t.load_balancer_mut(id)?;
        record.configuration_version += 1;
        let version = record.configuration_version;
        t.record(id, "configuration_version");
        Ok(version)
    }

    async fn advance_deployed_configuration_version(
        &self,
        id: LoadBalancerId,
        version: u64,
    ) -> Result<u64, StoreError> {
        let mut t = self.tables.lock();
        let record = t.load_balancer_mut(id)?;
        if version <= record.deployed_configuration_version {
            return Ok(record.deployed_configuration_version);
        }
        record.deployed_configuration_version = version;
        t.record(id, "deployed_configuration_version");
        Ok(version)
    }

    async fn delete_load_balancer(&self, id: LoadBalancerId) -> Result<(), StoreError> {
        let mut t = self.tables.lock();
        if t.instances.values().any(|i| i.load_balancing_server == Some(id)) {
            return Err(StoreError::Conflict(format!(
                "load balancer {id} still has instances bound to it"
            )));
        }
        t.load_balancers
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(id.into()))?;
        t.record(id, "*");
        Ok(())
    }
}
