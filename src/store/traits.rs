// ABOUTME: Store capability traits, one per resource kind.
// ABOUTME: Every mutation is a field-level update so concurrent writers never clobber each other.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::net::IpAddr;

use crate::resources::{
    AppServer, Instance, LoadBalancingServer, NewAppServer, NewInstance, NewLoadBalancer, Server,
};
use crate::types::{AppServerId, InstanceId, LoadBalancerId, ServerId};

use super::{ResourceKey, StoreError};

/// Persisted state identifiers of any stateful resource.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read the persisted `state_id` of `key`.
    async fn load_state(&self, key: ResourceKey) -> Result<String, StoreError>;

    /// Set the state field of `key` to `new` if it still holds `expected`.
    ///
    /// Returns `false` without writing when another writer changed the state
    /// first. Touches no other field.
    async fn swap_state(
        &self,
        key: ResourceKey,
        expected: &str,
        new: &str,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait InstanceStore: Send + Sync {
    async fn create_instance(
        &self,
        new: NewInstance,
        now: DateTime<Utc>,
    ) -> Result<Instance, StoreError>;

    async fn instance(&self, id: InstanceId) -> Result<Instance, StoreError>;

    async fn instances(&self) -> Result<Vec<Instance>, StoreError>;

    /// Instances currently bound to `lb`, ordered by id.
    async fn instances_for_load_balancer(
        &self,
        lb: LoadBalancerId,
    ) -> Result<Vec<Instance>, StoreError>;

    async fn set_successfully_provisioned(
        &self,
        id: InstanceId,
        value: bool,
    ) -> Result<(), StoreError>;

    async fn add_tag(&self, id: InstanceId, tag: &str) -> Result<(), StoreError>;

    async fn remove_tag(&self, id: InstanceId, tag: &str) -> Result<(), StoreError>;

    async fn set_load_balancer(
        &self,
        id: InstanceId,
        lb: Option<LoadBalancerId>,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AppServerStore: Send + Sync {
    async fn create_appserver(
        &self,
        new: NewAppServer,
        now: DateTime<Utc>,
    ) -> Result<AppServer, StoreError>;

    async fn appserver(&self, id: AppServerId) -> Result<AppServer, StoreError>;

    /// Appservers of `instance`, oldest first.
    async fn appservers_for_instance(
        &self,
        instance: InstanceId,
    ) -> Result<Vec<AppServer>, StoreError>;

    /// Set `is_active`; stamps `last_activated` when `activated_at` is given.
    async fn set_appserver_active(
        &self,
        id: AppServerId,
        active: bool,
        activated_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    async fn set_appserver_terminated(
        &self,
        id: AppServerId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ServerStore: Send + Sync {
    async fn create_server(&self, name: &str, now: DateTime<Utc>) -> Result<Server, StoreError>;

    async fn server(&self, id: ServerId) -> Result<Server, StoreError>;

    async fn set_server_vm_id(&self, id: ServerId, vm_id: &str) -> Result<(), StoreError>;

    async fn set_server_public_ip(
        &self,
        id: ServerId,
        ip: Option<IpAddr>,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait LoadBalancerStore: Send + Sync {
    /// Fails with `Conflict` when the domain is already registered.
    async fn create_load_balancer(
        &self,
        new: NewLoadBalancer,
    ) -> Result<LoadBalancingServer, StoreError>;

    async fn load_balancer(&self, id: LoadBalancerId) -> Result<LoadBalancingServer, StoreError>;

    async fn load_balancers(&self) -> Result<Vec<LoadBalancingServer>, StoreError>;

    /// Atomically add one to `configuration_version`, returning the new value.
    async fn increment_configuration_version(&self, id: LoadBalancerId)
    -> Result<u64, StoreError>;

    /// Raise `deployed_configuration_version` to `version` unless it is
    /// already at or above it. Returns the resulting deployed version.
    async fn advance_deployed_configuration_version(
        &self,
        id: LoadBalancerId,
        version: u64,
    ) -> Result<u64, StoreError>;

    async fn delete_load_balancer(&self, id: LoadBalancerId) -> Result<(), StoreError>;
}

/// Everything the orchestration core persists.
pub trait Store:
    StateStore + InstanceStore + AppServerStore + ServerStore + LoadBalancerStore
{
}

impl<T> Store for T where
    T: StateStore + InstanceStore + AppServerStore + ServerStore + LoadBalancerStore
{
}
