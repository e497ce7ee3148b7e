// ABOUTME: YAML fleet snapshot used to seed a MemoryStore for dry runs.
// ABOUTME: Statuses are read by state_id and checked against each resource's state-set.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::path::Path;

use crate::error::{Error, Result};
use crate::fsm::{ResourceState, StateSet};
use crate::resources::{
    AppServer, ConfigurationSnapshot, Instance, InstanceDomain, InstanceSettings,
    LoadBalancingServer, NewAppServer, NewInstance, NewLoadBalancer, Server, appserver, instance,
    server,
};
use crate::types::{AppServerId, DomainName, InstanceId, LoadBalancerId, ServerId};

use super::{MemoryStore, ResourceKey, StoreError};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FleetSnapshot {
    #[serde(default)]
    pub load_balancers: Vec<LoadBalancerRecord>,
    #[serde(default)]
    pub instances: Vec<InstanceRecord>,
    #[serde(default)]
    pub servers: Vec<ServerRecord>,
    #[serde(default)]
    pub appservers: Vec<AppServerRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadBalancerRecord {
    pub id: LoadBalancerId,
    pub domain: DomainName,
    #[serde(default = "default_ssh_username")]
    pub ssh_username: String,
    #[serde(default = "default_true")]
    pub accepts_new_backends: bool,
    #[serde(default)]
    pub fragment_name_postfix: Option<String>,
    #[serde(default = "default_version")]
    pub configuration_version: u64,
    #[serde(default)]
    pub deployed_configuration_version: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceRecord {
    pub id: InstanceId,
    pub name: String,
    #[serde(default)]
    pub domains: Vec<InstanceDomain>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub load_balancing_server: Option<LoadBalancerId>,
    #[serde(default)]
    pub successfully_provisioned: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub settings: InstanceSettings,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerRecord {
    pub id: ServerId,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub vm_id: Option<String>,
    #[serde(default)]
    pub public_ip: Option<IpAddr>,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppServerRecord {
    pub id: AppServerId,
    pub instance_id: InstanceId,
    pub server_id: ServerId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub last_activated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub terminated: Option<DateTime<Utc>>,
    /// Frozen configuration; captured from the instance when omitted.
    #[serde(default)]
    pub snapshot: Option<ConfigurationSnapshot>,
}

fn default_ssh_username() -> String {
    "root".to_string()
}

fn default_true() -> bool {
    true
}

fn default_version() -> u64 {
    1
}

fn status_or_default<S: ResourceState>(
    states: &StateSet<S>,
    key: ResourceKey,
    status: Option<&str>,
) -> std::result::Result<S, StoreError> {
    match status {
        None => Ok(states.default_state()),
        Some(id) => states.from_state_id(id).ok_or_else(|| StoreError::InvalidState {
            key,
            state_id: id.to_string(),
        }),
    }
}

impl FleetSnapshot {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Build a store holding every record of the snapshot.
    ///
    /// Fails on undeclared statuses and on appservers or instances that
    /// reference records missing from the snapshot.
    pub fn into_store(self) -> std::result::Result<MemoryStore, StoreError> {
        let store = MemoryStore::new();

        for record in self.load_balancers {
            let mut lb = LoadBalancingServer::new(
                record.id,
                NewLoadBalancer {
                    domain: record.domain,
                    ssh_username: record.ssh_username,
                    accepts_new_backends: record.accepts_new_backends,
                },
            );
            if let Some(postfix) = record.fragment_name_postfix {
                lb.fragment_name_postfix = postfix;
            }
            lb.configuration_version = record.configuration_version;
            lb.deployed_configuration_version = record
                .deployed_configuration_version
                .min(record.configuration_version);
            store.insert_load_balancer(lb);
        }

        let mut instances = Vec::with_capacity(self.instances.len());
        for record in self.instances {
            let key = ResourceKey::from(record.id);
            if let Some(lb) = record.load_balancing_server
                && !store.contains_load_balancer(lb)
            {
                return Err(StoreError::NotFound(lb.into()));
            }
            let mut inst = Instance::new(
                record.id,
                NewInstance {
                    name: record.name,
                    domains: record.domains,
                    settings: record.settings,
                    load_balancing_server: record.load_balancing_server,
                },
                record.created,
            );
            inst.tags = record.tags;
            inst.successfully_provisioned = record.successfully_provisioned;
            inst.status =
                status_or_default(instance::machine().states(), key, record.status.as_deref())?;
            instances.push(inst.clone());
            store.insert_instance(inst);
        }

        let mut server_ids = BTreeSet::new();
        for record in self.servers {
            let key = ResourceKey::from(record.id);
            let mut srv = Server::new(record.id, record.name, record.created);
            srv.status =
                status_or_default(server::machine().states(), key, record.status.as_deref())?;
            srv.vm_id = record.vm_id;
            srv.public_ip = record.public_ip;
            server_ids.insert(srv.id);
            store.insert_server(srv);
        }

        for record in self.appservers {
            let key = ResourceKey::from(record.id);
            let owner = instances
                .iter()
                .find(|i| i.id == record.instance_id)
                .ok_or(StoreError::NotFound(record.instance_id.into()))?;
            if !server_ids.contains(&record.server_id) {
                return Err(StoreError::NotFound(record.server_id.into()));
            }
            let snapshot = record
                .snapshot
                .unwrap_or_else(|| ConfigurationSnapshot::capture(owner, record.created));
            let mut app = AppServer::new(
                record.id,
                NewAppServer {
                    instance_id: record.instance_id,
                    server_id: record.server_id,
                    name: record
                        .name
                        .unwrap_or_else(|| format!("{}-appserver-{}", owner.slug(), record.id)),
                    snapshot,
                },
                record.created,
            );
            app.status =
                status_or_default(appserver::machine().states(), key, record.status.as_deref())?;
            app.is_active = record.is_active;
            app.last_activated = record.last_activated;
            app.terminated = record.terminated;
            store.insert_appserver(app);
        }

        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{AppServerStatus, ServerStatus};
    use crate::store::{AppServerStore, ServerStore};

    const FLEET: &str = r#"
load_balancers:
  - id: 1
    domain: lb1.example.com
    fragment_name_postfix: -test
    configuration_version: 4
    deployed_configuration_version: 3
instances:
  - id: 10
    name: demo
    domains:
      - name: demo.example.com
    load_balancing_server: 1
    settings:
      release: v1
    created: 2026-01-01T00:00:00Z
servers:
  - id: 20
    name: vm-20
    status: ready
    public_ip: 10.0.0.5
    created: 2026-01-01T00:00:00Z
appservers:
  - id: 30
    instance_id: 10
    server_id: 20
    status: running
    is_active: true
    created: 2026-01-01T00:00:00Z
"#;

    #[tokio::test]
    async fn seeds_store_from_yaml() {
        let store = FleetSnapshot::from_yaml(FLEET).unwrap().into_store().unwrap();
        let app = store.appserver(AppServerId::new(30)).await.unwrap();
        assert_eq!(app.status, AppServerStatus::Running);
        assert!(app.is_active);
        assert_eq!(app.snapshot().settings.release, "v1");

        let srv = store.server(ServerId::new(20)).await.unwrap();
        assert_eq!(srv.status, ServerStatus::Ready);
    }

    #[test]
    fn rejects_undeclared_status() {
        let yaml = FLEET.replace("status: running", "status: exploded");
        let err = FleetSnapshot::from_yaml(&yaml)
            .unwrap()
            .into_store()
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidState { .. }));
    }

    #[test]
    fn rejects_dangling_server_reference() {
        let yaml = FLEET.replace("server_id: 20", "server_id: 99");
        assert!(FleetSnapshot::from_yaml(&yaml).unwrap().into_store().is_err());
    }
}
