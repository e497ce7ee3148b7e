// ABOUTME: Instance resource: the long-lived application identity owning appservers.
// ABOUTME: Holds domains, tags, settings and the load balancer binding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use crate::fsm::{Guard, ResourceState, StateFilter, StateMachine, StateSet, Transition};
use crate::store::ResourceKey;
use crate::types::{DomainName, InstanceId, LoadBalancerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceStatus {
    Active,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceGroup {
    Live,
}

impl ResourceState for InstanceStatus {
    type Group = InstanceGroup;

    fn state_id(self) -> &'static str {
        match self {
            InstanceStatus::Active => "active",
            InstanceStatus::Archived => "archived",
        }
    }

    fn name(self) -> &'static str {
        match self {
            InstanceStatus::Active => "Active",
            InstanceStatus::Archived => "Archived",
        }
    }

    fn description(self) -> &'static str {
        match self {
            InstanceStatus::Active => "The instance is in service.",
            InstanceStatus::Archived => "The instance was torn down and kept for the record.",
        }
    }

    fn groups(self) -> &'static [InstanceGroup] {
        match self {
            InstanceStatus::Active => &[InstanceGroup::Live],
            InstanceStatus::Archived => &[],
        }
    }
}

pub const ARCHIVE: Transition<InstanceStatus> = Transition::new(
    "archive",
    StateFilter::Exact(InstanceStatus::Active),
    InstanceStatus::Archived,
);

pub const SPAWN_APPSERVER: Guard<InstanceStatus> =
    Guard::only_for("spawn_appserver", StateFilter::Group(InstanceGroup::Live));

pub const ASSIGN_LOAD_BALANCER: Guard<InstanceStatus> =
    Guard::only_for("assign_load_balancer", StateFilter::Group(InstanceGroup::Live));

static MACHINE: LazyLock<StateMachine<InstanceStatus>> = LazyLock::new(|| {
    let set = StateSet::new(
        "instance",
        &[InstanceStatus::Active, InstanceStatus::Archived],
        InstanceStatus::Active,
    )
    .expect("instance state-set declaration must be valid");
    StateMachine::new(set, &[ARCHIVE]).expect("instance transitions must be valid")
});

/// The instance state machine.
pub fn machine() -> &'static StateMachine<InstanceStatus> {
    &MACHINE
}

/// Connection settings for the instance's external database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub host: String,
    #[serde(default = "default_database_port")]
    pub port: u16,
    pub name: String,
    pub user: String,
}

fn default_database_port() -> u16 {
    3306
}

/// Object storage bucket used for uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    pub bucket: String,
    #[serde(default)]
    pub region: Option<String>,
}

/// Deployment settings an appserver snapshot is frozen from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSettings {
    /// Application release (tag or branch) to deploy.
    pub release: String,

    #[serde(default)]
    pub configuration_overrides: BTreeMap<String, String>,

    #[serde(default)]
    pub database: Option<DatabaseSettings>,

    #[serde(default)]
    pub storage: Option<StorageSettings>,

    #[serde(default)]
    pub theme: BTreeMap<String, String>,

    /// Reference to the secret bundle in the secret store.
    #[serde(default)]
    pub secret_ref: Option<String>,
}

/// Whether a domain should receive traffic from the load balancer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DomainRouting {
    #[default]
    Routed,
    /// The domain is configured but deliberately left unrouted.
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDomain {
    pub name: DomainName,
    #[serde(default)]
    pub routing: DomainRouting,
}

impl InstanceDomain {
    pub fn routed(name: DomainName) -> Self {
        Self {
            name,
            routing: DomainRouting::Routed,
        }
    }
}

/// Everything needed to register an instance.
#[derive(Debug, Clone)]
pub struct NewInstance {
    pub name: String,
    pub domains: Vec<InstanceDomain>,
    pub settings: InstanceSettings,
    pub load_balancing_server: Option<LoadBalancerId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub id: InstanceId,
    pub name: String,
    pub domains: Vec<InstanceDomain>,
    pub tags: BTreeSet<String>,
    pub load_balancing_server: Option<LoadBalancerId>,
    pub successfully_provisioned: bool,
    pub status: InstanceStatus,
    pub settings: InstanceSettings,
    pub created: DateTime<Utc>,
}

impl Instance {
    pub fn new(id: InstanceId, new: NewInstance, created: DateTime<Utc>) -> Self {
        Self {
            id,
            name: new.name,
            domains: new.domains,
            tags: BTreeSet::new(),
            load_balancing_server: new.load_balancing_server,
            successfully_provisioned: false,
            status: machine().states().default_state(),
            settings: new.settings,
            created,
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::from(self.id)
    }

    /// Domains that should receive traffic.
    pub fn routed_domains(&self) -> impl Iterator<Item = &DomainName> {
        self.domains
            .iter()
            .filter(|d| d.routing == DomainRouting::Routed)
            .map(|d| &d.name)
    }

    /// Lower-case name safe for backend identifiers: `Demo Site` -> `demo-site`.
    pub fn slug(&self) -> String {
        let mut slug = String::with_capacity(self.name.len());
        for c in self.name.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.ends_with('-') {
                slug.push('-');
            }
        }
        let slug = slug.trim_matches('-');
        if slug.is_empty() {
            format!("instance-{}", self.id)
        } else {
            slug.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(name: &str) -> Instance {
        Instance::new(
            InstanceId::new(9),
            NewInstance {
                name: name.to_string(),
                domains: vec![
                    InstanceDomain::routed(DomainName::new("a.example.com").unwrap()),
                    InstanceDomain {
                        name: DomainName::new("b.example.com").unwrap(),
                        routing: DomainRouting::NotFound,
                    },
                ],
                settings: InstanceSettings::default(),
                load_balancing_server: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn slug_collapses_separators() {
        assert_eq!(instance("Demo  Site!").slug(), "demo-site");
        assert_eq!(instance("***").slug(), "instance-9");
    }

    #[test]
    fn not_found_domains_are_not_routed() {
        let routed: Vec<_> = instance("x").routed_domains().map(|d| d.to_string()).collect();
        assert_eq!(routed, vec!["a.example.com"]);
    }

    #[test]
    fn archive_only_from_active() {
        assert!(machine().can_apply(InstanceStatus::Active, &ARCHIVE));
        assert!(!machine().can_apply(InstanceStatus::Archived, &ARCHIVE));
        assert!(!SPAWN_APPSERVER.is_available(InstanceStatus::Archived));
    }
}
