// ABOUTME: Persistence boundary for managed resources.
// ABOUTME: Field-level store traits plus an in-memory implementation and fleet snapshot loader.

mod error;
mod fleet;
mod memory;
mod traits;

pub use error::StoreError;
pub use fleet::FleetSnapshot;
pub use memory::{MemoryStore, StoreWrite};
pub use traits::{
    AppServerStore, InstanceStore, LoadBalancerStore, ServerStore, StateStore, Store,
};

use serde::Serialize;
use std::fmt;

use crate::types::{AppServerId, InstanceId, LoadBalancerId, ServerId};

/// Kind of a persisted resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Instance,
    AppServer,
    Server,
    #[serde(rename = "load_balancer")]
    LoadBalancer,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Instance => "instance",
            ResourceKind::AppServer => "appserver",
            ResourceKind::Server => "server",
            ResourceKind::LoadBalancer => "load balancer",
        }
    }
}

/// Untyped address of a persisted resource, used where one code path serves
/// every resource kind (state reads and swaps, error messages).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResourceKey {
    pub kind: ResourceKind,
    pub id: u64,
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.as_str(), self.id)
    }
}

impl From<InstanceId> for ResourceKey {
    fn from(id: InstanceId) -> Self {
        Self {
            kind: ResourceKind::Instance,
            id: id.get(),
        }
    }
}

impl From<AppServerId> for ResourceKey {
    fn from(id: AppServerId) -> Self {
        Self {
            kind: ResourceKind::AppServer,
            id: id.get(),
        }
    }
}

impl From<ServerId> for ResourceKey {
    fn from(id: ServerId) -> Self {
        Self {
            kind: ResourceKind::Server,
            id: id.get(),
        }
    }
}

impl From<LoadBalancerId> for ResourceKey {
    fn from(id: LoadBalancerId) -> Self {
        Self {
            kind: ResourceKind::LoadBalancer,
            id: id.get(),
        }
    }
}
