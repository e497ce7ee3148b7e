// ABOUTME: Compute server resource and its lifecycle state machine.
// ABOUTME: Pending -> Building -> Booting -> Ready, with BuildFailed, Unknown and Terminated.

use chrono::{DateTime, Utc};
use std::net::IpAddr;
use std::sync::LazyLock;

use crate::fsm::{Guard, ResourceState, StateFilter, StateMachine, StateSet, Transition};
use crate::store::ResourceKey;
use crate::types::ServerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerStatus {
    Pending,
    Building,
    Booting,
    Ready,
    BuildFailed,
    Unknown,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerGroup {
    /// The server is not expected to change state on its own.
    Steady,
    /// Nothing has gone wrong with the server so far.
    Healthy,
    /// The VM exists and may have a public address.
    Addressable,
}

impl ResourceState for ServerStatus {
    type Group = ServerGroup;

    fn state_id(self) -> &'static str {
        match self {
            ServerStatus::Pending => "pending",
            ServerStatus::Building => "building",
            ServerStatus::Booting => "booting",
            ServerStatus::Ready => "ready",
            ServerStatus::BuildFailed => "failed",
            ServerStatus::Unknown => "unknown",
            ServerStatus::Terminated => "terminated",
        }
    }

    fn name(self) -> &'static str {
        match self {
            ServerStatus::Pending => "Pending",
            ServerStatus::Building => "Building",
            ServerStatus::Booting => "Booting",
            ServerStatus::Ready => "Ready",
            ServerStatus::BuildFailed => "BuildFailed",
            ServerStatus::Unknown => "Unknown",
            ServerStatus::Terminated => "Terminated",
        }
    }

    fn description(self) -> &'static str {
        match self {
            ServerStatus::Pending => "Not yet launched.",
            ServerStatus::Building => "The VM is being created by the compute provider.",
            ServerStatus::Booting => "The VM exists and is booting.",
            ServerStatus::Ready => "The VM is booted and reachable over SSH.",
            ServerStatus::BuildFailed => "The compute provider failed to create the VM.",
            ServerStatus::Unknown => "The VM state could not be determined.",
            ServerStatus::Terminated => "The VM has been deleted.",
        }
    }

    fn groups(self) -> &'static [ServerGroup] {
        match self {
            ServerStatus::Pending => &[ServerGroup::Steady, ServerGroup::Healthy],
            ServerStatus::Building => &[ServerGroup::Healthy],
            ServerStatus::Booting => &[ServerGroup::Healthy, ServerGroup::Addressable],
            ServerStatus::Ready => &[
                ServerGroup::Steady,
                ServerGroup::Healthy,
                ServerGroup::Addressable,
            ],
            ServerStatus::BuildFailed => &[ServerGroup::Steady],
            ServerStatus::Unknown => &[ServerGroup::Addressable],
            ServerStatus::Terminated => &[ServerGroup::Steady],
        }
    }
}

pub const START_BUILD: Transition<ServerStatus> = Transition::new(
    "start_build",
    StateFilter::Exact(ServerStatus::Pending),
    ServerStatus::Building,
);

pub const BUILD_FAILED: Transition<ServerStatus> = Transition::new(
    "build_failed",
    StateFilter::Exact(ServerStatus::Building),
    ServerStatus::BuildFailed,
);

pub const BOOT: Transition<ServerStatus> = Transition::new(
    "boot",
    StateFilter::AnyOf(&[ServerStatus::Building, ServerStatus::Unknown]),
    ServerStatus::Booting,
);

pub const MARK_READY: Transition<ServerStatus> = Transition::new(
    "mark_ready",
    StateFilter::AnyOf(&[ServerStatus::Booting, ServerStatus::Unknown]),
    ServerStatus::Ready,
);

pub const MARK_UNKNOWN: Transition<ServerStatus> = Transition::new(
    "mark_unknown",
    StateFilter::AnyOf(&[
        ServerStatus::Building,
        ServerStatus::Booting,
        ServerStatus::Ready,
    ]),
    ServerStatus::Unknown,
);

pub const TERMINATE: Transition<ServerStatus> =
    Transition::new("terminate", StateFilter::All, ServerStatus::Terminated);

/// Reading the public address only makes sense once the VM exists.
pub const PUBLIC_ADDRESS: Guard<ServerStatus> = Guard::only_for(
    "public_address",
    StateFilter::Group(ServerGroup::Addressable),
);

static MACHINE: LazyLock<StateMachine<ServerStatus>> = LazyLock::new(|| {
    let set = StateSet::new(
        "server",
        &[
            ServerStatus::Pending,
            ServerStatus::Building,
            ServerStatus::Booting,
            ServerStatus::Ready,
            ServerStatus::BuildFailed,
            ServerStatus::Unknown,
            ServerStatus::Terminated,
        ],
        ServerStatus::Pending,
    )
    .expect("server state-set declaration must be valid");
    StateMachine::new(
        set,
        &[START_BUILD, BUILD_FAILED, BOOT, MARK_READY, MARK_UNKNOWN, TERMINATE],
    )
    .expect("server transitions must be valid")
});

/// The server state machine.
pub fn machine() -> &'static StateMachine<ServerStatus> {
    &MACHINE
}

/// A VM owned by exactly one appserver.
#[derive(Debug, Clone, PartialEq)]
pub struct Server {
    pub id: ServerId,
    pub name: String,
    pub status: ServerStatus,
    /// Identifier assigned by the compute provider once launched.
    pub vm_id: Option<String>,
    pub public_ip: Option<IpAddr>,
    pub created: DateTime<Utc>,
}

impl Server {
    pub fn new(id: ServerId, name: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            status: machine().states().default_state(),
            vm_id: None,
            public_ip: None,
            created,
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::from(self.id)
    }

    pub fn is_healthy(&self) -> bool {
        self.status.is_a(ServerGroup::Healthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaration_is_valid() {
        assert_eq!(machine().states().states().len(), 7);
        assert_eq!(machine().states().default_state(), ServerStatus::Pending);
    }

    #[test]
    fn terminate_allowed_from_every_state() {
        for &state in machine().states().states() {
            assert!(machine().can_apply(state, &TERMINATE), "{state:?}");
        }
    }

    #[test]
    fn public_address_requires_addressable_state() {
        assert!(PUBLIC_ADDRESS.is_available(ServerStatus::Ready));
        assert!(PUBLIC_ADDRESS.is_available(ServerStatus::Unknown));
        assert!(!PUBLIC_ADDRESS.is_available(ServerStatus::Pending));
        assert!(!PUBLIC_ADDRESS.is_available(ServerStatus::Terminated));
    }
}
