// ABOUTME: AppServer resource: one provisioned deployment unit of an instance.
// ABOUTME: Declares the appserver state machine and the make_active guard.

use chrono::{DateTime, Utc};
use std::sync::LazyLock;

use crate::fsm::{Guard, ResourceState, StateFilter, StateMachine, StateSet, Transition};
use crate::store::ResourceKey;
use crate::types::{AppServerId, InstanceId, ServerId};

use super::snapshot::ConfigurationSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppServerStatus {
    New,
    WaitingForServer,
    ConfiguringServer,
    Running,
    ConfigurationFailed,
    /// Provisioning hit an infrastructure failure before configuration ran.
    Error,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppServerGroup {
    /// Provisioning is over; the status won't change without an operator.
    Steady,
    /// Healthy enough to serve, or still on the way there.
    Healthy,
    /// Provisioning is still running.
    InProgress,
}

impl ResourceState for AppServerStatus {
    type Group = AppServerGroup;

    fn state_id(self) -> &'static str {
        match self {
            AppServerStatus::New => "new",
            AppServerStatus::WaitingForServer => "waiting",
            AppServerStatus::ConfiguringServer => "configuring",
            AppServerStatus::Running => "running",
            AppServerStatus::ConfigurationFailed => "failed",
            AppServerStatus::Error => "error",
            AppServerStatus::Terminated => "terminated",
        }
    }

    fn name(self) -> &'static str {
        match self {
            AppServerStatus::New => "New",
            AppServerStatus::WaitingForServer => "Waiting for server",
            AppServerStatus::ConfiguringServer => "Configuring server",
            AppServerStatus::Running => "Running",
            AppServerStatus::ConfigurationFailed => "Configuration failed",
            AppServerStatus::Error => "Error",
            AppServerStatus::Terminated => "Terminated",
        }
    }

    fn description(self) -> &'static str {
        match self {
            AppServerStatus::New => "Newly created, provisioning not started.",
            AppServerStatus::WaitingForServer => "The VM is being created and booted.",
            AppServerStatus::ConfiguringServer => "The configuration playbook is running.",
            AppServerStatus::Running => "Configured and serving.",
            AppServerStatus::ConfigurationFailed => {
                "The configuration playbook failed; the server is up and can be inspected."
            }
            AppServerStatus::Error => "Provisioning failed before configuration could run.",
            AppServerStatus::Terminated => "The VM has been shut down.",
        }
    }

    fn groups(self) -> &'static [AppServerGroup] {
        match self {
            AppServerStatus::New
            | AppServerStatus::WaitingForServer
            | AppServerStatus::ConfiguringServer => {
                &[AppServerGroup::Healthy, AppServerGroup::InProgress]
            }
            AppServerStatus::Running | AppServerStatus::ConfigurationFailed => {
                &[AppServerGroup::Steady, AppServerGroup::Healthy]
            }
            AppServerStatus::Error | AppServerStatus::Terminated => &[AppServerGroup::Steady],
        }
    }
}

pub const WAIT_FOR_SERVER: Transition<AppServerStatus> = Transition::new(
    "wait_for_server",
    StateFilter::Exact(AppServerStatus::New),
    AppServerStatus::WaitingForServer,
);

pub const CONFIGURE_SERVER: Transition<AppServerStatus> = Transition::new(
    "configure_server",
    StateFilter::Exact(AppServerStatus::WaitingForServer),
    AppServerStatus::ConfiguringServer,
);

pub const CONFIGURATION_SUCCEEDED: Transition<AppServerStatus> = Transition::new(
    "configuration_succeeded",
    StateFilter::Exact(AppServerStatus::ConfiguringServer),
    AppServerStatus::Running,
);

pub const CONFIGURATION_FAILED: Transition<AppServerStatus> = Transition::new(
    "configuration_failed",
    StateFilter::Exact(AppServerStatus::ConfiguringServer),
    AppServerStatus::ConfigurationFailed,
);

pub const PROVISIONING_ERROR: Transition<AppServerStatus> = Transition::new(
    "provisioning_error",
    StateFilter::Group(AppServerGroup::InProgress),
    AppServerStatus::Error,
);

pub const TERMINATE: Transition<AppServerStatus> = Transition::new(
    "terminate",
    StateFilter::AnyOf(&[
        AppServerStatus::New,
        AppServerStatus::WaitingForServer,
        AppServerStatus::ConfiguringServer,
        AppServerStatus::Running,
        AppServerStatus::ConfigurationFailed,
        AppServerStatus::Error,
    ]),
    AppServerStatus::Terminated,
);

/// Activation and deactivation both need a finished, healthy appserver.
pub const MAKE_ACTIVE: Guard<AppServerStatus> = Guard::only_for(
    "make_active",
    StateFilter::AnyOf(&[AppServerStatus::Running, AppServerStatus::ConfigurationFailed]),
);

static MACHINE: LazyLock<StateMachine<AppServerStatus>> = LazyLock::new(|| {
    let set = StateSet::new(
        "appserver",
        &[
            AppServerStatus::New,
            AppServerStatus::WaitingForServer,
            AppServerStatus::ConfiguringServer,
            AppServerStatus::Running,
            AppServerStatus::ConfigurationFailed,
            AppServerStatus::Error,
            AppServerStatus::Terminated,
        ],
        AppServerStatus::New,
    )
    .expect("appserver state-set declaration must be valid");
    StateMachine::new(
        set,
        &[
            WAIT_FOR_SERVER,
            CONFIGURE_SERVER,
            CONFIGURATION_SUCCEEDED,
            CONFIGURATION_FAILED,
            PROVISIONING_ERROR,
            TERMINATE,
        ],
    )
    .expect("appserver transitions must be valid")
});

/// The appserver state machine.
pub fn machine() -> &'static StateMachine<AppServerStatus> {
    &MACHINE
}

/// Everything needed to create an appserver record.
#[derive(Debug, Clone)]
pub struct NewAppServer {
    pub instance_id: InstanceId,
    pub server_id: ServerId,
    pub name: String,
    pub snapshot: ConfigurationSnapshot,
}

/// One deployment of an instance, bound to its own VM.
///
/// The configuration snapshot is frozen when the record is created and has
/// no setter: redeploys and logs always reflect what this appserver was
/// built from, whatever happened to the instance since.
#[derive(Debug, Clone, PartialEq)]
pub struct AppServer {
    pub id: AppServerId,
    pub instance_id: InstanceId,
    pub server_id: ServerId,
    pub name: String,
    pub status: AppServerStatus,
    pub is_active: bool,
    pub created: DateTime<Utc>,
    pub last_activated: Option<DateTime<Utc>>,
    pub terminated: Option<DateTime<Utc>>,
    snapshot: ConfigurationSnapshot,
}

impl AppServer {
    pub fn new(id: AppServerId, new: NewAppServer, created: DateTime<Utc>) -> Self {
        Self {
            id,
            instance_id: new.instance_id,
            server_id: new.server_id,
            name: new.name,
            status: machine().states().default_state(),
            is_active: false,
            created,
            last_activated: None,
            terminated: None,
            snapshot: new.snapshot,
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::from(self.id)
    }

    pub fn snapshot(&self) -> &ConfigurationSnapshot {
        &self.snapshot
    }

    pub fn is_terminated(&self) -> bool {
        self.status == AppServerStatus::Terminated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaration_is_valid() {
        assert_eq!(machine().states().states().len(), 7);
        assert_eq!(machine().transitions().len(), 6);
    }

    #[test]
    fn make_active_allowed_for_finished_states_only() {
        assert!(MAKE_ACTIVE.is_available(AppServerStatus::Running));
        assert!(MAKE_ACTIVE.is_available(AppServerStatus::ConfigurationFailed));
        for state in [
            AppServerStatus::New,
            AppServerStatus::WaitingForServer,
            AppServerStatus::ConfiguringServer,
            AppServerStatus::Error,
            AppServerStatus::Terminated,
        ] {
            assert!(!MAKE_ACTIVE.is_available(state), "{state:?}");
        }
    }

    #[test]
    fn provisioning_error_only_while_in_progress() {
        assert!(machine().can_apply(AppServerStatus::New, &PROVISIONING_ERROR));
        assert!(machine().can_apply(AppServerStatus::ConfiguringServer, &PROVISIONING_ERROR));
        assert!(!machine().can_apply(AppServerStatus::Running, &PROVISIONING_ERROR));
    }

    #[test]
    fn terminated_cannot_be_terminated_again() {
        assert!(!machine().can_apply(AppServerStatus::Terminated, &TERMINATE));
    }
}
