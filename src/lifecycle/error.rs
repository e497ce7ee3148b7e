// ABOUTME: Error types for appserver provisioning, activation and termination.
// ABOUTME: Infrastructure failures here end provisioning in the Error state.

use crate::fsm::{TransitionError, WrongState};
use crate::lb::ReconfigurationError;
use crate::services::{ComputeError, DnsError, PlaybookError, VmState};
use crate::store::StoreError;
use crate::types::{AppServerId, ServerId};

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    WrongState(#[from] WrongState),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Compute(#[from] ComputeError),

    #[error("server {server}: VM {vm_id} ended up {state:?}")]
    VmFailed {
        server: ServerId,
        vm_id: String,
        state: VmState,
    },

    #[error("server {server}: not ready after {polls} polls")]
    ServerTimeout { server: ServerId, polls: u32 },

    #[error("server {server}: VM {vm_id} could not be deleted: {reason}")]
    VmDeleteFailed {
        server: ServerId,
        vm_id: String,
        reason: String,
    },

    #[error(transparent)]
    Playbook(#[from] PlaybookError),

    #[error("appserver {appserver}: cannot encode playbook variables: {source}")]
    PlaybookVars {
        appserver: AppServerId,
        source: serde_json::Error,
    },

    #[error("appserver {0}: cannot terminate an active app server")]
    ActiveAppServer(AppServerId),

    #[error(transparent)]
    Reconfiguration(#[from] ReconfigurationError),

    #[error(transparent)]
    Dns(#[from] DnsError),
}

impl LifecycleError {
    /// The state violation, whether raised by a guard or a transition.
    pub fn wrong_state(&self) -> Option<&WrongState> {
        match self {
            LifecycleError::WrongState(e) => Some(e),
            LifecycleError::Transition(e) => e.wrong_state(),
            _ => None,
        }
    }
}
