// ABOUTME: Error types for instance-level orchestration.
// ABOUTME: Spawn and assignment failures that are not expressed as outcomes.

use crate::fsm::{TransitionError, WrongState};
use crate::lb::ReconfigurationError;
use crate::lifecycle::LifecycleError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error(transparent)]
    WrongState(#[from] WrongState),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Reconfiguration(#[from] ReconfigurationError),

    #[error("no load balancer accepts new backends")]
    NoLoadBalancerAvailable,
}

impl OrchestrationError {
    pub fn wrong_state(&self) -> Option<&WrongState> {
        match self {
            OrchestrationError::WrongState(e) => Some(e),
            OrchestrationError::Transition(e) => e.wrong_state(),
            OrchestrationError::Lifecycle(e) => e.wrong_state(),
            _ => None,
        }
    }
}
