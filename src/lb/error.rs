// ABOUTME: Load balancer reconfiguration errors with SNAFU pattern.
// ABOUTME: Wraps apply, render, lock and store failures for programmatic handling.

use snafu::Snafu;

use crate::fsm::WrongState;
use crate::services::LockError;
use crate::store::StoreError;
use crate::types::LoadBalancerId;

use super::aggregator::AggregationError;
use super::applier::ApplyError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReconfigurationError {
    #[snafu(display("load balancer {lb}: reconfiguration failed: {source}"))]
    ReconfigurationFailed {
        lb: LoadBalancerId,
        source: ApplyError,
    },

    #[snafu(display("load balancer {lb}: cannot render configuration: {source}"))]
    Aggregation {
        lb: LoadBalancerId,
        source: AggregationError,
    },

    #[snafu(display("load balancer {lb}: {source}"))]
    Lock {
        lb: LoadBalancerId,
        source: LockError,
    },

    #[snafu(display("load balancer store error: {source}"))]
    Store { source: StoreError },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconfigurationErrorKind {
    /// The apply playbook failed or could not run.
    ApplyFailed,
    /// An active appserver could not be routed to.
    WrongState,
    /// Rendering failed for another reason.
    Render,
    /// Waiting for the reconfiguration lock timed out.
    LockTimeout,
    /// The lock backend failed.
    Lock,
    Store,
}

impl ReconfigurationError {
    pub fn kind(&self) -> ReconfigurationErrorKind {
        match self {
            ReconfigurationError::ReconfigurationFailed { .. } => {
                ReconfigurationErrorKind::ApplyFailed
            }
            ReconfigurationError::Aggregation { source, .. } => match source {
                AggregationError::WrongState(_) => ReconfigurationErrorKind::WrongState,
                _ => ReconfigurationErrorKind::Render,
            },
            ReconfigurationError::Lock { source, .. } => match source {
                LockError::Timeout { .. } => ReconfigurationErrorKind::LockTimeout,
                LockError::Backend(_) => ReconfigurationErrorKind::Lock,
            },
            ReconfigurationError::Store { .. } => ReconfigurationErrorKind::Store,
        }
    }

    /// The state violation behind a render failure, if that is what failed.
    pub fn wrong_state(&self) -> Option<&WrongState> {
        match self {
            ReconfigurationError::Aggregation {
                source: AggregationError::WrongState(e),
                ..
            } => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for ReconfigurationError {
    fn from(source: StoreError) -> Self {
        ReconfigurationError::Store { source }
    }
}
