// ABOUTME: Error types for state-set declaration and state transitions.
// ABOUTME: WrongState is the recoverable "not allowed in this state" error.

use std::fmt;

use crate::store::{ResourceKey, StoreError};

/// An operation or transition was attempted in a state that does not allow it.
///
/// Always recoverable by the caller: re-check the state before retrying.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", describe(.resource, .operation, .current, .target, .allowed))]
pub struct WrongState {
    /// Resource the operation targeted, e.g. `appserver 12`.
    pub resource: String,
    /// Transition or guarded operation name.
    pub operation: String,
    /// State id the resource was in.
    pub current: &'static str,
    /// Target state id, for transitions.
    pub target: Option<&'static str>,
    /// State ids the operation is allowed from.
    pub allowed: Vec<&'static str>,
}

impl WrongState {
    pub fn new(
        resource: impl fmt::Display,
        operation: impl Into<String>,
        current: &'static str,
        allowed: Vec<&'static str>,
    ) -> Self {
        Self {
            resource: resource.to_string(),
            operation: operation.into(),
            current,
            target: None,
            allowed,
        }
    }

    pub fn with_target(mut self, target: &'static str) -> Self {
        self.target = Some(target);
        self
    }
}

fn describe(
    resource: &str,
    operation: &str,
    current: &str,
    target: &Option<&'static str>,
    allowed: &[&'static str],
) -> String {
    let mut message = match target {
        Some(target) => format!("{resource}: cannot {operation} to '{target}' from state '{current}'"),
        None => format!("{resource}: {operation} is not available in state '{current}'"),
    };
    if !allowed.is_empty() {
        message.push_str(&format!(" (allowed: {})", allowed.join(", ")));
    }
    message
}

/// Invalid state-set or state machine declaration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateSetError {
    #[error("{resource}: state '{state}' has no state_id")]
    MissingStateId {
        resource: &'static str,
        state: &'static str,
    },

    #[error("{resource}: state_id '{state_id}' declared by both '{first}' and '{second}'")]
    DuplicateStateId {
        resource: &'static str,
        state_id: &'static str,
        first: &'static str,
        second: &'static str,
    },

    #[error("{resource}: default state '{state_id}' is not part of the state-set")]
    DefaultNotInSet {
        resource: &'static str,
        state_id: &'static str,
    },

    #[error("{resource}: transition '{name}' registered twice")]
    DuplicateTransition {
        resource: &'static str,
        name: &'static str,
    },

    #[error("{resource}: transition '{name}' targets undeclared state '{state_id}'")]
    UndeclaredTarget {
        resource: &'static str,
        name: &'static str,
        state_id: &'static str,
    },
}

/// Errors from applying a transition to a persisted resource.
#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error(transparent)]
    WrongState(#[from] WrongState),

    #[error("{resource}: transition '{name}' is not registered")]
    Unregistered {
        resource: &'static str,
        name: &'static str,
    },

    #[error("{key}: persisted state '{state_id}' is not declared")]
    UnknownStateId { key: ResourceKey, state_id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TransitionError {
    /// The state violation, when this failure is one.
    pub fn wrong_state(&self) -> Option<&WrongState> {
        match self {
            TransitionError::WrongState(e) => Some(e),
            _ => None,
        }
    }
}
