// ABOUTME: State guards for operations only valid in some states.
// ABOUTME: check() fails with WrongState; is_available() answers without failing.

use std::fmt::Display;

use super::error::WrongState;
use super::machine::StateFilter;
use super::state::{ResourceState, StateSet};

/// Restricts a named operation to a set of states.
#[derive(Debug, Clone, Copy)]
pub struct Guard<S: ResourceState> {
    operation: &'static str,
    allowed: StateFilter<S>,
}

impl<S: ResourceState> Guard<S> {
    pub const fn only_for(operation: &'static str, allowed: StateFilter<S>) -> Self {
        Self { operation, allowed }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Whether the operation may run in `state`.
    pub fn is_available(&self, state: S) -> bool {
        self.allowed.matches(state)
    }

    /// Fail with `WrongState` unless the operation may run in `state`.
    pub fn check(
        &self,
        resource: impl Display,
        state: S,
        set: &StateSet<S>,
    ) -> Result<(), WrongState> {
        if self.is_available(state) {
            return Ok(());
        }
        Err(WrongState::new(
            resource,
            self.operation,
            state.state_id(),
            self.allowed.allowed_ids(set),
        ))
    }
}
