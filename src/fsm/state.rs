// ABOUTME: Resource state trait and validated, ordered state-sets.
// ABOUTME: Rejects empty or duplicate state ids when a state-set is declared.

use std::fmt::Debug;
use std::hash::Hash;

use super::error::StateSetError;

/// A state belonging to the state-set of one resource type.
///
/// Implemented by plain enums, one per resource. The persisted form of a
/// state is only its `state_id`; everything else is recovered from the
/// declaration when the resource is read back.
///
/// Equality is variant equality: two resources both `Running` hold equal
/// states, while states of different resources' state-sets are different
/// types and cannot be compared at all.
pub trait ResourceState: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Named categories a state can belong to ("steady", "healthy", ...).
    type Group: Copy + Eq + Debug + Send + Sync + 'static;

    /// Short stable identifier, persisted in storage.
    fn state_id(self) -> &'static str;

    /// Display label.
    fn name(self) -> &'static str;

    fn description(self) -> &'static str;

    /// Groups this state declares membership of.
    fn groups(self) -> &'static [Self::Group] {
        &[]
    }

    fn is_a(self, group: Self::Group) -> bool {
        self.groups().contains(&group)
    }

    fn one_of(self, states: &[Self]) -> bool {
        states.contains(&self)
    }
}

/// The declared, ordered collection of states for one resource type.
#[derive(Debug, Clone)]
pub struct StateSet<S: ResourceState> {
    resource: &'static str,
    states: Vec<S>,
    default: S,
}

impl<S: ResourceState> StateSet<S> {
    /// Declare a state-set.
    ///
    /// # Errors
    ///
    /// Fails when a state has an empty `state_id`, when two states share a
    /// `state_id` (including the same state listed twice), or when `default`
    /// is not one of `states`.
    pub fn new(resource: &'static str, states: &[S], default: S) -> Result<Self, StateSetError> {
        let mut seen: Vec<S> = Vec::with_capacity(states.len());
        for &state in states {
            if state.state_id().is_empty() {
                return Err(StateSetError::MissingStateId {
                    resource,
                    state: state.name(),
                });
            }
            if let Some(existing) = seen.iter().find(|s| s.state_id() == state.state_id()) {
                return Err(StateSetError::DuplicateStateId {
                    resource,
                    state_id: state.state_id(),
                    first: existing.name(),
                    second: state.name(),
                });
            }
            seen.push(state);
        }

        if !seen.contains(&default) {
            return Err(StateSetError::DefaultNotInSet {
                resource,
                state_id: default.state_id(),
            });
        }

        Ok(Self {
            resource,
            states: seen,
            default,
        })
    }

    /// Derive a state-set containing this set's states followed by `extra`.
    ///
    /// The result is validated like a fresh declaration, so an extension can
    /// never shadow an inherited `state_id`.
    pub fn extend(&self, extra: &[S]) -> Result<Self, StateSetError> {
        let mut states = self.states.clone();
        states.extend_from_slice(extra);
        Self::new(self.resource, &states, self.default)
    }

    pub fn resource(&self) -> &'static str {
        self.resource
    }

    pub fn states(&self) -> &[S] {
        &self.states
    }

    pub fn default_state(&self) -> S {
        self.default
    }

    pub fn contains(&self, state: S) -> bool {
        self.states.contains(&state)
    }

    /// Look up a declared state by its persisted identifier.
    pub fn from_state_id(&self, state_id: &str) -> Option<S> {
        self.states.iter().copied().find(|s| s.state_id() == state_id)
    }
}
