// ABOUTME: Declarative transition table bound to a state-set.
// ABOUTME: Applies transitions to persisted resources with a single-field compare-and-swap.

use crate::store::{ResourceKey, StateStore};

use super::error::{StateSetError, TransitionError, WrongState};
use super::state::{ResourceState, StateSet};

/// Which current states a transition or guard accepts.
#[derive(Debug, Clone, Copy)]
pub enum StateFilter<S: ResourceState> {
    /// Exactly this state.
    Exact(S),
    /// Any of the listed states.
    AnyOf(&'static [S]),
    /// Any state that declares membership of the group.
    Group(S::Group),
    /// Every declared state.
    All,
}

impl<S: ResourceState> StateFilter<S> {
    pub fn matches(&self, state: S) -> bool {
        match self {
            StateFilter::Exact(s) => *s == state,
            StateFilter::AnyOf(states) => state.one_of(states),
            StateFilter::Group(group) => state.is_a(*group),
            StateFilter::All => true,
        }
    }

    /// Declared states accepted by this filter, for error messages.
    pub fn allowed(&self, set: &StateSet<S>) -> Vec<S> {
        set.states()
            .iter()
            .copied()
            .filter(|s| self.matches(*s))
            .collect()
    }

    pub(crate) fn allowed_ids(&self, set: &StateSet<S>) -> Vec<&'static str> {
        self.allowed(set).into_iter().map(|s| s.state_id()).collect()
    }
}

/// A named transition `from -> to`.
#[derive(Debug, Clone, Copy)]
pub struct Transition<S: ResourceState> {
    name: &'static str,
    from: StateFilter<S>,
    to: S,
}

impl<S: ResourceState> Transition<S> {
    pub const fn new(name: &'static str, from: StateFilter<S>, to: S) -> Self {
        Self { name, from, to }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn from(&self) -> &StateFilter<S> {
        &self.from
    }

    pub fn to(&self) -> S {
        self.to
    }
}

/// A state-set together with its registered transitions.
///
/// The only way to change a resource's persisted state is [`StateMachine::apply`]
/// with one of the registered transitions.
#[derive(Debug, Clone)]
pub struct StateMachine<S: ResourceState> {
    set: StateSet<S>,
    transitions: Vec<Transition<S>>,
}

impl<S: ResourceState> StateMachine<S> {
    /// Register `transitions` against `set`.
    ///
    /// # Errors
    ///
    /// Fails when a transition name is registered twice or a transition
    /// targets a state outside the set.
    pub fn new(set: StateSet<S>, transitions: &[Transition<S>]) -> Result<Self, StateSetError> {
        for (i, transition) in transitions.iter().enumerate() {
            if transitions[..i].iter().any(|t| t.name == transition.name) {
                return Err(StateSetError::DuplicateTransition {
                    resource: set.resource(),
                    name: transition.name,
                });
            }
            if !set.contains(transition.to) {
                return Err(StateSetError::UndeclaredTarget {
                    resource: set.resource(),
                    name: transition.name,
                    state_id: transition.to.state_id(),
                });
            }
        }

        Ok(Self {
            set,
            transitions: transitions.to_vec(),
        })
    }

    pub fn states(&self) -> &StateSet<S> {
        &self.set
    }

    pub fn transitions(&self) -> &[Transition<S>] {
        &self.transitions
    }

    /// Whether `transition` may be applied from `current`.
    pub fn can_apply(&self, current: S, transition: &Transition<S>) -> bool {
        self.is_registered(transition) && transition.from.matches(current)
    }

    /// Validate `transition` from `current` without touching storage.
    pub fn check(
        &self,
        resource: impl std::fmt::Display,
        current: S,
        transition: &Transition<S>,
    ) -> Result<(), WrongState> {
        if transition.from.matches(current) {
            return Ok(());
        }
        Err(WrongState::new(
            resource,
            transition.name,
            current.state_id(),
            transition.from.allowed_ids(&self.set),
        )
        .with_target(transition.to.state_id()))
    }

    /// Read the persisted state of `key`.
    pub async fn current<T: StateStore + ?Sized>(
        &self,
        store: &T,
        key: ResourceKey,
    ) -> Result<S, TransitionError> {
        let state_id = store.load_state(key).await?;
        self.set
            .from_state_id(&state_id)
            .ok_or(TransitionError::UnknownStateId { key, state_id })
    }

    /// Apply `transition` to the persisted resource `key`.
    ///
    /// Re-reads the current state, validates it against the transition's
    /// source states, then swaps only the state field from the observed value
    /// to the target. A concurrent writer that changed the state in between
    /// makes the swap fail, and the caller gets `WrongState` describing the
    /// state it lost to.
    pub async fn apply<T: StateStore + ?Sized>(
        &self,
        store: &T,
        key: ResourceKey,
        transition: &Transition<S>,
    ) -> Result<S, TransitionError> {
        if !self.is_registered(transition) {
            return Err(TransitionError::Unregistered {
                resource: self.set.resource(),
                name: transition.name,
            });
        }

        let current = self.current(store, key).await?;
        self.check(key, current, transition)?;

        let swapped = store
            .swap_state(key, current.state_id(), transition.to.state_id())
            .await?;

        if !swapped {
            let actual = self.current(store, key).await?;
            tracing::debug!(
                "{}: lost race applying '{}' (saw '{}', now '{}')",
                key,
                transition.name,
                current.state_id(),
                actual.state_id()
            );
            return Err(WrongState::new(
                key,
                transition.name,
                actual.state_id(),
                transition.from.allowed_ids(&self.set),
            )
            .with_target(transition.to.state_id())
            .into());
        }

        tracing::debug!(
            "{}: {} -> {} via '{}'",
            key,
            current.state_id(),
            transition.to.state_id(),
            transition.name
        );
        Ok(transition.to)
    }

    fn is_registered(&self, transition: &Transition<S>) -> bool {
        self.transitions.iter().any(|t| {
            t.name == transition.name && t.to == transition.to
        })
    }
}
