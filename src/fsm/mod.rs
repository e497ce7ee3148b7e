// ABOUTME: Generic resource state machine engine shared by servers, appservers and instances.
// ABOUTME: Exports state-sets, transitions, guards and their error types.

mod error;
mod guard;
mod machine;
mod state;

pub use error::{StateSetError, TransitionError, WrongState};
pub use guard::Guard;
pub use machine::{StateFilter, StateMachine, Transition};
pub use state::{ResourceState, StateSet};
