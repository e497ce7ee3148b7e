// ABOUTME: Instance-level policy: spawning, retention, archiving and load balancer assignment.
// ABOUTME: Composes the lifecycle controller and the reconfiguration protocol.

mod archive;
mod assign;
mod error;
mod retention;
mod spawn;

pub use archive::archive;
pub use assign::assign_load_balancer;
pub use error::OrchestrationError;
pub use retention::{
    RetentionDecision, RetentionEntry, RetentionPlan, RetentionReport,
    terminate_obsolete_appservers,
};
pub use spawn::{SpawnOptions, SpawnOutcome, spawn_appserver};
