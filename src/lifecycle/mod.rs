// ABOUTME: Appserver lifecycle: provisioning pipeline, activation and termination.
// ABOUTME: Drives the server and appserver state machines through the platform collaborators.

mod controller;
mod dns;
mod error;
mod provision;
pub mod stage;

pub use controller::{ActivationOutcome, make_active, terminate_vm};
pub use dns::{point_domains_at_load_balancer, remove_domain_records};
pub use error::LifecycleError;
pub use provision::{Configuration, Provisioning, provision};
