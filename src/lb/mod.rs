// ABOUTME: Load balancer configuration: rendering, applying and versioned reconfiguration.
// ABOUTME: One fragment per load balancer host, rebuilt from every bound instance.

mod aggregator;
mod applier;
mod error;
mod lock;
mod reconfigure;

pub use aggregator::{AggregationError, Aggregator, BackendEntries, LoadBalancerConfiguration};
pub use applier::{ApplyError, LoadBalancerApplier, PlaybookLoadBalancerApplier};
pub use error::{ReconfigurationError, ReconfigurationErrorKind};
pub use lock::ReconfigureLock;
pub use reconfigure::{ReconfigureOutcome, Reconfigurator};
