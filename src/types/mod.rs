// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent ID confusion at compile time.

mod domain_name;
mod id;

pub use domain_name::{DomainName, DomainNameError};
pub use id::{
    AppServerId, AppServerMarker, Id, InstanceId, InstanceMarker, LoadBalancerId,
    LoadBalancerMarker, ServerId, ServerMarker,
};
