// ABOUTME: Managed resources: servers, appservers, instances and load balancers.
// ABOUTME: Each stateful resource declares its state machine next to its record type.

pub mod appserver;
pub mod instance;
pub mod load_balancer;
pub mod server;
mod snapshot;

pub use appserver::{AppServer, AppServerGroup, AppServerStatus, NewAppServer};
pub use instance::{
    DatabaseSettings, DomainRouting, Instance, InstanceDomain, InstanceGroup, InstanceSettings,
    InstanceStatus, NewInstance, StorageSettings,
};
pub use load_balancer::{LoadBalancingServer, NewLoadBalancer};
pub use server::{Server, ServerGroup, ServerStatus};
pub use snapshot::ConfigurationSnapshot;
