// ABOUTME: Library root for hangar - instance, appserver and load balancer lifecycle.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fsm;
pub mod lb;
pub mod lifecycle;
pub mod ops;
pub mod orchestration;
pub mod output;
pub mod platform;
pub mod resources;
pub mod services;
pub mod store;
pub mod types;
