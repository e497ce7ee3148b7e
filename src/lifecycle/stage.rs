// ABOUTME: Provisioning stage markers for the type state pattern.
// ABOUTME: Stages carry the data earlier steps produced, so later steps cannot run without it.

use std::net::IpAddr;

/// Records loaded, nothing launched yet.
/// Available actions: `launch_server()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Created;

/// The compute provider accepted the VM.
/// Available actions: `wait_for_server()`
#[derive(Debug, Clone)]
pub struct ServerLaunched {
    pub(crate) vm_id: String,
}

impl ServerLaunched {
    pub fn vm_id(&self) -> &str {
        &self.vm_id
    }
}

/// The VM answers on SSH at `address`.
/// Available actions: `configure()`
#[derive(Debug, Clone, Copy)]
pub struct ServerReady {
    pub(crate) address: IpAddr,
}

impl ServerReady {
    pub fn address(&self) -> IpAddr {
        self.address
    }
}

/// The configuration playbook succeeded.
/// Available actions: `finish()`
#[derive(Debug, Clone, Copy)]
pub struct Configured {
    pub(crate) address: IpAddr,
}

/// The configuration playbook failed; the VM is left up for inspection.
/// Available actions: `finish()`, `exit_code()`, `output_tail()`
#[derive(Debug, Clone)]
pub struct Failed {
    pub(crate) exit_code: Option<i32>,
    pub(crate) tail: Vec<String>,
}
