// ABOUTME: Compute provider interface for creating, querying and deleting VMs.
// ABOUTME: Provider-specific clients implement ComputeProvider.

use async_trait::async_trait;
use std::net::IpAddr;

use super::DeleteOutcome;

/// VM status as reported by the compute provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    /// Still being created.
    Building,
    /// Created and powered on.
    Active,
    /// The provider gave up creating the VM.
    Error,
    /// No such VM.
    Deleted,
}

#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// Start creating a VM, returning the provider's identifier for it.
    async fn create_vm(&self, name: &str) -> Result<String, ComputeError>;

    async fn vm_state(&self, vm_id: &str) -> Result<VmState, ComputeError>;

    /// Public address of the VM, if one has been assigned yet.
    async fn public_address(&self, vm_id: &str) -> Result<Option<IpAddr>, ComputeError>;

    async fn delete_vm(&self, vm_id: &str) -> DeleteOutcome;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ComputeError {
    #[error("compute request failed: {0}")]
    Request(String),

    #[error("quota exceeded: {0}")]
    Quota(String),

    #[error("compute provider unavailable")]
    Unavailable,
}
