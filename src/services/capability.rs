// ABOUTME: Secondary resources an instance depends on (databases, storage, secrets, monitoring).
// ABOUTME: Each capability is a separate collaborator invoked in a fixed order.

use async_trait::async_trait;

use crate::resources::Instance;

use super::DeleteOutcome;

/// A secondary resource provisioned per instance.
///
/// `provision` must be idempotent: calling it for an instance that already
/// has the resource succeeds without creating a second one.
#[async_trait]
pub trait InstanceCapability: Send + Sync {
    /// Short name used in logs and warnings, e.g. `database`.
    fn name(&self) -> &'static str;

    async fn provision(&self, instance: &Instance) -> Result<(), CapabilityError>;

    async fn deprovision(&self, instance: &Instance) -> DeleteOutcome;
}

#[async_trait]
pub trait MonitoringController: Send + Sync {
    async fn enable(&self, instance: &Instance) -> Result<(), CapabilityError>;

    async fn disable(&self, instance: &Instance) -> DeleteOutcome;
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{capability} for instance {instance}: {message}")]
pub struct CapabilityError {
    pub capability: String,
    pub instance: String,
    pub message: String,
}

impl CapabilityError {
    pub fn new(
        capability: impl Into<String>,
        instance: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            capability: capability.into(),
            instance: instance.into(),
            message: message.into(),
        }
    }
}
