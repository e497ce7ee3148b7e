// ABOUTME: Per-load-balancer reconfiguration lock.
// ABOUTME: Serializes applies so at most one push per load balancer is in flight.

use std::time::Duration;

use crate::resources::load_balancer::lock_name;
use crate::services::{LockError, LockProvider, LockToken};
use crate::types::LoadBalancerId;

/// A held reconfiguration lock. Must be released explicitly with
/// [`ReconfigureLock::release`]; dropping it leaves the lock to expire.
#[must_use = "a held lock must be released"]
pub struct ReconfigureLock<'a> {
    locks: &'a dyn LockProvider,
    token: LockToken,
}

impl std::fmt::Debug for ReconfigureLock<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconfigureLock")
            .field("name", &self.token.info.name)
            .finish()
    }
}

impl<'a> ReconfigureLock<'a> {
    /// Take the lock without waiting. `None` means another reconfiguration
    /// of the same load balancer is running.
    pub async fn try_acquire(
        locks: &'a dyn LockProvider,
        lb: LoadBalancerId,
        ttl: Duration,
    ) -> Result<Option<Self>, LockError> {
        let token = locks.try_acquire(&lock_name(lb), ttl).await?;
        Ok(token.map(|token| Self { locks, token }))
    }

    /// Wait up to `wait` for the lock.
    pub async fn acquire(
        locks: &'a dyn LockProvider,
        lb: LoadBalancerId,
        ttl: Duration,
        poll: Duration,
        wait: Duration,
    ) -> Result<Self, LockError> {
        let token = locks.acquire(&lock_name(lb), ttl, poll, wait).await?;
        Ok(Self { locks, token })
    }

    pub async fn release(self) -> Result<(), LockError> {
        self.locks.release(&self.token).await
    }

    /// Release, logging instead of failing. Used on paths that already
    /// carry a more relevant result.
    pub async fn release_logged(self) {
        let name = self.token.info.name.clone();
        if let Err(e) = self.release().await {
            tracing::warn!("Failed to release lock {}: {}", name, e);
        }
    }
}
