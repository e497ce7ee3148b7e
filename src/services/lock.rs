// ABOUTME: Named mutual-exclusion locks with time-to-live expiry.
// ABOUTME: MemoryLockProvider serves single-host deployments and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Information about who holds a lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Lock name.
    pub name: String,
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
}

impl LockInfo {
    /// Lock info for the current process.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
        }
    }
}

/// Proof of holding a lock. Releasing with a token only frees the lock if
/// it was not meanwhile expired and taken by someone else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    pub info: LockInfo,
    pub token: u64,
}

#[async_trait]
pub trait LockProvider: Send + Sync {
    /// Take `name` if it is free or its holder's time-to-live ran out.
    /// Returns `None` when someone else holds it.
    async fn try_acquire(&self, name: &str, ttl: Duration)
    -> Result<Option<LockToken>, LockError>;

    async fn release(&self, token: &LockToken) -> Result<(), LockError>;

    /// Current holder of `name`, if any.
    async fn holder(&self, name: &str) -> Result<Option<LockInfo>, LockError>;

    /// Wait until `name` can be taken, polling every `poll` for at most `wait`.
    async fn acquire(
        &self,
        name: &str,
        ttl: Duration,
        poll: Duration,
        wait: Duration,
    ) -> Result<LockToken, LockError> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(token) = self.try_acquire(name, ttl).await? {
                return Ok(token);
            }
            if Instant::now() >= deadline {
                let holder = self.holder(name).await?;
                return Err(LockError::Timeout {
                    name: name.to_string(),
                    holder: holder.map(|h| format!("{} (pid {})", h.holder, h.pid)),
                });
            }
            tracing::debug!("Lock {} is held, retrying in {:?}", name, poll);
            tokio::time::sleep(poll).await;
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LockError {
    #[error("timed out waiting for lock {name} held by {}", .holder.as_deref().unwrap_or("unknown"))]
    Timeout {
        name: String,
        holder: Option<String>,
    },

    #[error("lock backend error: {0}")]
    Backend(String),
}

struct Entry {
    token: LockToken,
    expires_at: Instant,
}

/// Process-local lock table.
#[derive(Default)]
pub struct MemoryLockProvider {
    locks: Mutex<HashMap<String, Entry>>,
    next_token: AtomicU64,
}

impl MemoryLockProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockProvider for MemoryLockProvider {
    async fn try_acquire(
        &self,
        name: &str,
        ttl: Duration,
    ) -> Result<Option<LockToken>, LockError> {
        let now = Instant::now();
        let mut locks = self.locks.lock();
        if let Some(existing) = locks.get(name) {
            if existing.expires_at > now {
                return Ok(None);
            }
            tracing::warn!(
                "Breaking expired lock {} held by {} (pid {}) since {}",
                name,
                existing.token.info.holder,
                existing.token.info.pid,
                existing.token.info.started_at
            );
        }
        let token = LockToken {
            info: LockInfo::new(name),
            token: self.next_token.fetch_add(1, Ordering::Relaxed) + 1,
        };
        locks.insert(
            name.to_string(),
            Entry {
                token: token.clone(),
                expires_at: now + ttl,
            },
        );
        Ok(Some(token))
    }

    async fn release(&self, token: &LockToken) -> Result<(), LockError> {
        let mut locks = self.locks.lock();
        match locks.get(&token.info.name) {
            Some(entry) if entry.token.token == token.token => {
                locks.remove(&token.info.name);
            }
            _ => {
                tracing::debug!(
                    "Lock {} was already released or taken over",
                    token.info.name
                );
            }
        }
        Ok(())
    }

    async fn holder(&self, name: &str) -> Result<Option<LockInfo>, LockError> {
        let now = Instant::now();
        Ok(self
            .locks
            .lock()
            .get(name)
            .filter(|e| e.expires_at > now)
            .map(|e| e.token.info.clone()))
    }
}
