// ABOUTME: Errors returned by store implementations.
// ABOUTME: NotFound and Conflict are expected; Backend wraps storage failures.

use super::ResourceKey;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(ResourceKey),

    #[error("{key}: '{state_id}' is not a declared state")]
    InvalidState { key: ResourceKey, state_id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
