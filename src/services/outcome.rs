// ABOUTME: Result type for remote deletions.
// ABOUTME: Distinguishes "deleted now" from "was already gone" from a real failure.

use std::fmt;

/// Outcome of asking a remote service to delete something.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The remote side had nothing to delete.
    AlreadyAbsent,
    Failed(String),
}

impl DeleteOutcome {
    /// Deleted and already-absent both leave the resource gone.
    pub fn is_gone(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted | DeleteOutcome::AlreadyAbsent)
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            DeleteOutcome::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for DeleteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeleteOutcome::Deleted => write!(f, "deleted"),
            DeleteOutcome::AlreadyAbsent => write!(f, "already absent"),
            DeleteOutcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}
