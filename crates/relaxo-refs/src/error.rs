//! Error types for reference operations.

use std::path::PathBuf;

use relaxo_types::ObjectId;
use thiserror::Error;

/// Errors that can occur during reference operations.
#[derive(Debug, Error)]
pub enum RefError {
    /// The branch or ref name is invalid.
    #[error("invalid ref name: {name}: {reason}")]
    InvalidName { name: String, reason: String },

    /// Compare-and-swap failed: the ref no longer holds the expected value.
    #[error("ref {name} moved: expected {}, found {}", display_target(.expected), display_target(.actual))]
    Conflict {
        name: String,
        expected: Option<ObjectId>,
        actual: Option<ObjectId>,
    },

    /// The ref's lock file exists. Either another writer is mid-update or
    /// a writer died holding it; in the latter case the file must be removed
    /// by hand.
    #[error("ref {name} is locked: {} exists", .lock_path.display())]
    Locked { name: String, lock_path: PathBuf },

    /// Creating the ref would nest it inside another ref or another ref
    /// inside it (`feature` and `feature/x`).
    #[error("ref {name} collides with existing ref {existing}")]
    NameCollision { name: String, existing: String },

    /// Cannot delete the branch HEAD points at.
    #[error("cannot delete current branch: {name}")]
    DeleteCurrentBranch { name: String },

    /// A ref file exists but does not contain a valid target.
    #[error("corrupt ref {name}: {reason}")]
    Corrupt { name: String, reason: String },

    /// I/O error during file-based ref operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_target(target: &Option<ObjectId>) -> String {
    target
        .map(|id| id.short_hex())
        .unwrap_or_else(|| "nothing".to_string())
}

/// Convenience type alias for ref operations.
pub type Result<T> = std::result::Result<T, RefError>;
