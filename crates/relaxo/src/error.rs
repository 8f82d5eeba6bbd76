use std::path::PathBuf;

use relaxo_refs::RefError;
use relaxo_store::StoreError;
use relaxo_tree::TreeError;
use relaxo_types::ObjectId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("path conflict at {path:?}: {reason}")]
    PathConflict { path: String, reason: String },

    /// The branch moved between the start of the transaction and the
    /// reference update.
    #[error("branch {branch:?} was modified concurrently")]
    ConcurrentModification { branch: String },

    /// The branch's lock file exists. If no other writer is running, a
    /// writer crashed mid-update and the file has to be removed.
    #[error("branch {branch:?} is locked: remove {} if no other writer is running", .lock_path.display())]
    Locked { branch: String, lock_path: PathBuf },

    #[error("corrupt object {id}: {reason}")]
    CorruptObject { id: ObjectId, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid branch name {name:?}: {reason}")]
    InvalidBranch { name: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("reference error: {0}")]
    Refs(RefError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DatabaseError {
    /// Whether repeating the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DatabaseError::ConcurrentModification { .. })
    }
}

impl From<StoreError> for DatabaseError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => DatabaseError::NotFound(format!("object {id}")),
            StoreError::HashMismatch { id, computed } => DatabaseError::CorruptObject {
                id,
                reason: format!("content hashes to {computed}"),
            },
            StoreError::CorruptObject { id, reason } => DatabaseError::CorruptObject { id, reason },
            StoreError::NullObjectId => DatabaseError::CorruptObject {
                id: ObjectId::null(),
                reason: "object hashes to the null id".into(),
            },
            StoreError::Serialization(msg) => DatabaseError::Serialization(msg),
            StoreError::Io(e) => DatabaseError::Io(e),
        }
    }
}

impl From<TreeError> for DatabaseError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::InvalidPath { path, reason } => DatabaseError::InvalidPath { path, reason },
            TreeError::PathConflict { path, reason } => DatabaseError::PathConflict { path, reason },
            TreeError::Store(e) => e.into(),
        }
    }
}

impl From<RefError> for DatabaseError {
    fn from(err: RefError) -> Self {
        match err {
            RefError::InvalidName { name, reason } => DatabaseError::InvalidBranch { name, reason },
            RefError::Conflict { name, .. } => DatabaseError::ConcurrentModification {
                branch: short_name(&name),
            },
            RefError::Locked { name, lock_path } => DatabaseError::Locked {
                branch: short_name(&name),
                lock_path,
            },
            RefError::DeleteCurrentBranch { name } => DatabaseError::InvalidBranch {
                name,
                reason: "HEAD points at it".into(),
            },
            RefError::NameCollision { name, existing } => DatabaseError::InvalidBranch {
                name: short_name(&name),
                reason: format!("collides with existing branch {:?}", short_name(&existing)),
            },
            RefError::Io(e) => DatabaseError::Io(e),
            other => DatabaseError::Refs(other),
        }
    }
}

fn short_name(canonical: &str) -> String {
    relaxo_refs::branch_name(canonical)
        .unwrap_or(canonical)
        .to_string()
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;
