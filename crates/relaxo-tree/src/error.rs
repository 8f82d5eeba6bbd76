use relaxo_store::StoreError;

/// Errors from tree building and path resolution.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// The path is empty or contains an illegal segment.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// A write would pass through a document, or replace a directory.
    #[error("path conflict at {path:?}: {reason}")]
    PathConflict { path: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;
