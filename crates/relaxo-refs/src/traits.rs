//! The [`RefStore`] trait defining the reference storage interface.

use relaxo_types::ObjectId;

use crate::error::Result;
use crate::types::{branch_name, branch_ref_name, Head, HEADS_PREFIX};

/// Storage backend for named references.
///
/// Implementations must be thread-safe and make [`compare_and_swap`]
/// atomic with respect to every other writer of the same backend.
///
/// [`compare_and_swap`]: RefStore::compare_and_swap
pub trait RefStore: Send + Sync {
    /// Read a ref by its canonical name (e.g. `refs/heads/master`).
    ///
    /// Returns `Ok(None)` if the ref does not exist.
    fn read_ref(&self, name: &str) -> Result<Option<ObjectId>>;

    /// Point `name` at `new` if it currently holds `expected`.
    ///
    /// `expected == None` means the ref must not exist yet. Fails with
    /// `RefError::Conflict` when the current value differs, with
    /// `RefError::NameCollision` when a new ref would nest with an existing
    /// one, and with `RefError::Locked` when the ref's lock is held.
    fn compare_and_swap(&self, name: &str, expected: Option<ObjectId>, new: ObjectId)
        -> Result<()>;

    /// Delete a ref. Returns `Ok(true)` if it existed.
    ///
    /// The branch HEAD names cannot be deleted.
    fn delete_ref(&self, name: &str) -> Result<bool>;

    /// All refs whose canonical name starts with `prefix`, sorted by name.
    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, ObjectId)>>;

    /// Read the current HEAD state; `Ok(None)` if it was never set.
    fn head(&self) -> Result<Option<Head>>;

    /// Point HEAD at a branch by short name.
    fn set_head(&self, branch: &str) -> Result<()>;

    /// Tip of a branch by short name.
    fn branch_tip(&self, branch: &str) -> Result<Option<ObjectId>> {
        self.read_ref(&branch_ref_name(branch))
    }

    /// All branches as `(short name, tip)` pairs.
    fn branches(&self) -> Result<Vec<(String, ObjectId)>> {
        Ok(self
            .list_refs(HEADS_PREFIX)?
            .into_iter()
            .filter_map(|(name, id)| branch_name(&name).map(|b| (b.to_string(), id)))
            .collect())
    }
}
