//! Read-only access to a committed revision.

use relaxo_store::{ObjectStore, TreeEntry};
use relaxo_types::ObjectId;
use serde::de::DeserializeOwned;

use crate::codec::Codec;
use crate::error::{DatabaseError, DatabaseResult};

/// A committed revision, or the empty revision of a branch with no commits.
///
/// Everything a view can reach is immutable, so a view stays consistent no
/// matter what is committed after it was taken.
pub struct View<'a, C: Codec> {
    codec: &'a C,
    store: &'a dyn ObjectStore,
    commit: Option<ObjectId>,
    root: Option<ObjectId>,
}

impl<'a, C: Codec> View<'a, C> {
    pub(crate) fn new(
        codec: &'a C,
        store: &'a dyn ObjectStore,
        commit: Option<ObjectId>,
        root: Option<ObjectId>,
    ) -> Self {
        Self {
            codec,
            store,
            commit,
            root,
        }
    }

    /// The commit this view shows; `None` for an empty branch.
    pub fn commit(&self) -> Option<ObjectId> {
        self.commit
    }

    /// Root tree of the revision.
    pub fn root(&self) -> Option<ObjectId> {
        self.root
    }

    pub fn read<T: DeserializeOwned>(&self, path: &str) -> DatabaseResult<Option<T>> {
        blob_at(self.store, self.root.as_ref(), path)?
            .map(|id| decode_blob(self.codec, self.store, &id))
            .transpose()
    }

    pub fn read_bytes(&self, path: &str) -> DatabaseResult<Option<Vec<u8>>> {
        blob_at(self.store, self.root.as_ref(), path)?
            .map(|id| Ok(self.store.read_blob(&id)?.data))
            .transpose()
    }

    /// Whether a document or directory exists at `path`.
    pub fn exists(&self, path: &str) -> DatabaseResult<bool> {
        match &self.root {
            Some(root) => Ok(relaxo_tree::lookup(self.store, root, path)?.is_some()),
            None => Ok(false),
        }
    }

    pub fn list(&self, dir: &str) -> DatabaseResult<Vec<TreeEntry>> {
        list_at(self.store, self.root.as_ref(), dir)
    }

    pub fn leaves(&self, prefix: &str) -> DatabaseResult<Vec<(String, ObjectId)>> {
        leaves_at(self.store, self.root.as_ref(), prefix)
    }
}

/// Blob id of the document at `path` under `root`, if there is one.
pub(crate) fn blob_at(
    store: &dyn ObjectStore,
    root: Option<&ObjectId>,
    path: &str,
) -> DatabaseResult<Option<ObjectId>> {
    let Some(root) = root else {
        relaxo_tree::split_path(path)?;
        return Ok(None);
    };
    Ok(relaxo_tree::lookup(store, root, path)?
        .filter(|entry| !entry.is_tree())
        .map(|entry| entry.object_id))
}

pub(crate) fn list_at(
    store: &dyn ObjectStore,
    root: Option<&ObjectId>,
    dir: &str,
) -> DatabaseResult<Vec<TreeEntry>> {
    match root {
        Some(root) => Ok(relaxo_tree::list(store, root, dir)?),
        None => Ok(Vec::new()),
    }
}

pub(crate) fn leaves_at(
    store: &dyn ObjectStore,
    root: Option<&ObjectId>,
    prefix: &str,
) -> DatabaseResult<Vec<(String, ObjectId)>> {
    match root {
        Some(root) => Ok(relaxo_tree::leaves(store, root, prefix)?),
        None => Ok(Vec::new()),
    }
}

pub(crate) fn decode_blob<C: Codec, T: DeserializeOwned>(
    codec: &C,
    store: &dyn ObjectStore,
    id: &ObjectId,
) -> DatabaseResult<T> {
    let blob = store.read_blob(id)?;
    codec
        .decode(&blob.data)
        .map_err(|e| DatabaseError::CorruptObject {
            id: *id,
            reason: format!("{} decode failed: {e}", codec.name()),
        })
}
