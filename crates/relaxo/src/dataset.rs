//! The staging surface handed to a commit closure.

use relaxo_store::{ObjectKind, ObjectStore, TreeEntry};
use relaxo_tree::{Edit, Edits, TreeBuilder};
use relaxo_types::ObjectId;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::Codec;
use crate::error::{DatabaseError, DatabaseResult};
use crate::staging::StagingStore;
use crate::view::{blob_at, decode_blob, leaves_at, list_at};

/// Uncommitted changes on top of a base revision.
///
/// `append` stores a document and returns its handle (the blob's content
/// id); `write` binds a path to a handle; `delete` removes a path. Reads
/// see the base revision with the staged changes applied. Nothing is
/// durable until the owning commit succeeds.
pub struct Dataset<'a, C: Codec> {
    codec: &'a C,
    staging: StagingStore<'a>,
    base_commit: Option<ObjectId>,
    base_root: Option<ObjectId>,
    edits: Edits,
}

impl<'a, C: Codec> Dataset<'a, C> {
    pub(crate) fn new(
        codec: &'a C,
        durable: &'a dyn ObjectStore,
        base_commit: Option<ObjectId>,
        base_root: Option<ObjectId>,
    ) -> Self {
        Self {
            codec,
            staging: StagingStore::new(durable),
            base_commit,
            base_root,
            edits: Edits::new(),
        }
    }

    /// The commit this dataset started from; `None` on an empty branch.
    pub fn base(&self) -> Option<ObjectId> {
        self.base_commit
    }

    /// Encode `value` and stage it as a blob. Equal documents get equal
    /// handles.
    pub fn append<T: Serialize + ?Sized>(&mut self, value: &T) -> DatabaseResult<ObjectId> {
        let bytes = self
            .codec
            .encode(value)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.append_bytes(&bytes)
    }

    /// Stage raw bytes as a blob.
    pub fn append_bytes(&mut self, data: &[u8]) -> DatabaseResult<ObjectId> {
        Ok(self.staging.put_blob(data)?)
    }

    /// Bind `path` to a blob. The handle must come from `append` or name a
    /// blob that is already stored.
    pub fn write(&mut self, path: &str, handle: ObjectId) -> DatabaseResult<()> {
        match self.staging.read(&handle)? {
            Some(object) if object.kind == ObjectKind::Blob => {}
            _ => return Err(DatabaseError::NotFound(format!("blob {handle}"))),
        }
        self.edits.put(path, handle)?;
        Ok(())
    }

    /// `append` followed by `write`.
    pub fn insert<T: Serialize + ?Sized>(&mut self, path: &str, value: &T) -> DatabaseResult<ObjectId> {
        let handle = self.append(value)?;
        self.write(path, handle)?;
        Ok(handle)
    }

    /// Remove `path` and everything beneath it. Removing a missing path
    /// is a no-op.
    pub fn delete(&mut self, path: &str) -> DatabaseResult<()> {
        self.edits.remove(path)?;
        Ok(())
    }

    /// Whether any write or delete has been staged. A dataset with changes
    /// may still produce the base root, e.g. when rewriting equal content.
    pub fn has_changes(&self) -> bool {
        !self.edits.is_empty()
    }

    /// Root tree of the base revision with the staged changes applied.
    pub fn root(&self) -> DatabaseResult<ObjectId> {
        Ok(TreeBuilder::new(&self.staging).apply(self.base_root.as_ref(), &self.edits)?)
    }

    pub fn read<T: DeserializeOwned>(&self, path: &str) -> DatabaseResult<Option<T>> {
        self.document(path)?
            .map(|id| decode_blob(self.codec, &self.staging, &id))
            .transpose()
    }

    pub fn read_bytes(&self, path: &str) -> DatabaseResult<Option<Vec<u8>>> {
        self.document(path)?
            .map(|id| Ok(self.staging.read_blob(&id)?.data))
            .transpose()
    }

    /// Whether a document or directory exists at `path`.
    pub fn exists(&self, path: &str) -> DatabaseResult<bool> {
        if relaxo_tree::split_path(path)?.is_empty() {
            return Ok(true);
        }
        Ok(self.document(path)?.is_some() || !self.list(path)?.is_empty())
    }

    pub fn list(&self, dir: &str) -> DatabaseResult<Vec<TreeEntry>> {
        if !self.has_changes() {
            return list_at(&self.staging, self.base_root.as_ref(), dir);
        }
        let root = self.root()?;
        list_at(&self.staging, Some(&root), dir)
    }

    pub fn leaves(&self, prefix: &str) -> DatabaseResult<Vec<(String, ObjectId)>> {
        if !self.has_changes() {
            return leaves_at(&self.staging, self.base_root.as_ref(), prefix);
        }
        let root = self.root()?;
        leaves_at(&self.staging, Some(&root), prefix)
    }

    pub(crate) fn staging(&self) -> &StagingStore<'a> {
        &self.staging
    }

    /// Blob at `path`, consulting staged edits before the base revision.
    fn document(&self, path: &str) -> DatabaseResult<Option<ObjectId>> {
        match self.edits.get(path)? {
            Some(Edit::Put { id, .. }) => Ok(Some(*id)),
            // Only removals beneath the path: a document there survives.
            Some(Edit::Dir(dir)) if !dir.replace && !dir.has_puts() => {
                blob_at(&self.staging, self.base_root.as_ref(), path)
            }
            Some(_) => Ok(None),
            None => blob_at(&self.staging, self.base_root.as_ref(), path),
        }
    }
}
