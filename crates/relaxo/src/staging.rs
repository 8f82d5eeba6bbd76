//! Transaction-local object store layered over the durable one.

use relaxo_store::{InMemoryObjectStore, ObjectKind, ObjectStore, StoredObject, StoreResult, Tree};
use relaxo_types::ObjectId;

/// Writes land in memory; reads fall through to the durable store.
///
/// Nothing reaches the durable store until [`flush`](Self::flush), so
/// dropping a staging store discards the transaction's objects.
pub(crate) struct StagingStore<'a> {
    durable: &'a dyn ObjectStore,
    overlay: InMemoryObjectStore,
}

impl<'a> StagingStore<'a> {
    pub(crate) fn new(durable: &'a dyn ObjectStore) -> Self {
        Self {
            durable,
            overlay: InMemoryObjectStore::new(),
        }
    }

    /// Copy every staged object reachable from `root` into the durable
    /// store, children before parents. Returns the number of objects
    /// written.
    ///
    /// A subtree that is not staged is already durable, and so is
    /// everything beneath it; it is not traversed.
    pub(crate) fn flush(&self, root: &ObjectId) -> StoreResult<usize> {
        let mut written = 0;
        self.flush_object(root, &mut written)?;
        Ok(written)
    }

    fn flush_object(&self, id: &ObjectId, written: &mut usize) -> StoreResult<()> {
        let Some(object) = self.overlay.read(id)? else {
            return Ok(());
        };
        if object.kind == ObjectKind::Tree {
            for entry in Tree::from_stored_object(&object)?.entries {
                self.flush_object(&entry.object_id, written)?;
            }
        }
        self.durable.write(&object)?;
        *written += 1;
        Ok(())
    }
}

impl ObjectStore for StagingStore<'_> {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        match self.overlay.read(id)? {
            Some(object) => Ok(Some(object)),
            None => self.durable.read(id),
        }
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        self.overlay.write(object)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.overlay.exists(id)? || self.durable.exists(id)?)
    }

    /// Only staged objects can be deleted.
    fn delete(&self, id: &ObjectId) -> StoreResult<bool> {
        self.overlay.delete(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaxo_store::TreeEntry;

    #[test]
    fn writes_stay_in_memory_until_flushed() {
        let durable = InMemoryObjectStore::new();
        let staging = StagingStore::new(&durable);

        let leaf = staging.put_blob(b"staged").unwrap();
        assert!(staging.exists(&leaf).unwrap());
        assert!(!durable.exists(&leaf).unwrap());

        let tree = Tree::new(vec![TreeEntry::blob("doc", leaf)]);
        let root = staging.write(&tree.to_stored_object().unwrap()).unwrap();
        assert_eq!(staging.overlay.len(), 2);

        assert_eq!(staging.flush(&root).unwrap(), 2);
        assert!(durable.exists(&leaf).unwrap());
        assert!(durable.exists(&root).unwrap());
    }

    #[test]
    fn reads_fall_through() {
        let durable = InMemoryObjectStore::new();
        let id = durable.put_blob(b"durable").unwrap();
        let staging = StagingStore::new(&durable);
        assert_eq!(staging.read_blob(&id).unwrap().data, b"durable");
        assert!(!staging.delete(&id).unwrap());
    }

    #[test]
    fn unreachable_objects_are_not_flushed() {
        let durable = InMemoryObjectStore::new();
        let staging = StagingStore::new(&durable);
        let orphan = staging.put_blob(b"appended but never written").unwrap();
        let root = staging.write(&Tree::empty().to_stored_object().unwrap()).unwrap();

        assert_eq!(staging.flush(&root).unwrap(), 1);
        assert!(!durable.exists(&orphan).unwrap());
    }

    #[test]
    fn durable_subtrees_are_not_traversed() {
        let durable = InMemoryObjectStore::new();
        let old_leaf = durable.put_blob(b"old").unwrap();
        let old_dir = durable
            .write(&Tree::new(vec![TreeEntry::blob("x", old_leaf)]).to_stored_object().unwrap())
            .unwrap();

        let staging = StagingStore::new(&durable);
        let new_leaf = staging.put_blob(b"new").unwrap();
        let root = Tree::new(vec![TreeEntry::tree("old", old_dir), TreeEntry::blob("new", new_leaf)]);
        let root = staging.write(&root.to_stored_object().unwrap()).unwrap();

        // Root and the new leaf only.
        assert_eq!(staging.flush(&root).unwrap(), 2);
    }
}
