//! Loose-object storage on the local filesystem.
//!
//! On-disk format, one file per object:
//! ```text
//! objects/<2 hex>/<62 hex>      zstd( "<kind> <len>\0" ++ data )
//! ```
//! Files are written to a temporary name in the fan-out directory and then
//! renamed into place, so a crash never leaves a half-written object under
//! its final name.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use relaxo_types::ObjectId;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::object::{ObjectKind, StoredObject};
use crate::traits::ObjectStore;

/// Default zstd level for loose objects.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Filesystem-backed [`ObjectStore`].
#[derive(Debug)]
pub struct FileObjectStore {
    root: PathBuf,
    compression_level: i32,
    sync_writes: bool,
}

impl FileObjectStore {
    /// Open (or create) an object directory.
    pub fn open(root: &Path) -> StoreResult<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            sync_writes: false,
        })
    }

    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// `fsync` every object before it is renamed into place.
    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        let (dir, file) = id.fanout();
        self.root.join(dir).join(file)
    }

    fn encode(&self, object: &StoredObject) -> StoreResult<Vec<u8>> {
        let mut raw = format!("{} {}\0", object.kind, object.data.len()).into_bytes();
        raw.extend_from_slice(&object.data);
        Ok(zstd::encode_all(raw.as_slice(), self.compression_level)?)
    }

    fn decode(id: &ObjectId, bytes: &[u8]) -> StoreResult<StoredObject> {
        let corrupt = |reason: &str| StoreError::CorruptObject {
            id: *id,
            reason: reason.to_string(),
        };
        let raw = zstd::decode_all(bytes).map_err(|_| corrupt("not a zstd frame"))?;
        let nul = raw
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| corrupt("missing header terminator"))?;
        let header = std::str::from_utf8(&raw[..nul]).map_err(|_| corrupt("header is not UTF-8"))?;
        let (kind, len) = header
            .split_once(' ')
            .ok_or_else(|| corrupt("malformed header"))?;
        let kind: ObjectKind = kind.parse().map_err(|_| corrupt("unknown object kind"))?;
        let len: usize = len.parse().map_err(|_| corrupt("malformed length"))?;

        let data = raw[nul + 1..].to_vec();
        if data.len() != len {
            return Err(corrupt("length does not match header"));
        }

        let object = StoredObject::new(kind, data);
        let computed = object.compute_id();
        if computed != *id {
            return Err(StoreError::HashMismatch { id: *id, computed });
        }
        Ok(object)
    }
}

impl ObjectStore for FileObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        match fs::read(self.object_path(id)) {
            Ok(bytes) => Self::decode(id, &bytes).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        let path = self.object_path(&id);
        if path.exists() {
            return Ok(id);
        }

        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;

        let encoded = self.encode(object)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&encoded)?;
        if self.sync_writes {
            tmp.as_file().sync_all()?;
        }
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        debug!(id = %id.short_hex(), kind = %object.kind, size = object.size, "object written");
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.object_path(id).is_file())
    }

    fn delete(&self, id: &ObjectId) -> StoreResult<bool> {
        match fs::remove_file(self.object_path(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Blob, Tree, TreeEntry};

    fn open_store() -> (tempfile::TempDir, FileObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileObjectStore::open(&dir.path().join("objects")).unwrap();
        (dir, store)
    }

    /// Files in the fan-out directories.
    fn object_files(store: &FileObjectStore) -> usize {
        fs::read_dir(store.root())
            .unwrap()
            .map(|dir| fs::read_dir(dir.unwrap().path()).unwrap().count())
            .sum()
    }

    #[test]
    fn write_and_read_roundtrip() {
        let (_dir, store) = open_store();
        let blob = Blob::new(b"\"good-7\"".to_vec());
        let id = store.write(&blob.to_stored_object()).unwrap();
        assert_eq!(id, blob.id());
        assert_eq!(store.read_blob(&id).unwrap(), blob);
    }

    #[test]
    fn objects_use_fanout_layout() {
        let (_dir, store) = open_store();
        let id = store.put_blob(b"laid out").unwrap();
        let (dir, file) = id.fanout();
        assert!(store.root().join(dir).join(file).is_file());
    }

    #[test]
    fn put_is_idempotent() {
        let (_dir, store) = open_store();
        let id1 = store.put_blob(b"same").unwrap();
        let id2 = store.put_blob(b"same").unwrap();
        assert_eq!(id1, id2);
        assert_eq!(object_files(&store), 1);
    }

    #[test]
    fn missing_object_reads_none() {
        let (_dir, store) = open_store();
        let id = ObjectId::from_bytes(b"nope");
        assert!(store.read(&id).unwrap().is_none());
        assert!(!store.exists(&id).unwrap());
        assert!(matches!(store.get(&id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects");
        let tree_id = {
            let store = FileObjectStore::open(&path).unwrap().with_sync_writes(true);
            let leaf = store.put_blob(b"persisted").unwrap();
            let tree = Tree::new(vec![TreeEntry::blob("doc", leaf)]);
            store.write(&tree.to_stored_object().unwrap()).unwrap()
        };
        let store = FileObjectStore::open(&path).unwrap();
        let tree = store.read_tree(&tree_id).unwrap();
        let leaf = tree.get("doc").unwrap().object_id;
        assert_eq!(store.read_blob(&leaf).unwrap().data, b"persisted");
    }

    #[test]
    fn tampered_object_is_detected() {
        let (_dir, store) = open_store();
        let id = store.put_blob(b"original").unwrap();
        let forged = zstd::encode_all(&b"blob 8\0tampered"[..], 3).unwrap();
        fs::write(store.object_path(&id), forged).unwrap();
        assert!(matches!(
            store.read(&id),
            Err(StoreError::HashMismatch { .. })
        ));
    }

    #[test]
    fn garbage_file_is_corrupt() {
        let (_dir, store) = open_store();
        let id = store.put_blob(b"original").unwrap();
        fs::write(store.object_path(&id), b"definitely not zstd").unwrap();
        assert!(matches!(
            store.read(&id),
            Err(StoreError::CorruptObject { .. })
        ));
    }

    #[test]
    fn length_mismatch_is_corrupt() {
        let (_dir, store) = open_store();
        let id = store.put_blob(b"abc").unwrap();
        let forged = zstd::encode_all(&b"blob 99\0abc"[..], 3).unwrap();
        fs::write(store.object_path(&id), forged).unwrap();
        assert!(matches!(
            store.read(&id),
            Err(StoreError::CorruptObject { .. })
        ));
    }

    #[test]
    fn delete_removes_file() {
        let (_dir, store) = open_store();
        let id = store.put_blob(b"gc me").unwrap();
        assert!(store.delete(&id).unwrap());
        assert!(!store.delete(&id).unwrap());
        assert_eq!(object_files(&store), 0);
    }

    #[test]
    fn compression_level_is_configurable() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileObjectStore::open(dir.path())
            .unwrap()
            .with_compression_level(19);
        let data = vec![b'a'; 4096];
        let id = store.put_blob(&data).unwrap();
        assert_eq!(store.read_blob(&id).unwrap().data, data);
    }
}
