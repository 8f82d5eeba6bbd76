//! On-disk reference store.
//!
//! Layout under the database directory:
//! ```text
//! HEAD                    "ref: refs/heads/<branch>\n" or "<hex>\n"
//! refs/heads/<branch>     "<hex>\n"
//! refs/heads/<branch>.lock  present only while an update is in flight
//! ```
//! An update creates the `.lock` file exclusively, re-reads the ref,
//! compares it with the expected value, writes the new value into the lock
//! file and renames it over the ref. Whoever fails to create the lock file
//! gets [`RefError::Locked`]. A lock file left behind by a crashed writer is
//! never removed automatically.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use relaxo_types::ObjectId;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{RefError, Result};
use crate::names::{colliding_ref, validate_branch_name, validate_ref_name};
use crate::traits::RefStore;
use crate::types::{branch_name, branch_ref_name, Head};

const SYMBOLIC_PREFIX: &str = "ref: ";
const LOCK_SUFFIX: &str = ".lock";

/// Filesystem-backed [`RefStore`].
#[derive(Debug)]
pub struct FileRefStore {
    root: PathBuf,
    sync_writes: bool,
}

impl FileRefStore {
    /// Open a ref store rooted at the database directory, creating
    /// `refs/heads/` if needed.
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root.join("refs").join("heads"))?;
        Ok(Self {
            root: root.to_path_buf(),
            sync_writes: false,
        })
    }

    /// `fsync` ref and HEAD files before renaming them into place.
    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    fn ref_path(&self, name: &str) -> PathBuf {
        name.split('/')
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    fn parse_target(name: &str, content: &str) -> Result<ObjectId> {
        content.trim().parse().map_err(|e| RefError::Corrupt {
            name: name.to_string(),
            reason: format!("{e}"),
        })
    }

    fn read_file(path: &Path) -> Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove directories left empty above a deleted ref, so that a later
    /// ref may take their name. Stops at `refs/<namespace>`.
    fn prune_empty_dirs(&self, ref_path: &Path) {
        let refs = self.root.join("refs");
        let mut dir = ref_path.parent();
        while let Some(current) = dir {
            if current.parent() == Some(refs.as_path()) || !current.starts_with(&refs) {
                break;
            }
            if fs::remove_dir(current).is_err() {
                break;
            }
            dir = current.parent();
        }
    }

    /// Replace `path` atomically with `content` via a sibling temp file.
    fn replace_file(&self, path: &Path, content: &str) -> Result<()> {
        let dir = path.parent().unwrap_or(&self.root);
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        if self.sync_writes {
            tmp.as_file().sync_all()?;
        }
        tmp.persist(path).map_err(|e| RefError::Io(e.error))?;
        Ok(())
    }
}

/// Exclusive lock on one ref, released (deleted) on drop unless committed.
struct RefLock {
    lock_path: PathBuf,
    file: File,
    committed: bool,
}

impl RefLock {
    fn acquire(ref_path: &Path, name: &str) -> Result<Self> {
        let mut lock_name = ref_path.as_os_str().to_os_string();
        lock_name.push(LOCK_SUFFIX);
        let lock_path = PathBuf::from(lock_name);

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => Ok(Self {
                lock_path,
                file,
                committed: false,
            }),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(RefError::Locked {
                name: name.to_string(),
                lock_path,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the new value into the lock file and rename it over the ref.
    fn commit(mut self, target: &Path, content: &str, sync: bool) -> Result<()> {
        self.file.write_all(content.as_bytes())?;
        if sync {
            self.file.sync_all()?;
        }
        fs::rename(&self.lock_path, target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for RefLock {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = fs::remove_file(&self.lock_path) {
                warn!(path = %self.lock_path.display(), error = %e, "failed to release ref lock");
            }
        }
    }
}

impl RefStore for FileRefStore {
    fn read_ref(&self, name: &str) -> Result<Option<ObjectId>> {
        validate_ref_name(name)?;
        let path = self.ref_path(name);
        // A directory, or a path running through a ref file, holds no ref.
        if !path.is_file() {
            return Ok(None);
        }
        match Self::read_file(&path)? {
            Some(content) => Self::parse_target(name, &content).map(Some),
            None => Ok(None),
        }
    }

    fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        new: ObjectId,
    ) -> Result<()> {
        validate_ref_name(name)?;
        let current = self.read_ref(name)?;
        if current != expected {
            return Err(RefError::Conflict {
                name: name.to_string(),
                expected,
                actual: current,
            });
        }
        if current.is_none() {
            let existing = self.list_refs("refs/")?;
            if let Some(other) = colliding_ref(name, existing.iter().map(|(n, _)| n.as_str())) {
                return Err(RefError::NameCollision {
                    name: name.to_string(),
                    existing: other.to_string(),
                });
            }
        }

        let path = self.ref_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock = RefLock::acquire(&path, name)?;
        let actual = self.read_ref(name)?;
        if actual != expected {
            return Err(RefError::Conflict {
                name: name.to_string(),
                expected,
                actual,
            });
        }
        lock.commit(&path, &format!("{new}\n"), self.sync_writes)?;

        debug!(name, target = %new.short_hex(), "ref updated");
        Ok(())
    }

    fn delete_ref(&self, name: &str) -> Result<bool> {
        validate_ref_name(name)?;
        if let Some(Head::Symbolic(current)) = self.head()? {
            if name == branch_ref_name(&current) {
                return Err(RefError::DeleteCurrentBranch { name: current });
            }
        }
        let path = self.ref_path(name);
        if !path.is_file() {
            return Ok(false);
        }
        let lock = RefLock::acquire(&path, name)?;
        let removed = match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        drop(lock);
        self.prune_empty_dirs(&path);
        Ok(removed)
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, ObjectId)>> {
        let refs_dir = self.root.join("refs");
        let mut refs = Vec::new();
        for entry in WalkDir::new(&refs_dir).min_depth(1) {
            let entry = entry.map_err(|e| {
                RefError::Io(
                    e.into_io_error()
                        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "walk failed")),
                )
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if name.ends_with(LOCK_SUFFIX) || !name.starts_with(prefix) {
                continue;
            }
            if validate_ref_name(&name).is_err() {
                warn!(path = %entry.path().display(), "skipping file with invalid ref name");
                continue;
            }
            if let Some(target) = self.read_ref(&name)? {
                refs.push((name, target));
            }
        }
        refs.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(refs)
    }

    fn head(&self) -> Result<Option<Head>> {
        let Some(content) = Self::read_file(&self.root.join("HEAD"))? else {
            return Ok(None);
        };
        let content = content.trim();
        match content.strip_prefix(SYMBOLIC_PREFIX) {
            Some(target) => {
                let branch = branch_name(target).ok_or_else(|| RefError::Corrupt {
                    name: "HEAD".into(),
                    reason: format!("symbolic target outside refs/heads: {target}"),
                })?;
                Ok(Some(Head::Symbolic(branch.to_string())))
            }
            None => Self::parse_target("HEAD", content).map(|id| Some(Head::Detached(id))),
        }
    }

    fn set_head(&self, branch: &str) -> Result<()> {
        validate_branch_name(branch)?;
        let content = format!("{SYMBOLIC_PREFIX}{}\n", branch_ref_name(branch));
        self.replace_file(&self.root.join("HEAD"), &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(seed: u8) -> ObjectId {
        ObjectId::from_hash([seed; 32])
    }

    fn open_store() -> (tempfile::TempDir, FileRefStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRefStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn create_advance_and_read() {
        let (dir, store) = open_store();
        store.compare_and_swap("refs/heads/master", None, oid(1)).unwrap();
        store
            .compare_and_swap("refs/heads/master", Some(oid(1)), oid(2))
            .unwrap();

        assert_eq!(store.branch_tip("master").unwrap(), Some(oid(2)));
        let on_disk = fs::read_to_string(dir.path().join("refs/heads/master")).unwrap();
        assert_eq!(on_disk, format!("{}\n", oid(2)));
        assert!(!dir.path().join("refs/heads/master.lock").exists());
    }

    #[test]
    fn stale_expectation_is_conflict_and_releases_lock() {
        let (dir, store) = open_store();
        store.compare_and_swap("refs/heads/master", None, oid(1)).unwrap();

        let err = store
            .compare_and_swap("refs/heads/master", None, oid(2))
            .unwrap_err();
        assert!(matches!(err, RefError::Conflict { actual: Some(a), .. } if a == oid(1)));
        assert!(!dir.path().join("refs/heads/master.lock").exists());
        assert_eq!(store.branch_tip("master").unwrap(), Some(oid(1)));
    }

    #[test]
    fn held_lock_blocks_update() {
        let (dir, store) = open_store();
        store.compare_and_swap("refs/heads/master", None, oid(1)).unwrap();
        fs::write(dir.path().join("refs/heads/master.lock"), b"").unwrap();

        let err = store
            .compare_and_swap("refs/heads/master", Some(oid(1)), oid(2))
            .unwrap_err();
        match &err {
            RefError::Locked { lock_path, .. } => {
                assert_eq!(lock_path, &dir.path().join("refs/heads/master.lock"))
            }
            other => panic!("expected Locked, got {other}"),
        }
        assert!(err.to_string().contains("master.lock"));
        // The foreign lock is not ours to remove.
        assert!(dir.path().join("refs/heads/master.lock").exists());

        fs::remove_file(dir.path().join("refs/heads/master.lock")).unwrap();
        store
            .compare_and_swap("refs/heads/master", Some(oid(1)), oid(2))
            .unwrap();
    }

    #[test]
    fn nested_branch_names() {
        let (_dir, store) = open_store();
        store
            .compare_and_swap("refs/heads/feature/import", None, oid(3))
            .unwrap();
        store.compare_and_swap("refs/heads/master", None, oid(4)).unwrap();

        assert_eq!(
            store.branches().unwrap(),
            vec![
                ("feature/import".to_string(), oid(3)),
                ("master".to_string(), oid(4)),
            ]
        );
    }

    #[test]
    fn nested_names_collide_without_touching_disk() {
        let (dir, store) = open_store();
        store.compare_and_swap("refs/heads/feature", None, oid(1)).unwrap();
        store.compare_and_swap("refs/heads/topic/a", None, oid(2)).unwrap();

        assert!(store.read_ref("refs/heads/feature/x").unwrap().is_none());
        assert!(store.read_ref("refs/heads/topic").unwrap().is_none());

        let err = store
            .compare_and_swap("refs/heads/feature/x", None, oid(3))
            .unwrap_err();
        assert!(matches!(err, RefError::NameCollision { .. }));
        let err = store
            .compare_and_swap("refs/heads/topic", None, oid(3))
            .unwrap_err();
        assert!(matches!(
            err,
            RefError::NameCollision { ref existing, .. } if existing == "refs/heads/topic/a"
        ));
        assert!(dir.path().join("refs/heads/feature").is_file());
        assert!(!dir.path().join("refs/heads/topic.lock").exists());
    }

    #[test]
    fn list_skips_lock_files() {
        let (dir, store) = open_store();
        store.compare_and_swap("refs/heads/master", None, oid(1)).unwrap();
        fs::write(dir.path().join("refs/heads/other.lock"), b"").unwrap();
        assert_eq!(store.list_refs("refs/").unwrap().len(), 1);
    }

    #[test]
    fn corrupt_ref_file() {
        let (dir, store) = open_store();
        fs::write(dir.path().join("refs/heads/master"), b"not a digest\n").unwrap();
        assert!(matches!(
            store.read_ref("refs/heads/master"),
            Err(RefError::Corrupt { .. })
        ));
    }

    #[test]
    fn head_roundtrip() {
        let (dir, store) = open_store();
        assert!(store.head().unwrap().is_none());

        store.set_head("master").unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("HEAD")).unwrap(),
            "ref: refs/heads/master\n"
        );
        assert_eq!(store.head().unwrap(), Some(Head::Symbolic("master".into())));

        fs::write(dir.path().join("HEAD"), format!("{}\n", oid(5))).unwrap();
        assert_eq!(store.head().unwrap(), Some(Head::Detached(oid(5))));
    }

    #[test]
    fn delete_ref_respects_head() {
        let (_dir, store) = open_store();
        store.compare_and_swap("refs/heads/master", None, oid(1)).unwrap();
        store.compare_and_swap("refs/heads/old", None, oid(2)).unwrap();
        store.set_head("master").unwrap();

        assert!(matches!(
            store.delete_ref("refs/heads/master"),
            Err(RefError::DeleteCurrentBranch { .. })
        ));
        assert!(store.delete_ref("refs/heads/old").unwrap());
        assert!(!store.delete_ref("refs/heads/old").unwrap());
    }

    #[test]
    fn deleting_nested_ref_frees_its_prefix() {
        let (dir, store) = open_store();
        store.compare_and_swap("refs/heads/feature/x/y", None, oid(1)).unwrap();
        assert!(store.delete_ref("refs/heads/feature/x/y").unwrap());
        assert!(!dir.path().join("refs/heads/feature").exists());
        assert!(dir.path().join("refs/heads").is_dir());

        store.compare_and_swap("refs/heads/feature", None, oid(2)).unwrap();
        assert_eq!(store.branch_tip("feature").unwrap(), Some(oid(2)));
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileRefStore::open(dir.path()).unwrap().with_sync_writes(true);
            store.compare_and_swap("refs/heads/master", None, oid(8)).unwrap();
            store.set_head("master").unwrap();
        }
        let store = FileRefStore::open(dir.path()).unwrap();
        assert_eq!(store.head().unwrap(), Some(Head::Symbolic("master".into())));
        assert_eq!(store.branch_tip("master").unwrap(), Some(oid(8)));
    }

    #[test]
    fn concurrent_swaps_have_one_winner() {
        use std::sync::Arc;
        use std::thread;

        let (_dir, store) = open_store();
        let store = Arc::new(store);
        store.compare_and_swap("refs/heads/master", None, oid(0)).unwrap();

        let handles: Vec<_> = (1..=8u8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store
                        .compare_and_swap("refs/heads/master", Some(oid(0)), oid(i))
                        .is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
