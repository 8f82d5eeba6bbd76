use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use relaxo_refs::{
    branch_ref_name, validate_branch_name, FileRefStore, Head, InMemoryRefStore, RefStore,
};
use relaxo_store::{Commit, FileObjectStore, InMemoryObjectStore, ObjectStore};
use relaxo_tree::Change;
use relaxo_types::ObjectId;
use tracing::{debug, info};

use crate::codec::{Codec, JsonCodec};
use crate::config::{DatabaseConfig, CONFIG_FILE};
use crate::error::DatabaseResult;
use crate::history::History;
use crate::view::View;

/// Name of the object directory inside a database directory.
pub const OBJECTS_DIR: &str = "objects";

/// A document database: an immutable object graph plus named branches.
///
/// Reads never block. Commits to the same branch are serialized inside the
/// process by a per-branch lock, and across processes by the
/// compare-and-swap on the branch reference.
pub struct Database<C: Codec = JsonCodec> {
    pub(crate) objects: Box<dyn ObjectStore>,
    pub(crate) refs: Box<dyn RefStore>,
    pub(crate) codec: C,
    pub(crate) config: DatabaseConfig,
    path: Option<PathBuf>,
    branch_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Database<JsonCodec> {
    /// Open the database at `path`, creating it if it does not exist.
    pub fn connect(path: impl AsRef<Path>) -> DatabaseResult<Self> {
        Self::connect_with_codec(path, JsonCodec)
    }

    /// A database that lives only as long as the value.
    pub fn in_memory() -> DatabaseResult<Self> {
        Self::in_memory_with_codec(JsonCodec)
    }
}

impl<C: Codec> Database<C> {
    pub fn connect_with_codec(path: impl AsRef<Path>, codec: C) -> DatabaseResult<Self> {
        let root = path.as_ref();
        fs::create_dir_all(root)?;
        let fresh = !root.join(CONFIG_FILE).exists();
        let config = DatabaseConfig::load_or_init(root)?;
        validate_branch_name(&config.default_branch)?;

        let objects = FileObjectStore::open(&root.join(OBJECTS_DIR))?
            .with_compression_level(config.compression_level)
            .with_sync_writes(config.sync_writes);
        let refs = FileRefStore::open(root)?.with_sync_writes(config.sync_writes);
        if refs.head()?.is_none() {
            refs.set_head(&config.default_branch)?;
        }

        if fresh {
            info!(path = %root.display(), codec = codec.name(), "initialized database");
        } else {
            debug!(path = %root.display(), codec = codec.name(), "opened database");
        }
        Ok(Self::assemble(
            Box::new(objects),
            Box::new(refs),
            codec,
            config,
            Some(root.to_path_buf()),
        ))
    }

    pub fn in_memory_with_codec(codec: C) -> DatabaseResult<Self> {
        let config = DatabaseConfig::default();
        let refs = InMemoryRefStore::new();
        refs.set_head(&config.default_branch)?;
        Ok(Self::assemble(
            Box::new(InMemoryObjectStore::new()),
            Box::new(refs),
            codec,
            config,
            None,
        ))
    }

    fn assemble(
        objects: Box<dyn ObjectStore>,
        refs: Box<dyn RefStore>,
        codec: C,
        config: DatabaseConfig,
        path: Option<PathBuf>,
    ) -> Self {
        Self {
            objects,
            refs,
            codec,
            config,
            path,
            branch_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Directory of an on-disk database.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn objects(&self) -> &dyn ObjectStore {
        self.objects.as_ref()
    }

    /// Branch targeted by [`commit`](Self::commit).
    pub fn default_branch(&self) -> &str {
        &self.config.default_branch
    }

    /// Tip of `branch`, or `None` if nothing was ever committed to it.
    pub fn resolve(&self, branch: &str) -> DatabaseResult<Option<ObjectId>> {
        validate_branch_name(branch)?;
        Ok(self.refs.branch_tip(branch)?)
    }

    /// The branch HEAD points at, unless HEAD is detached.
    pub fn head_branch(&self) -> DatabaseResult<Option<String>> {
        Ok(match self.refs.head()? {
            Some(Head::Symbolic(branch)) => Some(branch),
            _ => None,
        })
    }

    /// All branches with at least one commit, as `(name, tip)`.
    pub fn branches(&self) -> DatabaseResult<Vec<(String, ObjectId)>> {
        Ok(self.refs.branches()?)
    }

    /// Remove `branch`. Returns whether it existed.
    ///
    /// Only the reference goes away; its commits stay readable through
    /// [`at`](Self::at). The branch HEAD names cannot be deleted.
    pub fn delete_branch(&self, branch: &str) -> DatabaseResult<bool> {
        validate_branch_name(branch)?;
        let lock = self.branch_lock(branch);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let deleted = self.refs.delete_ref(&branch_ref_name(branch))?;
        if deleted {
            info!(branch, "deleted branch");
        }
        Ok(deleted)
    }

    /// Whether no branch has a commit yet.
    pub fn is_empty(&self) -> DatabaseResult<bool> {
        Ok(self.branches()?.is_empty())
    }

    pub fn read_commit(&self, id: &ObjectId) -> DatabaseResult<Commit> {
        Ok(self.objects.read_commit(id)?)
    }

    /// The latest revision of the default branch.
    pub fn current(&self) -> DatabaseResult<View<'_, C>> {
        self.view(&self.config.default_branch)
    }

    /// The latest revision of `branch`.
    pub fn view(&self, branch: &str) -> DatabaseResult<View<'_, C>> {
        match self.resolve(branch)? {
            Some(tip) => self.at(&tip),
            None => Ok(View::new(&self.codec, self.objects.as_ref(), None, None)),
        }
    }

    /// The revision recorded by `commit`.
    pub fn at(&self, commit: &ObjectId) -> DatabaseResult<View<'_, C>> {
        let tree = self.read_commit(commit)?.tree;
        Ok(View::new(
            &self.codec,
            self.objects.as_ref(),
            Some(*commit),
            Some(tree),
        ))
    }

    /// Commits of `branch`, newest first, following first parents.
    ///
    /// Each call starts again from the current tip.
    pub fn history(&self, branch: &str) -> DatabaseResult<History<'_>> {
        let tip = self.resolve(branch)?;
        Ok(History::new(self.objects.as_ref(), tip))
    }

    /// Document-level changes from `old` to `new`. `old == None` compares
    /// against the empty revision.
    pub fn changes(&self, old: Option<&ObjectId>, new: &ObjectId) -> DatabaseResult<Vec<Change>> {
        let old_tree = old.map(|id| self.read_commit(id)).transpose()?.map(|c| c.tree);
        let new_tree = self.read_commit(new)?.tree;
        Ok(relaxo_tree::diff_trees(
            self.objects.as_ref(),
            old_tree.as_ref(),
            Some(&new_tree),
        )?)
    }

    /// The lock that serializes committers of `branch` in this process.
    pub(crate) fn branch_lock(&self, branch: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .branch_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(branch.to_string()).or_default())
    }
}
