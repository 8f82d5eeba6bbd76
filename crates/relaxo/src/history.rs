//! Walking a branch's commits.

use relaxo_store::{Commit, ObjectStore};
use relaxo_types::ObjectId;

use crate::error::DatabaseResult;

/// Lazy first-parent walk from a tip, newest first.
///
/// A read error is yielded once and ends the walk.
pub struct History<'a> {
    store: &'a dyn ObjectStore,
    next: Option<ObjectId>,
    path: Option<String>,
}

impl<'a> History<'a> {
    pub(crate) fn new(store: &'a dyn ObjectStore, tip: Option<ObjectId>) -> Self {
        Self {
            store,
            next: tip,
            path: None,
        }
    }

    /// Keep only commits that changed what `path` holds relative to their
    /// first parent. A path that appears, disappears or changes content
    /// counts; for a directory, any change beneath it counts.
    pub fn touching(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    fn entry_at(&self, tree: &ObjectId, path: &str) -> DatabaseResult<Option<ObjectId>> {
        Ok(relaxo_tree::lookup(self.store, tree, path)?.map(|entry| entry.object_id))
    }

    fn touches(&self, commit: &Commit, path: &str) -> DatabaseResult<bool> {
        let current = self.entry_at(&commit.tree, path)?;
        let previous = match commit.first_parent() {
            Some(parent) => {
                let parent = self.store.read_commit(parent)?;
                self.entry_at(&parent.tree, path)?
            }
            None => None,
        };
        Ok(current != previous)
    }
}

impl Iterator for History<'_> {
    type Item = DatabaseResult<(ObjectId, Commit)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = self.next.take()?;
            let commit = match self.store.read_commit(&id) {
                Ok(commit) => commit,
                Err(err) => return Some(Err(err.into())),
            };
            self.next = commit.first_parent().copied();

            if let Some(path) = &self.path {
                match self.touches(&commit, path) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(err) => {
                        self.next = None;
                        return Some(Err(err));
                    }
                }
            }
            return Some(Ok((id, commit)));
        }
    }
}
