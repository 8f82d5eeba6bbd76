//! Bottom-up tree rebuilding.
//!
//! Only directories named by an edit are read and rewritten; every other
//! subtree keeps its existing id, so successive roots share structure.

use std::collections::BTreeMap;

use relaxo_store::{ObjectStore, Tree, TreeEntry};
use relaxo_types::ObjectId;
use tracing::debug;

use crate::edits::{DirEdit, Edit, Edits};
use crate::error::{TreeError, TreeResult};
use crate::path::join_path;

/// Applies [`Edits`] to a base root, writing new trees to a store.
pub struct TreeBuilder<'a> {
    store: &'a dyn ObjectStore,
    written: usize,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store, written: 0 }
    }

    /// Number of tree objects written by this builder so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Build the root that results from applying `edits` to `base`.
    ///
    /// `base == None` starts from an empty tree. Directories left empty are
    /// pruned, except the root, which is written as an empty tree. When the
    /// edits change nothing the base id is returned unchanged.
    pub fn apply(&mut self, base: Option<&ObjectId>, edits: &Edits) -> TreeResult<ObjectId> {
        let root = match self.build_dir("", base.copied(), edits.root())? {
            Some(id) => id,
            None => self.write_tree(Tree::empty(), None)?,
        };
        debug!(
            root = %root.short_hex(),
            trees_written = self.written,
            "tree rebuilt"
        );
        Ok(root)
    }

    fn build_dir(
        &mut self,
        path: &str,
        base: Option<ObjectId>,
        edit: &DirEdit,
    ) -> TreeResult<Option<ObjectId>> {
        if edit.is_noop() {
            return Ok(base);
        }

        let mut entries: BTreeMap<String, TreeEntry> = match base {
            Some(id) if !edit.replace => self
                .store
                .read_tree(&id)?
                .entries
                .into_iter()
                .map(|entry| (entry.name.clone(), entry))
                .collect(),
            _ => BTreeMap::new(),
        };

        for (name, child) in &edit.children {
            let child_path = join_path(path, name);
            match child {
                Edit::Put { id, replace } => {
                    if let Some(existing) = entries.get(name) {
                        if existing.is_tree() && !replace {
                            return Err(TreeError::PathConflict {
                                path: child_path,
                                reason: "a directory exists at this path".into(),
                            });
                        }
                    }
                    entries.insert(name.clone(), TreeEntry::blob(name.as_str(), *id));
                }
                Edit::Remove => {
                    entries.remove(name);
                }
                Edit::Dir(sub) => {
                    let sub_base = match entries.get(name) {
                        Some(entry) if entry.is_tree() => Some(entry.object_id),
                        Some(_) if sub.replace => None,
                        Some(_) if sub.has_puts() => {
                            return Err(TreeError::PathConflict {
                                path: child_path,
                                reason: "a document exists at this path".into(),
                            });
                        }
                        // Removals beneath a document: nothing to remove.
                        Some(_) => continue,
                        None => None,
                    };
                    match self.build_dir(&child_path, sub_base, sub)? {
                        Some(id) => {
                            entries.insert(name.clone(), TreeEntry::tree(name.as_str(), id));
                        }
                        None => {
                            entries.remove(name);
                        }
                    }
                }
            }
        }

        if entries.is_empty() {
            return Ok(None);
        }
        let tree = Tree {
            entries: entries.into_values().collect(),
        };
        self.write_tree(tree, base).map(Some)
    }

    fn write_tree(&mut self, tree: Tree, base: Option<ObjectId>) -> TreeResult<ObjectId> {
        let stored = tree.to_stored_object()?;
        let id = stored.compute_id();
        if Some(id) != base {
            self.store.write(&stored)?;
            self.written += 1;
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::{leaves, lookup};
    use proptest::prelude::*;
    use relaxo_store::InMemoryObjectStore;

    fn put_all(store: &InMemoryObjectStore, edits: &mut Edits, paths: &[&str]) {
        for path in paths {
            let id = store.put_blob(path.as_bytes()).unwrap();
            edits.put(path, id).unwrap();
        }
    }

    #[test]
    fn empty_edits_on_empty_base_give_empty_root() {
        let store = InMemoryObjectStore::new();
        let root = TreeBuilder::new(&store).apply(None, &Edits::new()).unwrap();
        assert!(store.read_tree(&root).unwrap().is_empty());
    }

    #[test]
    fn builds_nested_directories() {
        let store = InMemoryObjectStore::new();
        let mut edits = Edits::new();
        put_all(&store, &mut edits, &["records/0", "records/subdirectory/0"]);

        let root = TreeBuilder::new(&store).apply(None, &edits).unwrap();
        let top = store.read_tree(&root).unwrap();
        assert_eq!(top.len(), 1);
        assert!(top.get("records").unwrap().is_tree());

        let names: Vec<_> = leaves(&store, &root, "").unwrap().into_iter().map(|(p, _)| p).collect();
        assert_eq!(names, ["records/0", "records/subdirectory/0"]);
    }

    #[test]
    fn noop_edits_return_base() {
        let store = InMemoryObjectStore::new();
        let mut edits = Edits::new();
        put_all(&store, &mut edits, &["a/b"]);
        let base = TreeBuilder::new(&store).apply(None, &edits).unwrap();

        // Re-writing identical content and deleting absent paths changes nothing.
        let mut again = Edits::new();
        put_all(&store, &mut again, &["a/b"]);
        again.remove("a/missing").unwrap();
        again.remove("nowhere/deep").unwrap();
        let mut builder = TreeBuilder::new(&store);
        assert_eq!(builder.apply(Some(&base), &again).unwrap(), base);
        assert_eq!(builder.written(), 0);
    }

    #[test]
    fn unchanged_subtrees_are_shared() {
        let store = InMemoryObjectStore::new();
        let mut edits = Edits::new();
        put_all(&store, &mut edits, &["left/x", "right/y"]);
        let first = TreeBuilder::new(&store).apply(None, &edits).unwrap();

        let mut next = Edits::new();
        put_all(&store, &mut next, &["right/z"]);
        let mut builder = TreeBuilder::new(&store);
        let second = builder.apply(Some(&first), &next).unwrap();

        // Only `right` and the root are rewritten.
        assert_eq!(builder.written(), 2);
        let left_before = lookup(&store, &first, "left").unwrap().unwrap();
        let left_after = lookup(&store, &second, "left").unwrap().unwrap();
        assert_eq!(left_before.object_id, left_after.object_id);
    }

    #[test]
    fn removing_last_leaf_prunes_directories() {
        let store = InMemoryObjectStore::new();
        let mut edits = Edits::new();
        put_all(&store, &mut edits, &["keep", "a/b/c"]);
        let base = TreeBuilder::new(&store).apply(None, &edits).unwrap();

        let mut removal = Edits::new();
        removal.remove("a/b/c").unwrap();
        let root = TreeBuilder::new(&store).apply(Some(&base), &removal).unwrap();

        assert!(lookup(&store, &root, "a").unwrap().is_none());
        assert!(lookup(&store, &root, "keep").unwrap().is_some());
    }

    #[test]
    fn removing_everything_keeps_empty_root() {
        let store = InMemoryObjectStore::new();
        let mut edits = Edits::new();
        put_all(&store, &mut edits, &["a/b"]);
        let base = TreeBuilder::new(&store).apply(None, &edits).unwrap();

        let mut removal = Edits::new();
        removal.remove("a").unwrap();
        let root = TreeBuilder::new(&store).apply(Some(&base), &removal).unwrap();
        assert!(store.read_tree(&root).unwrap().is_empty());
    }

    #[test]
    fn write_beneath_committed_document_conflicts() {
        let store = InMemoryObjectStore::new();
        let mut edits = Edits::new();
        put_all(&store, &mut edits, &["a"]);
        let base = TreeBuilder::new(&store).apply(None, &edits).unwrap();

        let mut next = Edits::new();
        put_all(&store, &mut next, &["a/b"]);
        let err = TreeBuilder::new(&store).apply(Some(&base), &next).unwrap_err();
        match err {
            TreeError::PathConflict { path, .. } => assert_eq!(path, "a"),
            other => panic!("expected PathConflict, got {other}"),
        }
    }

    #[test]
    fn document_over_committed_directory_conflicts() {
        let store = InMemoryObjectStore::new();
        let mut edits = Edits::new();
        put_all(&store, &mut edits, &["a/b"]);
        let base = TreeBuilder::new(&store).apply(None, &edits).unwrap();

        let mut next = Edits::new();
        put_all(&store, &mut next, &["a"]);
        assert!(matches!(
            TreeBuilder::new(&store).apply(Some(&base), &next),
            Err(TreeError::PathConflict { .. })
        ));
    }

    #[test]
    fn delete_then_write_replaces_directory_with_document() {
        let store = InMemoryObjectStore::new();
        let mut edits = Edits::new();
        put_all(&store, &mut edits, &["a/b"]);
        let base = TreeBuilder::new(&store).apply(None, &edits).unwrap();

        let mut next = Edits::new();
        next.remove("a").unwrap();
        put_all(&store, &mut next, &["a"]);
        let root = TreeBuilder::new(&store).apply(Some(&base), &next).unwrap();
        assert!(!lookup(&store, &root, "a").unwrap().unwrap().is_tree());
    }

    #[test]
    fn delete_then_write_replaces_document_with_directory() {
        let store = InMemoryObjectStore::new();
        let mut edits = Edits::new();
        put_all(&store, &mut edits, &["a"]);
        let base = TreeBuilder::new(&store).apply(None, &edits).unwrap();

        let mut next = Edits::new();
        next.remove("a").unwrap();
        put_all(&store, &mut next, &["a/b"]);
        let root = TreeBuilder::new(&store).apply(Some(&base), &next).unwrap();
        assert!(lookup(&store, &root, "a/b").unwrap().is_some());
    }

    #[test]
    fn removal_beneath_committed_document_is_noop() {
        let store = InMemoryObjectStore::new();
        let mut edits = Edits::new();
        put_all(&store, &mut edits, &["a"]);
        let base = TreeBuilder::new(&store).apply(None, &edits).unwrap();

        let mut next = Edits::new();
        next.remove("a/b").unwrap();
        assert_eq!(TreeBuilder::new(&store).apply(Some(&base), &next).unwrap(), base);
    }

    const PATHS: &[&str] = &[
        "records/0",
        "records/1",
        "records/2",
        "records/subdirectory/0",
        "records/subdirectory/1",
        "index",
        "meta/a/b/c",
    ];

    proptest! {
        #[test]
        fn root_is_independent_of_edit_order(order in Just(PATHS.to_vec()).prop_shuffle()) {
            let store = InMemoryObjectStore::new();

            let mut sorted = Edits::new();
            put_all(&store, &mut sorted, PATHS);
            let expected = TreeBuilder::new(&store).apply(None, &sorted).unwrap();

            let mut shuffled = Edits::new();
            put_all(&store, &mut shuffled, &order);
            let actual = TreeBuilder::new(&store).apply(None, &shuffled).unwrap();

            prop_assert_eq!(actual, expected);
        }

        #[test]
        fn incremental_equals_from_scratch(split in 0usize..PATHS.len()) {
            let store = InMemoryObjectStore::new();

            let mut all = Edits::new();
            put_all(&store, &mut all, PATHS);
            let scratch = TreeBuilder::new(&store).apply(None, &all).unwrap();

            let mut first = Edits::new();
            put_all(&store, &mut first, &PATHS[..split]);
            let base = TreeBuilder::new(&store).apply(None, &first).unwrap();
            let mut rest = Edits::new();
            put_all(&store, &mut rest, &PATHS[split..]);
            let incremental = TreeBuilder::new(&store).apply(Some(&base), &rest).unwrap();

            prop_assert_eq!(incremental, scratch);
        }
    }
}
