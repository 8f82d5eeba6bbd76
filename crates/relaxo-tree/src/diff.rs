//! Leaf-level differences between two roots.
//!
//! Subtrees with equal ids are skipped without being read, so the cost of
//! a diff is proportional to what changed.

use std::collections::BTreeMap;
use std::fmt;

use relaxo_store::{ObjectStore, TreeEntry};
use relaxo_types::ObjectId;

use crate::error::TreeResult;
use crate::path::join_path;

/// A single document-level change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Change {
    Added { path: String, id: ObjectId },
    Deleted { path: String, id: ObjectId },
    Modified { path: String, old: ObjectId, new: ObjectId },
}

impl Change {
    pub fn path(&self) -> &str {
        match self {
            Change::Added { path, .. } | Change::Deleted { path, .. } | Change::Modified { path, .. } => {
                path
            }
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Added { path, .. } => write!(f, "A {path}"),
            Change::Deleted { path, .. } => write!(f, "D {path}"),
            Change::Modified { path, .. } => write!(f, "M {path}"),
        }
    }
}

/// Compare two roots. `None` stands for an empty tree.
///
/// Changes are returned in path order. A path that changes between
/// document and directory is reported as deletions of the old leaves plus
/// additions of the new ones, placed by path like every other change: the
/// document `x` always comes before the leaves under `x/`, whether it was
/// deleted or added.
pub fn diff_trees(
    store: &dyn ObjectStore,
    old: Option<&ObjectId>,
    new: Option<&ObjectId>,
) -> TreeResult<Vec<Change>> {
    let mut changes = Vec::new();
    diff_dir(store, "", old, new, &mut changes)?;
    changes.sort_by(|a, b| a.path().cmp(b.path()));
    Ok(changes)
}

fn load(store: &dyn ObjectStore, id: Option<&ObjectId>) -> TreeResult<BTreeMap<String, TreeEntry>> {
    Ok(match id {
        Some(id) => store
            .read_tree(id)?
            .entries
            .into_iter()
            .map(|e| (e.name.clone(), e))
            .collect(),
        None => BTreeMap::new(),
    })
}

fn diff_dir(
    store: &dyn ObjectStore,
    prefix: &str,
    old: Option<&ObjectId>,
    new: Option<&ObjectId>,
    changes: &mut Vec<Change>,
) -> TreeResult<()> {
    if old == new {
        return Ok(());
    }
    let old_entries = load(store, old)?;
    let new_entries = load(store, new)?;

    for (name, old_entry) in &old_entries {
        let path = join_path(prefix, name);
        match new_entries.get(name) {
            Some(new_entry) if new_entry.object_id == old_entry.object_id => {}
            Some(new_entry) => match (old_entry.is_tree(), new_entry.is_tree()) {
                (false, false) => changes.push(Change::Modified {
                    path,
                    old: old_entry.object_id,
                    new: new_entry.object_id,
                }),
                (true, true) => diff_dir(
                    store,
                    &path,
                    Some(&old_entry.object_id),
                    Some(&new_entry.object_id),
                    changes,
                )?,
                _ => {
                    one_sided(store, &path, old_entry, changes, false)?;
                    one_sided(store, &path, new_entry, changes, true)?;
                }
            },
            None => one_sided(store, &path, old_entry, changes, false)?,
        }
    }
    for (name, new_entry) in &new_entries {
        if !old_entries.contains_key(name) {
            one_sided(store, &join_path(prefix, name), new_entry, changes, true)?;
        }
    }
    Ok(())
}

/// Report every leaf of `entry` as added or deleted.
fn one_sided(
    store: &dyn ObjectStore,
    path: &str,
    entry: &TreeEntry,
    changes: &mut Vec<Change>,
    added: bool,
) -> TreeResult<()> {
    let leaf = |path: String, id: ObjectId| {
        if added {
            Change::Added { path, id }
        } else {
            Change::Deleted { path, id }
        }
    };
    if !entry.is_tree() {
        changes.push(leaf(path.to_string(), entry.object_id));
        return Ok(());
    }
    for child in store.read_tree(&entry.object_id)?.entries {
        one_sided(store, &join_path(path, &child.name), &child, changes, added)?;
    }
    Ok(())
}
