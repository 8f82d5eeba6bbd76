//! Path queries against a committed root.

use relaxo_store::{ObjectStore, TreeEntry};
use relaxo_types::ObjectId;

use crate::error::TreeResult;
use crate::path::{join_path, split_path};

/// Resolve `path` under `root`.
///
/// The root itself (`""` or `"/"`) resolves to a tree entry with an empty
/// name. Returns `Ok(None)` when any segment is missing or passes through a
/// document.
pub fn lookup(store: &dyn ObjectStore, root: &ObjectId, path: &str) -> TreeResult<Option<TreeEntry>> {
    let segments = split_path(path)?;
    let mut current = TreeEntry::tree("", *root);
    for segment in segments {
        if !current.is_tree() {
            return Ok(None);
        }
        let tree = store.read_tree(&current.object_id)?;
        match tree.get(segment) {
            Some(entry) => current = entry.clone(),
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

/// Immediate entries of the directory at `dir`, sorted by name.
///
/// A missing path or a document yields an empty listing.
pub fn list(store: &dyn ObjectStore, root: &ObjectId, dir: &str) -> TreeResult<Vec<TreeEntry>> {
    match lookup(store, root, dir)? {
        Some(entry) if entry.is_tree() => Ok(store.read_tree(&entry.object_id)?.entries),
        _ => Ok(Vec::new()),
    }
}

/// Every document at or beneath `prefix`, as `(full path, blob id)` in
/// path order.
pub fn leaves(
    store: &dyn ObjectStore,
    root: &ObjectId,
    prefix: &str,
) -> TreeResult<Vec<(String, ObjectId)>> {
    let normalized = split_path(prefix)?.join("/");
    let mut out = Vec::new();
    match lookup(store, root, &normalized)? {
        Some(entry) if entry.is_tree() => collect(store, &entry.object_id, &normalized, &mut out)?,
        Some(entry) => out.push((normalized, entry.object_id)),
        None => {}
    }
    Ok(out)
}

fn collect(
    store: &dyn ObjectStore,
    tree_id: &ObjectId,
    prefix: &str,
    out: &mut Vec<(String, ObjectId)>,
) -> TreeResult<()> {
    for entry in store.read_tree(tree_id)?.entries {
        let path = join_path(prefix, &entry.name);
        if entry.is_tree() {
            collect(store, &entry.object_id, &path, out)?;
        } else {
            out.push((path, entry.object_id));
        }
    }
    Ok(())
}
