//! Staged edits of a transaction, arranged as a tree of path segments.
//!
//! Each directory node records its staged children and whether the base
//! directory at that path was deleted first. Later edits to the same path
//! replace earlier ones.

use std::collections::BTreeMap;

use relaxo_types::ObjectId;

use crate::error::{TreeError, TreeResult};
use crate::path::split_non_root;

/// A staged change at one path segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Edit {
    /// Point the path at a blob. `replace` is set when the path was deleted
    /// earlier in the same transaction, which lets the blob take the place
    /// of a directory.
    Put { id: ObjectId, replace: bool },
    /// Delete whatever the path holds.
    Remove,
    /// Edits below a directory.
    Dir(DirEdit),
}

/// Staged edits for one directory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirEdit {
    /// Ignore the base directory's entries; start from empty.
    pub replace: bool,
    pub children: BTreeMap<String, Edit>,
}

impl DirEdit {
    fn replacing() -> Self {
        Self {
            replace: true,
            children: BTreeMap::new(),
        }
    }

    /// Whether any document write is staged at or below this directory.
    pub fn has_puts(&self) -> bool {
        self.children.values().any(|edit| match edit {
            Edit::Put { .. } => true,
            Edit::Remove => false,
            Edit::Dir(dir) => dir.has_puts(),
        })
    }

    /// Whether applying this node could change anything.
    pub fn is_noop(&self) -> bool {
        !self.replace && self.children.is_empty()
    }
}

/// The staged `path -> blob | tombstone` set of a transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Edits {
    root: DirEdit,
}

impl Edits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_noop()
    }

    pub fn root(&self) -> &DirEdit {
        &self.root
    }

    /// Stage `path -> id`.
    ///
    /// Fails with `PathConflict` if a document is already staged at one of
    /// the path's ancestors, or if documents are staged beneath `path`.
    pub fn put(&mut self, path: &str, id: ObjectId) -> TreeResult<()> {
        let segments = split_non_root(path)?;
        let (leaf, parents) = segments
            .split_last()
            .ok_or_else(|| unreachable_root(path))?;

        let mut dir = &mut self.root;
        for (depth, segment) in parents.iter().enumerate() {
            let entry = dir
                .children
                .entry((*segment).to_string())
                .or_insert_with(|| Edit::Dir(DirEdit::default()));
            dir = descend(entry, || segments[..=depth].join("/"))?;
        }

        let replace = match dir.children.get(*leaf) {
            Some(Edit::Dir(pending)) if pending.has_puts() => {
                return Err(TreeError::PathConflict {
                    path: segments.join("/"),
                    reason: "documents are staged beneath this path".into(),
                });
            }
            Some(Edit::Dir(pending)) => pending.replace,
            Some(Edit::Remove) => true,
            Some(Edit::Put { replace, .. }) => *replace,
            None => dir.replace,
        };
        dir.children
            .insert((*leaf).to_string(), Edit::Put { id, replace });
        Ok(())
    }

    /// Stage the deletion of `path` and everything beneath it.
    ///
    /// Deleting a path that will not exist is a no-op.
    pub fn remove(&mut self, path: &str) -> TreeResult<()> {
        let segments = split_non_root(path)?;
        let (leaf, parents) = segments
            .split_last()
            .ok_or_else(|| unreachable_root(path))?;

        let mut dir = &mut self.root;
        for segment in parents {
            let entry = dir
                .children
                .entry((*segment).to_string())
                .or_insert_with(|| Edit::Dir(DirEdit::default()));
            match entry {
                // Nothing can exist beneath a staged document or deletion.
                Edit::Put { .. } | Edit::Remove => return Ok(()),
                Edit::Dir(next) => dir = next,
            }
        }
        dir.children.insert((*leaf).to_string(), Edit::Remove);
        Ok(())
    }

    /// The staged edit for an exact path, if any.
    ///
    /// A `Remove` staged at an ancestor is reported as `Remove`; a `Put`
    /// staged at an ancestor is reported as `Remove` as well, since nothing
    /// exists beneath a document.
    pub fn get(&self, path: &str) -> TreeResult<Option<&Edit>> {
        const REMOVED: &Edit = &Edit::Remove;
        let segments = split_non_root(path)?;
        let mut dir = &self.root;
        for (depth, segment) in segments.iter().enumerate() {
            let last = depth + 1 == segments.len();
            match dir.children.get(*segment) {
                None if dir.replace => return Ok(Some(REMOVED)),
                None => return Ok(None),
                Some(edit) if last => return Ok(Some(edit)),
                Some(Edit::Put { .. }) | Some(Edit::Remove) => return Ok(Some(REMOVED)),
                Some(Edit::Dir(next)) => dir = next,
            }
        }
        Ok(None)
    }

    /// The staged directory node at `path` (`""` for the root).
    pub fn dir(&self, path: &str) -> TreeResult<Option<&DirEdit>> {
        let segments = crate::path::split_path(path)?;
        let mut dir = &self.root;
        for segment in segments {
            match dir.children.get(segment) {
                Some(Edit::Dir(next)) => dir = next,
                _ => return Ok(None),
            }
        }
        Ok(Some(dir))
    }

    /// Every staged document write as `(path, id)`, in path order.
    pub fn puts(&self) -> Vec<(String, ObjectId)> {
        let mut out = Vec::new();
        collect_puts(&self.root, String::new(), &mut out);
        out
    }
}

fn collect_puts(dir: &DirEdit, prefix: String, out: &mut Vec<(String, ObjectId)>) {
    for (name, edit) in &dir.children {
        let path = crate::path::join_path(&prefix, name);
        match edit {
            Edit::Put { id, .. } => out.push((path, *id)),
            Edit::Remove => {}
            Edit::Dir(sub) => collect_puts(sub, path, out),
        }
    }
}

fn descend<'a>(
    entry: &'a mut Edit,
    conflict_path: impl FnOnce() -> String,
) -> TreeResult<&'a mut DirEdit> {
    if matches!(entry, Edit::Remove) {
        *entry = Edit::Dir(DirEdit::replacing());
    }
    match entry {
        Edit::Dir(dir) => Ok(dir),
        _ => Err(TreeError::PathConflict {
            path: conflict_path(),
            reason: "a document is staged at this path".into(),
        }),
    }
}

fn unreachable_root(path: &str) -> TreeError {
    TreeError::InvalidPath {
        path: path.to_string(),
        reason: "path must not be empty".into(),
    }
}
