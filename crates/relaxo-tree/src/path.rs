//! Slash-delimited document paths.

use crate::error::{TreeError, TreeResult};

/// Split a path into segments.
///
/// Leading and trailing slashes are ignored, so `""` and `"/"` name the
/// root and yield no segments. Empty segments (`a//b`), `.` and `..` are
/// rejected.
pub fn split_path(path: &str) -> TreeResult<Vec<&str>> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    trimmed
        .split('/')
        .map(|segment| match segment {
            "" => Err(invalid(path, "empty path segment")),
            "." | ".." => Err(invalid(path, "relative segments are not allowed")),
            s if s.contains('\0') => Err(invalid(path, "NUL byte in path")),
            s => Ok(s),
        })
        .collect()
}

/// Split a path that must name something below the root.
pub(crate) fn split_non_root(path: &str) -> TreeResult<Vec<&str>> {
    let segments = split_path(path)?;
    if segments.is_empty() {
        return Err(invalid(path, "path must not be empty"));
    }
    Ok(segments)
}

/// Join a directory path and an entry name.
pub fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

fn invalid(path: &str, reason: &str) -> TreeError {
    TreeError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}
