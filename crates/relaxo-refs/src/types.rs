//! Core reference types.

use relaxo_types::ObjectId;

/// Namespace holding branch refs.
pub const HEADS_PREFIX: &str = "refs/heads/";

/// Canonical ref name for a branch (`master` -> `refs/heads/master`).
pub fn branch_ref_name(branch: &str) -> String {
    format!("{HEADS_PREFIX}{branch}")
}

/// Short branch name of a canonical branch ref, if it is one.
pub fn branch_name(canonical: &str) -> Option<&str> {
    canonical.strip_prefix(HEADS_PREFIX)
}

/// The state of HEAD: either symbolic (naming a branch) or detached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Head {
    /// HEAD names a branch by its short name.
    Symbolic(String),
    /// HEAD points directly at a commit.
    Detached(ObjectId),
}

impl Head {
    pub fn branch(&self) -> Option<&str> {
        match self {
            Head::Symbolic(name) => Some(name),
            Head::Detached(_) => None,
        }
    }
}
