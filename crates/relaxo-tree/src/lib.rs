//! Path-keyed trees for Relaxo.
//!
//! A database revision is a root [`Tree`](relaxo_store::Tree); documents
//! live at slash-delimited paths beneath it. This crate turns a set of
//! staged path edits into a new root without touching unrelated subtrees,
//! and answers path queries against any root.
//!
//! - [`Edits`]: the staged `path -> blob | tombstone` set of a transaction
//! - [`TreeBuilder`]: applies edits to a base root, bottom-up
//! - [`lookup`], [`list`], [`leaves`]: read paths under a root
//! - [`diff_trees`]: leaf-level changes between two roots

pub mod builder;
pub mod diff;
pub mod edits;
pub mod error;
pub mod path;
pub mod read;

pub use builder::TreeBuilder;
pub use diff::{diff_trees, Change};
pub use edits::{DirEdit, Edit, Edits};
pub use error::{TreeError, TreeResult};
pub use path::{join_path, split_path};
pub use read::{leaves, list, lookup};
