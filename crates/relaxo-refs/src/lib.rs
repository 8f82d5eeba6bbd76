//! Reference management for Relaxo.
//!
//! References are the only mutable part of a database: named pointers from a
//! branch to the commit at its tip. Everything they point at is immutable,
//! so readers never need a lock; writers advance a reference with
//! compare-and-swap so a lost update is detected instead of overwritten.
//!
//! # Modules
//!
//! - [`error`]: Error types for ref operations
//! - [`types`]: [`Head`] and canonical-name helpers
//! - [`traits`]: The [`RefStore`] trait defining the storage interface
//! - [`names`]: Branch and ref name validation
//! - [`memory`]: In-memory [`InMemoryRefStore`]
//! - [`file`]: On-disk [`FileRefStore`] with lock files

pub mod error;
pub mod file;
pub mod memory;
pub mod names;
pub mod traits;
pub mod types;

pub use error::{RefError, Result};
pub use file::FileRefStore;
pub use memory::InMemoryRefStore;
pub use names::{validate_branch_name, validate_ref_name};
pub use traits::RefStore;
pub use types::{branch_name, branch_ref_name, Head, HEADS_PREFIX};
