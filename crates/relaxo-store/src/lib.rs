//! Content-addressed object storage for Relaxo.
//!
//! Every durable piece of a Relaxo database (document blobs, directory
//! trees and commits) is an immutable object identified by its BLAKE3
//! digest (domain-separated by object kind). The only mutable state lives
//! in `relaxo-refs`.
//!
//! # Object Types
//!
//! - [`Blob`]: an encoded document
//! - [`Tree`]: one directory level: sorted names mapped to blobs or subtrees
//! - [`Commit`]: a root tree plus parents, signatures and a message
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`]: `HashMap`-based store for tests, in-memory
//!   databases, and per-transaction staging
//! - [`FileObjectStore`]: zstd-compressed loose objects on disk
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written; writing an existing object is a no-op.
//! 2. Write-then-link: objects land before any reference points at them.
//! 3. Concurrent reads are always safe.
//! 4. Reads re-verify digests where the backend can be tampered with.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod file;
pub mod memory;
pub mod object;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use file::FileObjectStore;
pub use memory::InMemoryObjectStore;
pub use object::{Blob, Commit, EntryKind, ObjectKind, StoredObject, Tree, TreeEntry};
pub use traits::ObjectStore;
