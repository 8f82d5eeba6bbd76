//! Foundation types for Relaxo.
//!
//! Every other Relaxo crate depends on `relaxo-types`. The types here carry
//! no storage behaviour of their own; they are the vocabulary shared by the
//! object store, the reference store and the database layer.
//!
//! # Key Types
//!
//! - [`ObjectId`]: Content address of a stored object (BLAKE3 digest)
//! - [`Timestamp`]: Wall-clock instant with the author's UTC offset
//! - [`Signature`]: Author/committer identity stamped onto commits

pub mod error;
pub mod identity;
pub mod object;
pub mod temporal;

pub use error::TypeError;
pub use identity::Signature;
pub use object::ObjectId;
pub use temporal::Timestamp;
