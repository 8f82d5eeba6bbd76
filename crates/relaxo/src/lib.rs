//! Relaxo: a transactional document database on a content-addressed
//! object graph.
//!
//! Documents are serialized into blobs and bound to slash-delimited paths.
//! Each commit records a root tree, so every revision stays readable and
//! unchanged subtrees are shared between revisions.
//!
//! ```no_run
//! use relaxo::Database;
//!
//! # fn main() -> relaxo::DatabaseResult<()> {
//! let db = Database::connect("/tmp/relaxo-demo")?;
//! db.commit("add records", |dataset| {
//!     for i in 0..20 {
//!         let handle = dataset.append(&format!("good-{i}"))?;
//!         dataset.write(&format!("records/{i}"), handle)?;
//!     }
//!     Ok(())
//! })?;
//!
//! let current = db.current()?;
//! assert_eq!(current.read::<String>("records/3")?.as_deref(), Some("good-3"));
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod commit;
pub mod config;
pub mod database;
pub mod dataset;
pub mod error;
pub mod history;
mod staging;
pub mod view;

pub use codec::{BincodeCodec, Codec, CodecError, JsonCodec};
pub use commit::{CommitOptions, CommitOutcome};
pub use config::{AuthorConfig, DatabaseConfig};
pub use database::Database;
pub use dataset::Dataset;
pub use error::{DatabaseError, DatabaseResult};
pub use history::History;
pub use view::View;

pub use relaxo_store::{Commit, EntryKind, TreeEntry};
pub use relaxo_tree::Change;
pub use relaxo_types::{ObjectId, Signature, Timestamp};
