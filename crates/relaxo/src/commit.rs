//! The commit coordinator: run a closure against a [`Dataset`], then
//! persist the result and advance the branch.

use std::sync::PoisonError;

use relaxo_refs::{branch_ref_name, validate_branch_name};
use relaxo_store::{Commit, Tree};
use relaxo_types::{ObjectId, Signature};
use tracing::{debug, info};

use crate::codec::Codec;
use crate::config::AuthorConfig;
use crate::database::Database;
use crate::dataset::Dataset;
use crate::error::{DatabaseError, DatabaseResult};

/// Metadata for a commit.
#[derive(Clone, Debug, Default)]
pub struct CommitOptions {
    pub message: String,
    /// Overrides the configured author for this commit.
    pub author: Option<AuthorConfig>,
}

impl CommitOptions {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            author: None,
        }
    }

    pub fn with_author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author = Some(AuthorConfig {
            name: name.into(),
            email: email.into(),
        });
        self
    }
}

/// What a transaction produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitOutcome<T> {
    /// Whatever the closure returned.
    pub value: T,
    /// The new commit; `None` when the transaction changed nothing and no
    /// commit was written.
    pub commit: Option<ObjectId>,
    /// Root tree of the branch after the transaction.
    pub tree: ObjectId,
}

impl<T> CommitOutcome<T> {
    pub fn is_skipped(&self) -> bool {
        self.commit.is_none()
    }
}

impl<C: Codec> Database<C> {
    /// Run `f` in a transaction on the default branch.
    pub fn commit<T, F>(&self, message: &str, f: F) -> DatabaseResult<CommitOutcome<T>>
    where
        F: FnOnce(&mut Dataset<'_, C>) -> DatabaseResult<T>,
    {
        let branch = self.config.default_branch.clone();
        self.commit_to(&branch, CommitOptions::new(message), f)
    }

    /// Run `f` in a transaction on `branch`.
    ///
    /// The dataset starts at the branch tip (empty for a new branch). If
    /// `f` fails, nothing is written and the error is returned. If the
    /// resulting root equals the base root, no commit is written. Otherwise
    /// the staged objects reachable from the new root are flushed, a commit
    /// is written and the branch is advanced with compare-and-swap; if the
    /// branch moved in the meantime the transaction fails with
    /// [`DatabaseError::ConcurrentModification`]. A lock file left on the
    /// branch by another writer fails it with [`DatabaseError::Locked`].
    pub fn commit_to<T, F>(
        &self,
        branch: &str,
        options: CommitOptions,
        f: F,
    ) -> DatabaseResult<CommitOutcome<T>>
    where
        F: FnOnce(&mut Dataset<'_, C>) -> DatabaseResult<T>,
    {
        validate_branch_name(branch)?;
        let lock = self.branch_lock(branch);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let ref_name = branch_ref_name(branch);
        let base_commit = self.refs.read_ref(&ref_name)?;
        let base_root = match &base_commit {
            Some(id) => Some(self.objects.read_commit(id)?.tree),
            None => None,
        };

        let mut dataset = Dataset::new(&self.codec, self.objects.as_ref(), base_commit, base_root);
        let value = match f(&mut dataset) {
            Ok(value) => value,
            Err(err) => {
                debug!(branch, error = %err, "transaction aborted");
                return Err(err);
            }
        };

        let tree = dataset.root()?;
        let unchanged = match base_root {
            Some(base) => base == tree,
            None => tree == Tree::empty().to_stored_object()?.compute_id(),
        };
        if unchanged {
            debug!(branch, tree = %tree.short_hex(), "nothing to commit");
            return Ok(CommitOutcome {
                value,
                commit: None,
                tree,
            });
        }

        let flushed = dataset.staging().flush(&tree)?;
        let author = options.author.as_ref().unwrap_or(&self.config.author);
        let signature = Signature::now(author.name.as_str(), author.email.as_str())
            .map_err(|e| DatabaseError::Config(format!("author: {e}")))?;
        let commit = Commit {
            tree,
            parents: base_commit.into_iter().collect(),
            author: signature.clone(),
            committer: signature,
            message: options.message,
        };
        let commit_id = self.objects.write(&commit.to_stored_object()?)?;
        self.refs.compare_and_swap(&ref_name, base_commit, commit_id)?;

        info!(
            branch,
            commit = %commit_id.short_hex(),
            objects = flushed,
            summary = commit.summary(),
            "committed"
        );
        Ok(CommitOutcome {
            value,
            commit: Some(commit_id),
            tree,
        })
    }
}
