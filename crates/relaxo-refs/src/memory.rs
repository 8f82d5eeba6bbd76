//! In-memory reference store for tests and in-memory databases.

use std::collections::BTreeMap;
use std::sync::RwLock;

use relaxo_types::ObjectId;

use crate::error::{RefError, Result};
use crate::names::{colliding_ref, validate_branch_name, validate_ref_name};
use crate::traits::RefStore;
use crate::types::{branch_ref_name, Head};

/// An in-memory implementation of [`RefStore`].
///
/// Compare-and-swap holds the write lock across the compare and the
/// update, which makes it atomic for all users of the same instance.
#[derive(Debug, Default)]
pub struct InMemoryRefStore {
    refs: RwLock<BTreeMap<String, ObjectId>>,
    head: RwLock<Option<Head>>,
}

impl InMemoryRefStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RefStore for InMemoryRefStore {
    fn read_ref(&self, name: &str) -> Result<Option<ObjectId>> {
        let refs = self.refs.read().expect("lock poisoned");
        Ok(refs.get(name).copied())
    }

    fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        new: ObjectId,
    ) -> Result<()> {
        validate_ref_name(name)?;
        let mut refs = self.refs.write().expect("lock poisoned");
        let actual = refs.get(name).copied();
        if actual != expected {
            return Err(RefError::Conflict {
                name: name.to_string(),
                expected,
                actual,
            });
        }
        if actual.is_none() {
            if let Some(existing) = colliding_ref(name, refs.keys().map(String::as_str)) {
                return Err(RefError::NameCollision {
                    name: name.to_string(),
                    existing: existing.to_string(),
                });
            }
        }
        refs.insert(name.to_string(), new);
        Ok(())
    }

    fn delete_ref(&self, name: &str) -> Result<bool> {
        validate_ref_name(name)?;
        if let Some(Head::Symbolic(current)) = self.head.read().expect("lock poisoned").as_ref() {
            if name == branch_ref_name(current) {
                return Err(RefError::DeleteCurrentBranch {
                    name: current.clone(),
                });
            }
        }
        let mut refs = self.refs.write().expect("lock poisoned");
        Ok(refs.remove(name).is_some())
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, ObjectId)>> {
        let refs = self.refs.read().expect("lock poisoned");
        Ok(refs
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), *v))
            .collect())
    }

    fn head(&self) -> Result<Option<Head>> {
        Ok(self.head.read().expect("lock poisoned").clone())
    }

    fn set_head(&self, branch: &str) -> Result<()> {
        validate_branch_name(branch)?;
        *self.head.write().expect("lock poisoned") = Some(Head::Symbolic(branch.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(seed: u8) -> ObjectId {
        ObjectId::from_hash([seed; 32])
    }

    #[test]
    fn create_and_read_branch_ref() {
        let store = InMemoryRefStore::new();
        store.compare_and_swap("refs/heads/master", None, oid(10)).unwrap();
        assert_eq!(store.read_ref("refs/heads/master").unwrap(), Some(oid(10)));
        assert_eq!(store.branch_tip("master").unwrap(), Some(oid(10)));
    }

    #[test]
    fn read_nonexistent_ref_returns_none() {
        let store = InMemoryRefStore::new();
        assert!(store.read_ref("refs/heads/nope").unwrap().is_none());
    }

    #[test]
    fn advance_from_expected_tip() {
        let store = InMemoryRefStore::new();
        store.compare_and_swap("refs/heads/master", None, oid(1)).unwrap();
        store
            .compare_and_swap("refs/heads/master", Some(oid(1)), oid(2))
            .unwrap();
        assert_eq!(store.branch_tip("master").unwrap(), Some(oid(2)));
    }

    #[test]
    fn stale_expectation_is_conflict() {
        let store = InMemoryRefStore::new();
        store.compare_and_swap("refs/heads/master", None, oid(1)).unwrap();
        store
            .compare_and_swap("refs/heads/master", Some(oid(1)), oid(2))
            .unwrap();

        let err = store
            .compare_and_swap("refs/heads/master", Some(oid(1)), oid(3))
            .unwrap_err();
        match err {
            RefError::Conflict { expected, actual, .. } => {
                assert_eq!(expected, Some(oid(1)));
                assert_eq!(actual, Some(oid(2)));
            }
            other => panic!("expected Conflict, got {other}"),
        }
        assert!(matches!(
            store.compare_and_swap("refs/heads/master", None, oid(3)),
            Err(RefError::Conflict { actual: Some(_), .. })
        ));
        assert_eq!(store.branch_tip("master").unwrap(), Some(oid(2)));
    }

    #[test]
    fn invalid_name_rejected() {
        let store = InMemoryRefStore::new();
        let err = store
            .compare_and_swap("refs/heads/bad..name", None, oid(1))
            .unwrap_err();
        assert!(matches!(err, RefError::InvalidName { .. }));
    }

    #[test]
    fn list_by_prefix_is_sorted() {
        let store = InMemoryRefStore::new();
        store.compare_and_swap("refs/heads/master", None, oid(1)).unwrap();
        store.compare_and_swap("refs/heads/develop", None, oid(2)).unwrap();
        store.compare_and_swap("refs/notes/x", None, oid(3)).unwrap();

        let branches = store.branches().unwrap();
        assert_eq!(
            branches,
            vec![("develop".to_string(), oid(2)), ("master".to_string(), oid(1))]
        );
        assert_eq!(store.list_refs("").unwrap().len(), 3);
    }

    #[test]
    fn head_names_a_branch() {
        let store = InMemoryRefStore::new();
        assert!(store.head().unwrap().is_none());

        store.set_head("master").unwrap();
        assert_eq!(store.head().unwrap(), Some(Head::Symbolic("master".into())));
        assert!(store.set_head("bad..name").is_err());
    }

    #[test]
    fn nested_names_collide() {
        let store = InMemoryRefStore::new();
        store.compare_and_swap("refs/heads/feature", None, oid(1)).unwrap();

        let err = store
            .compare_and_swap("refs/heads/feature/x", None, oid(2))
            .unwrap_err();
        assert!(matches!(
            err,
            RefError::NameCollision { ref existing, .. } if existing == "refs/heads/feature"
        ));
        assert!(store.read_ref("refs/heads/feature/x").unwrap().is_none());

        // Advancing the existing ref is unaffected.
        store
            .compare_and_swap("refs/heads/feature", Some(oid(1)), oid(3))
            .unwrap();
    }

    #[test]
    fn cannot_delete_current_branch() {
        let store = InMemoryRefStore::new();
        store.compare_and_swap("refs/heads/master", None, oid(1)).unwrap();
        store.compare_and_swap("refs/heads/scratch", None, oid(2)).unwrap();
        store.set_head("master").unwrap();

        let err = store.delete_ref("refs/heads/master").unwrap_err();
        assert!(matches!(err, RefError::DeleteCurrentBranch { .. }));
        assert!(store.delete_ref("refs/heads/scratch").unwrap());
        assert!(!store.delete_ref("refs/heads/scratch").unwrap());
    }

    #[test]
    fn concurrent_swaps_have_one_winner() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(InMemoryRefStore::new());
        store.compare_and_swap("refs/heads/master", None, oid(0)).unwrap();

        let handles: Vec<_> = (1..=8u8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store
                        .compare_and_swap("refs/heads/master", Some(oid(0)), oid(i))
                        .is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
