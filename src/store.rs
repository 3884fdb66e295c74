//! Persistence contract for per-key breaker records.
//!
//! Stores are plain key/value holders with an optional version precondition on writes:
//! - `expected: None` overwrites unconditionally (read-then-write; concurrent writers may
//!   lose each other's counters).
//! - `expected: Some(v)` succeeds only if the stored version is `v` (`0` = key absent) and
//!   fails with [`StoreError::Conflict`] otherwise.
//!
//! The in-memory store lives here; `shared` (with the `serde` feature) adapts external
//! key/value backends.

use crate::error::StoreError;
use crate::state::{BreakerState, Versioned};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[cfg(feature = "serde")]
pub mod shared;

#[cfg(feature = "serde")]
pub use shared::{KeyValueBackend, SharedStateStore};

/// Abstract storage interface for breaker records.
#[async_trait]
pub trait StateStore: Send + Sync + std::fmt::Debug {
    /// Fetch the record for `key`, or `None` if it was never written.
    async fn get(&self, key: &str) -> Result<Option<Versioned<BreakerState>>, StoreError>;

    /// Write the record for `key`, returning the version assigned to it.
    async fn set(
        &self,
        key: &str,
        state: BreakerState,
        expected: Option<u64>,
    ) -> Result<u64, StoreError>;
}

#[async_trait]
impl<S: StateStore + ?Sized> StateStore for Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<Versioned<BreakerState>>, StoreError> {
        (**self).get(key).await
    }

    async fn set(
        &self,
        key: &str,
        state: BreakerState,
        expected: Option<u64>,
    ) -> Result<u64, StoreError> {
        (**self).set(key, state, expected).await
    }
}

/// In-process store. Clones share the same map.
#[derive(Default, Clone, Debug)]
pub struct InMemoryStateStore {
    data: Arc<RwLock<HashMap<String, Versioned<BreakerState>>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a stored record.
    pub fn len(&self) -> usize {
        self.data.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned(key: &str) -> StoreError {
    StoreError::backend(key, "in-memory store lock poisoned")
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<Versioned<BreakerState>>, StoreError> {
        let guard = self.data.read().map_err(|_| poisoned(key))?;
        Ok(guard.get(key).cloned())
    }

    async fn set(
        &self,
        key: &str,
        state: BreakerState,
        expected: Option<u64>,
    ) -> Result<u64, StoreError> {
        let mut guard = self.data.write().map_err(|_| poisoned(key))?;
        let current = guard.get(key).map(|v| v.version).unwrap_or(0);

        if let Some(expected) = expected {
            if expected != current {
                return Err(StoreError::Conflict { key: key.to_string(), expected, found: current });
            }
        }

        let version = current.saturating_add(1);
        guard.insert(key.to_string(), Versioned::new(state, version));
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Status;

    fn open_state() -> BreakerState {
        BreakerState { status: Status::Open, close_at_millis: 10, ..BreakerState::default() }
    }

    #[tokio::test]
    async fn missing_key_reads_as_none() {
        let store = InMemoryStateStore::new();
        assert_eq!(store.get("nope").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn versions_start_at_one_and_increase() {
        let store = InMemoryStateStore::new();
        assert_eq!(store.set("db", BreakerState::default(), Some(0)).await.unwrap(), 1);
        assert_eq!(store.set("db", open_state(), Some(1)).await.unwrap(), 2);

        let stored = store.get("db").await.unwrap().expect("record present");
        assert_eq!(stored.version, 2);
        assert_eq!(stored.value.status, Status::Open);
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let store = InMemoryStateStore::new();
        store.set("db", BreakerState::default(), None).await.unwrap();
        store.set("db", BreakerState::default(), None).await.unwrap();

        let err = store.set("db", open_state(), Some(1)).await.unwrap_err();
        assert_eq!(err, StoreError::Conflict { key: "db".into(), expected: 1, found: 2 });
        let stored = store.get("db").await.unwrap().unwrap();
        assert_eq!(stored.value.status, Status::Closed, "rejected write must not land");
    }

    #[tokio::test]
    async fn expecting_absent_fails_once_written() {
        let store = InMemoryStateStore::new();
        store.set("db", BreakerState::default(), Some(0)).await.unwrap();
        assert!(store.set("db", open_state(), Some(0)).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn clones_share_records() {
        let store = InMemoryStateStore::new();
        let other = store.clone();
        store.set("a", open_state(), None).await.unwrap();
        assert_eq!(other.len(), 1);
        assert!(other.get("a").await.unwrap().is_some());
    }
}
