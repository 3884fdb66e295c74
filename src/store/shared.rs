//! Adapter for external key/value stores shared between processes.
//!
//! Bring your own client: implement [`KeyValueBackend`] over Redis, etcd, a SQL table, or
//! anything that can hold bytes under a key with a version counter. Records are stored as
//! JSON under `<prefix>:<key>`.
//!
//! Shared state is best-effort. Without compare-and-swap support in the backend, two
//! processes can read the same record and overwrite each other's counters; the resulting
//! trip decision may lag by roughly one sampling window.

use crate::error::StoreError;
use crate::state::{BreakerState, Versioned};
use crate::store::StateStore;
use async_trait::async_trait;

/// Minimal byte-level contract an external store must provide.
#[async_trait]
pub trait KeyValueBackend: Send + Sync + std::fmt::Debug {
    /// Load raw bytes and their version, or `None` if the key is absent.
    async fn load(&self, key: &str) -> Result<Option<(Vec<u8>, u64)>, StoreError>;

    /// Store raw bytes, honoring `expected` as described on [`StateStore::set`].
    async fn store(
        &self,
        key: &str,
        bytes: Vec<u8>,
        expected: Option<u64>,
    ) -> Result<u64, StoreError>;
}

/// [`StateStore`] over an external [`KeyValueBackend`].
#[derive(Debug, Clone)]
pub struct SharedStateStore<B> {
    prefix: String,
    backend: B,
}

impl<B: KeyValueBackend> SharedStateStore<B> {
    /// Create a store namespacing keys under `prefix`.
    ///
    /// # Errors
    /// Returns `Err` if the prefix is empty or contains control characters.
    pub fn new(prefix: impl Into<String>, backend: B) -> Result<Self, String> {
        let prefix: String = prefix.into();
        let prefix = prefix.trim().trim_end_matches(':').to_string();

        if prefix.is_empty() {
            return Err("prefix cannot be empty".to_string());
        }
        if prefix.chars().any(|c| c.is_control()) {
            return Err("prefix cannot contain control characters".to_string());
        }

        Ok(Self { prefix, backend })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

fn decode(key: &str, bytes: &[u8]) -> Result<BreakerState, StoreError> {
    serde_json::from_slice(bytes)
        .map_err(|e| StoreError::Codec { key: key.to_string(), message: e.to_string() })
}

fn encode(key: &str, state: &BreakerState) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(state)
        .map_err(|e| StoreError::Codec { key: key.to_string(), message: e.to_string() })
}

#[async_trait]
impl<B: KeyValueBackend> StateStore for SharedStateStore<B> {
    async fn get(&self, key: &str) -> Result<Option<Versioned<BreakerState>>, StoreError> {
        let full = self.namespaced(key);
        match self.backend.load(&full).await? {
            Some((bytes, version)) => Ok(Some(Versioned::new(decode(&full, &bytes)?, version))),
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        state: BreakerState,
        expected: Option<u64>,
    ) -> Result<u64, StoreError> {
        let full = self.namespaced(key);
        let bytes = encode(&full, &state)?;
        let version = self.backend.store(&full, bytes, expected).await;
        if let Err(e) = &version {
            tracing::warn!(
                target: "tripwire::store",
                key = %full,
                error = %e,
                "failed to write breaker state to shared store"
            );
        }
        version
    }
}
