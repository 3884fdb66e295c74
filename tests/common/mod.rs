#![allow(dead_code, unused_imports)]

#[cfg(feature = "serde")]
pub use backend::MapBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestError(pub String);

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TestError: {}", self.0)
    }
}

impl std::error::Error for TestError {}

#[cfg(feature = "serde")]
mod backend {
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tripwire::{KeyValueBackend, StoreError};

    /// Versioned byte map standing in for an external store such as Redis.
    #[derive(Debug, Clone, Default)]
    pub struct MapBackend {
        data: Arc<Mutex<HashMap<String, (Vec<u8>, u64)>>>,
        writes: Arc<AtomicUsize>,
    }

    impl MapBackend {
        pub fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }

        pub fn raw(&self, key: &str) -> Option<serde_json::Value> {
            let data = self.data.lock().unwrap();
            data.get(key).map(|(bytes, _)| serde_json::from_slice(bytes).unwrap())
        }
    }

    #[async_trait]
    impl KeyValueBackend for MapBackend {
        async fn load(&self, key: &str) -> Result<Option<(Vec<u8>, u64)>, StoreError> {
            Ok(self.data.lock().unwrap().get(key).cloned())
        }

        async fn store(
            &self,
            key: &str,
            bytes: Vec<u8>,
            expected: Option<u64>,
        ) -> Result<u64, StoreError> {
            let mut data = self.data.lock().unwrap();
            let current = data.get(key).map(|(_, v)| *v).unwrap_or(0);
            if let Some(expected) = expected {
                if expected != current {
                    return Err(StoreError::Conflict { key: key.to_string(), expected, found: current });
                }
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            data.insert(key.to_string(), (bytes, current + 1));
            Ok(current + 1)
        }
    }
}
