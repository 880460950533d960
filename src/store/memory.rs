//! In-process store backends.

use super::{KvStore, StoreError, StoreResult};
use crate::cache::CacheKey;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Map-backed store. No eviction: entries live as long as the store.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StoreError {
    StoreError::backend("memory", "lock poisoned")
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &CacheKey) -> StoreResult<Option<String>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(key.as_str()).cloned())
    }
    async fn set(&self, key: &CacheKey, value: &str) -> StoreResult<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert(key.hash.clone(), value.to_string());
        Ok(())
    }
    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Store that never hits and discards writes.
pub struct NullStore;
impl NullStore {
    pub fn new() -> Self {
        Self
    }
}
impl Default for NullStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for NullStore {
    async fn get(&self, _: &CacheKey) -> StoreResult<Option<String>> {
        Ok(None)
    }
    async fn set(&self, _: &CacheKey, _: &str) -> StoreResult<()> {
        Ok(())
    }
    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_overwrites_whole_values() {
        let store = MemoryStore::new();
        let key = CacheKey::from("k");
        assert_eq!(store.get(&key).await.unwrap(), None);
        store.set(&key, "first").await.unwrap();
        store.set(&key, "second").await.unwrap();
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("second"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn null_store_never_hits() {
        let store = NullStore::new();
        let key = CacheKey::from("k");
        store.set(&key, "value").await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), None);
        assert_eq!(store.name(), "null");
    }
}
