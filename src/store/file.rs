//! File-backed store: a single JSON object mapping cache key to record.

use super::{KvStore, StoreError, StoreResult};
use crate::cache::CacheKey;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Whole-file JSON store.
///
/// Every `get` reads and parses the file; every `set` rewrites it. Records are
/// kept as structured JSON so the file stays readable. Malformed content is
/// treated as an empty mapping and replaced on the next write.
pub struct FileStore {
    path: PathBuf,
    // serializes this process's read-modify-write cycles
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open the store at `path`, creating the file with `{}` when absent.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|source| io_error(&path, source))?;
        if !exists {
            debug!(path = %path.display(), "creating empty cache file");
            tokio::fs::write(&path, b"{}")
                .await
                .map_err(|source| io_error(&path, source))?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keys currently stored, in sorted order.
    pub async fn keys(&self) -> StoreResult<Vec<String>> {
        let mut keys: Vec<String> = self.read_map().await?.into_iter().map(|(k, _)| k).collect();
        keys.sort();
        Ok(keys)
    }

    async fn read_map(&self) -> StoreResult<Map<String, Value>> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| io_error(&self.path, source))?;
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => {
                warn!(
                    path = %self.path.display(),
                    "cache file is empty or malformed, treating it as empty"
                );
                Ok(Map::new())
            }
        }
    }

    /// Replace the file through a sibling temp file so readers never see a
    /// partial write.
    async fn write_map(&self, map: &Map<String, Value>) -> StoreResult<()> {
        let text = serde_json::to_string_pretty(map)?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, text)
            .await
            .map_err(|source| io_error(&tmp, source))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| io_error(&self.path, source))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn get(&self, key: &CacheKey) -> StoreResult<Option<String>> {
        let map = self.read_map().await?;
        match map.get(key.as_str()) {
            Some(record) => Ok(Some(serde_json::to_string(record)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &CacheKey, value: &str) -> StoreResult<()> {
        let record: Value = serde_json::from_str(value)?;
        let _guard = self.write_lock.lock().await;
        let mut map = self.read_map().await?;
        map.insert(key.hash.clone(), record);
        self.write_map(&map).await
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn open_creates_an_empty_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let store = FileStore::open(&path).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn records_are_stored_as_structured_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let store = FileStore::open(&path).await.unwrap();
        let key = CacheKey::from("abc");
        store
            .set(&key, r#"{"response":"hi","cache_params":{"n":1}}"#)
            .await
            .unwrap();

        let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            on_disk,
            json!({"abc": {"response": "hi", "cache_params": {"n": 1}}})
        );
        let raw = store.get(&key).await.unwrap().unwrap();
        let back: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, json!({"response": "hi", "cache_params": {"n": 1}}));
    }

    #[tokio::test]
    async fn malformed_file_reads_as_empty_and_is_repaired() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = FileStore::open(&path).await.unwrap();
        let key = CacheKey::from("k");
        assert_eq!(store.get(&key).await.unwrap(), None);

        store.set(&key, r#"{"response":1,"cache_params":{}}"#).await.unwrap();
        assert_eq!(store.keys().await.unwrap(), vec!["k".to_string()]);
    }

    #[tokio::test]
    async fn writes_replace_the_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let store = std::sync::Arc::new(FileStore::open(&path).await.unwrap());

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    let record = format!(r#"{{"response":{},"cache_params":{{"i":{}}}}}"#, i, i);
                    store.set(&CacheKey::from(format!("k{}", i)), &record).await.unwrap();
                }
            })
        };
        // concurrent readers always see a complete mapping
        for _ in 0..50 {
            let text = tokio::fs::read_to_string(&path).await.unwrap();
            assert!(serde_json::from_str::<Value>(&text).unwrap().is_object());
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();

        assert_eq!(store.keys().await.unwrap().len(), 50);
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("cache.json")]);
    }

    #[tokio::test]
    async fn non_json_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("cache.json")).await.unwrap();
        let err = store.set(&CacheKey::from("k"), "not json").await.unwrap_err();
        assert!(matches!(err, StoreError::Encoding(_)));
    }
}
