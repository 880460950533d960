//! # Key-Value Stores
//!
//! The memoizing executor only needs two operations from storage: read the raw
//! value under a key and overwrite it. [`KvStore`] is that contract; every
//! backend here is a separate type chosen by the caller at construction time.
//!
//! | Backend | Description |
//! |---------|-------------|
//! | [`MemoryStore`] | In-process map, for tests and short-lived processes |
//! | [`NullStore`] | Never hits, discards writes; disables caching |
//! | [`FileStore`] | One JSON document on disk, rewritten on every `set` |
//! | [`DocumentStore`] | One document per key in a [`DocumentCollection`] |
//!
//! Raw values are JSON text produced by the executor. An absent key and an
//! empty value both count as a miss.

mod document;
mod file;
mod memory;

pub use document::{DocumentCollection, DocumentEncoding, DocumentStore, MemoryCollection};
pub use file::FileStore;
pub use memory::{MemoryStore, NullStore};

use crate::cache::CacheKey;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Errors raised by storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Backend `{backend}` failed: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn backend(backend: &'static str, message: impl Into<String>) -> Self {
        StoreError::Backend {
            backend,
            message: message.into(),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Raw value stored under `key`, or `None` when absent.
    async fn get(&self, key: &CacheKey) -> StoreResult<Option<String>>;
    /// Replace whatever is stored under `key` with `value`.
    async fn set(&self, key: &CacheKey, value: &str) -> StoreResult<()>;
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<S: KvStore + ?Sized> KvStore for Arc<S> {
    async fn get(&self, key: &CacheKey) -> StoreResult<Option<String>> {
        (**self).get(key).await
    }
    async fn set(&self, key: &CacheKey, value: &str) -> StoreResult<()> {
        (**self).set(key, value).await
    }
    fn name(&self) -> &'static str {
        (**self).name()
    }
}

#[async_trait]
impl<S: KvStore + ?Sized> KvStore for Box<S> {
    async fn get(&self, key: &CacheKey) -> StoreResult<Option<String>> {
        (**self).get(key).await
    }
    async fn set(&self, key: &CacheKey, value: &str) -> StoreResult<()> {
        (**self).set(key, value).await
    }
    fn name(&self) -> &'static str {
        (**self).name()
    }
}
