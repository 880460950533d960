//! # Memoizing Call Executor
//!
//! [`MemoCache`] wraps a function call: it derives the cache key from the
//! call's arguments, answers from the store when a matching record exists and
//! otherwise invokes the function, retrying failures on a fixed backoff
//! schedule and writing the fresh result back.
//!
//! ```text
//! call ──► key ──► store.get ──hit──► response
//!                     │
//!                    miss ──► f(args) ──ok──► store.set ──► response
//!                               │
//!                              err ──► sleep(backoff) ──► f(args) ...
//!                                        (none left) ──► CallExhausted
//! ```
//!
//! Store failures never fail a call: a failed read is a miss and a failed
//! write is logged. There is no per-key locking, so two concurrent misses on
//! the same key both run the function and the last write wins.
//!
//! ## Example
//!
//! ```rust,no_run
//! use llm_cache::{CallArgs, CallOptions, MemoCache, MemoryStore};
//!
//! # async fn run() -> llm_cache::Result<()> {
//! let cache = MemoCache::with_store(MemoryStore::new());
//! let args = CallArgs::new().with("prompt", "Hello")?.with("timeout", 40)?;
//! let options = CallOptions::new().exclude("timeout");
//!
//! let answer: String = cache
//!     .call("complete", args, &options, |args| async move {
//!         let prompt = args.get_str("prompt").unwrap_or_default().to_string();
//!         Ok::<_, std::io::Error>(format!("echo: {prompt}"))
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod options;
mod stats;
mod stream;

pub use options::{default_backoff_intervals, CallOptions, RetryState, DEFAULT_NUM_RETRIES};
pub use stats::CacheStats;

use crate::cache::{generate_key, CacheKey, CacheParams, CacheRecord, CallArgs};
use crate::error::BoxError;
use crate::store::KvStore;
use crate::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use stats::AtomicStats;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct MemoCache {
    store: Arc<dyn KvStore>,
    stats: Arc<AtomicStats>,
}

impl MemoCache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            stats: Arc::new(AtomicStats::default()),
        }
    }

    pub fn with_store<S: KvStore + 'static>(store: S) -> Self {
        Self::new(Arc::new(store))
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.name()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    /// Call `f` through the cache.
    ///
    /// `function` identifies the wrapped function in the cache key; two
    /// functions sharing an id share cache entries. `f` receives the full
    /// argument set on every attempt, excluded parameters included.
    pub async fn call<T, E, F, Fut>(
        &self,
        function: &str,
        args: CallArgs,
        options: &CallOptions,
        mut f: F,
    ) -> Result<T>
    where
        F: FnMut(CallArgs) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        T: Serialize + DeserializeOwned,
        E: Into<BoxError>,
    {
        let mut retry = options.retry_state()?;
        let cache_params = args.cache_params(&options.exclude_params);
        let key = generate_key(function, &cache_params);

        if let Some(response) = self.lookup::<T>(function, &key, &cache_params).await {
            return Ok(response);
        }

        let mut attempt: u32 = 1;
        loop {
            match f(args.clone()).await {
                Ok(response) => {
                    let record = CacheRecord::new(&response, cache_params);
                    self.write_back(function, &key, &record).await;
                    return Ok(response);
                }
                Err(err) => {
                    let err: BoxError = err.into();
                    match retry.next_backoff() {
                        Some(delay) => {
                            AtomicStats::bump(&self.stats.retries);
                            info!(
                                function,
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                error = %err,
                                "call failed, retrying after backoff"
                            );
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                        }
                        None => {
                            AtomicStats::bump(&self.stats.exhausted);
                            error!(function, attempts = attempt, error = %err, "no retries left");
                            return Err(Error::CallExhausted {
                                function: function.to_string(),
                                attempts: attempt,
                                source: err,
                            });
                        }
                    }
                }
            }
        }
    }

    /// Read and validate the record under `key`. Every failure mode is a miss.
    pub(crate) async fn lookup<R: DeserializeOwned>(
        &self,
        function: &str,
        key: &CacheKey,
        params: &CacheParams,
    ) -> Option<R> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) if !raw.is_empty() => raw,
            Ok(_) => {
                AtomicStats::bump(&self.stats.misses);
                debug!(function, cache_key = %key, "cache miss");
                return None;
            }
            Err(e) => {
                AtomicStats::bump(&self.stats.store_errors);
                AtomicStats::bump(&self.stats.misses);
                warn!(function, cache_key = %key, store = self.store.name(), error = %e, "cache read failed, treating as miss");
                return None;
            }
        };

        match CacheRecord::<R>::from_raw(&raw) {
            Ok(record) if record.matches(params) => {
                AtomicStats::bump(&self.stats.hits);
                debug!(function, cache_key = %key, "cache hit");
                Some(record.response)
            }
            Ok(_) => {
                AtomicStats::bump(&self.stats.misses);
                warn!(function, cache_key = %key, "stored cache_params differ from the call, treating as miss");
                None
            }
            Err(e) => {
                AtomicStats::bump(&self.stats.misses);
                warn!(function, cache_key = %key, error = %e, "stored record is unreadable, treating as miss");
                None
            }
        }
    }

    /// Persist a fresh result. Failures are logged, never returned.
    pub(crate) async fn write_back<R: Serialize>(
        &self,
        function: &str,
        key: &CacheKey,
        record: &CacheRecord<R>,
    ) {
        let raw = match record.to_raw() {
            Ok(raw) => raw,
            Err(e) => {
                AtomicStats::bump(&self.stats.store_errors);
                warn!(function, cache_key = %key, error = %e, "response is not serializable, skipping cache write");
                return;
            }
        };
        match self.store.set(key, &raw).await {
            Ok(()) => {
                AtomicStats::bump(&self.stats.writes);
                debug!(function, cache_key = %key, store = self.store.name(), "cached fresh result");
            }
            Err(e) => {
                AtomicStats::bump(&self.stats.store_errors);
                warn!(function, cache_key = %key, store = self.store.name(), error = %e, "cache write failed");
            }
        }
    }
}

impl std::fmt::Debug for MemoCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoCache")
            .field("store", &self.store.name())
            .field("stats", &self.stats.to_stats())
            .finish()
    }
}
