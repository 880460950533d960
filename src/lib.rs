//! # llm-cache
//!
//! A memoizing call layer for expensive, possibly flaky functions such as LLM
//! completions.
//!
//! ## Overview
//!
//! A wrapped call is addressed by a deterministic key computed from a stable
//! function id and the arguments that affect its result. When the store already
//! holds a record for that key, and the record was written for exactly the same
//! parameters, the stored response is returned without running the function.
//! Otherwise the function runs, failures are retried on a fixed backoff
//! schedule, and the fresh result is written back.
//!
//! - **Deterministic keys**: SHA-256 over a canonical JSON form, independent of
//!   argument order
//! - **Pluggable storage**: anything implementing the two-operation
//!   [`KvStore`] contract
//! - **Availability first**: store failures degrade to "always recompute"
//! - **Streaming**: chunked results are forwarded live and replayed from cache
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use llm_cache::{CallArgs, CallOptions, FileStore, MemoCache};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> llm_cache::Result<()> {
//!     let cache = MemoCache::with_store(FileStore::open("cache.json").await?);
//!     let options = CallOptions::new()
//!         .exclude("timeout")
//!         .with_retries(vec![Duration::from_secs(5), Duration::from_secs(10)]);
//!
//!     let args = CallArgs::new()
//!         .with("model", "gpt-4")?
//!         .with("temperature", 0.8)?
//!         .with("timeout", 40)?;
//!
//!     let reply: String = cache
//!         .call("call_openai", args, &options, |args| async move {
//!             // talk to the model here
//!             Ok::<_, std::io::Error>(format!("{:?}", args.get_str("model")))
//!         })
//!         .await?;
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Call arguments, cache params, key derivation, stored records |
//! | [`store`] | The key-value store contract and its backends |
//! | [`executor`] | [`MemoCache`]: memoized calls, streaming calls, retry options |
//! | [`config`] | Settings files and environment overrides |

pub mod cache;
pub mod config;
pub mod executor;
pub mod store;

pub use cache::{generate_key, CacheKey, CacheParams, CacheRecord, CallArgs};
pub use config::{CacheSettings, StoreSettings};
pub use executor::{CacheStats, CallOptions, MemoCache, RetryState};
pub use store::{
    DocumentCollection, DocumentEncoding, DocumentStore, FileStore, KvStore, MemoryCollection,
    MemoryStore, NullStore, StoreError, StoreResult,
};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{BoxError, Error, ErrorContext};
