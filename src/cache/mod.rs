//! # Cache Keys and Records
//!
//! This module holds the pure half of the memoization layer: turning a call's
//! arguments into a deterministic key and describing what gets stored under it.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CallArgs`] | Named arguments of a wrapped call, held as JSON |
//! | [`CacheParams`] | The arguments that participate in key derivation |
//! | [`CacheKey`] | Lowercase hex SHA-256 digest addressing a record |
//! | [`CacheRecord`] | `{response, cache_params}` as persisted in a store |
//!
//! ## Example
//!
//! ```rust
//! use llm_cache::cache::{generate_key, CallArgs};
//! use std::collections::HashSet;
//!
//! let args = CallArgs::new()
//!     .with("model", "gpt-4")?
//!     .with("temperature", 0.5)?
//!     .with("timeout", 40)?;
//! let exclude: HashSet<String> = ["timeout".to_string()].into_iter().collect();
//! let key = generate_key("call_openai", &args.cache_params(&exclude));
//! assert_eq!(
//!     key.as_str(),
//!     "f8c0b01c9e9acf3a74787c67d3bc2bf747f204ef8ecc51d7cc67582dfbd45213"
//! );
//! # Ok::<(), llm_cache::Error>(())
//! ```
//!
//! Keys are byte-compatible with caches written by the Python `llm_cache`
//! package for string, integer, boolean, null, list and object parameters.

mod finite;
mod key;
mod params;
mod record;

pub use key::{canonical_json, generate_key, generate_key_for, CacheKey};
pub use params::{CacheParams, CallArgs};
pub use record::CacheRecord;
