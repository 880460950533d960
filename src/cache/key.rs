//! Cache key generation.
//!
//! A key is the lowercase hex SHA-256 digest of the canonical JSON text of
//! `[function_id, cache_params]`. The canonical text sorts object keys at every
//! level, separates items with `", "` and keys from values with `": "`, and
//! escapes every non-ASCII character as `\uXXXX`.

use super::finite::to_finite_value;
use super::params::CacheParams;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey {
    pub hash: String,
}

impl CacheKey {
    pub fn new(hash: impl Into<String>) -> Self {
        Self { hash: hash.into() }
    }
    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Derive the cache key for a call of `function_id` with `params`.
pub fn generate_key(function_id: &str, params: &CacheParams) -> CacheKey {
    let mut canonical = String::with_capacity(64);
    canonical.push('[');
    write_string(&mut canonical, function_id);
    canonical.push_str(", ");
    write_object(&mut canonical, params.iter());
    canonical.push(']');
    digest(&canonical)
}

/// Derive a cache key from a typed parameter struct.
///
/// The value must serialize to a JSON object; anything else is reported as an
/// unserializable parameter.
pub fn generate_key_for<T: Serialize + ?Sized>(function_id: &str, params: &T) -> Result<CacheKey> {
    let value = to_finite_value(params).map_err(|e| Error::unserializable("<params>", e))?;
    match value {
        Value::Object(map) => Ok(generate_key(function_id, &CacheParams::from(map))),
        other => Err(Error::unserializable(
            "<params>",
            serde::de::Error::custom(format!(
                "cache params must be a JSON object, got {}",
                kind_of(&other)
            )),
        )),
    }
}

/// Canonical JSON text of a value. Equal values produce identical text
/// regardless of map insertion order.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn digest(canonical: &str) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let hash: String = hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect();
    CacheKey::new(hash)
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => {
            let _ = write!(out, "{}", n);
        }
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => write_object(out, map.iter()),
    }
}

fn write_object<'a>(out: &mut String, entries: impl Iterator<Item = (&'a String, &'a Value)>) {
    // Code-point order; byte order of UTF-8 strings is the same ordering.
    let mut entries: Vec<_> = entries.collect();
    entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
    out.push('{');
    for (i, (k, v)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_string(out, k);
        out.push_str(": ");
        write_value(out, v);
    }
    out.push('}');
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            }
        }
    }
    out.push('"');
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
