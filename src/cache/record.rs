//! The stored unit: a response together with the parameters it was computed for.

use super::params::CacheParams;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord<R> {
    pub response: R,
    pub cache_params: CacheParams,
}

impl<R> CacheRecord<R> {
    pub fn new(response: R, cache_params: CacheParams) -> Self {
        Self {
            response,
            cache_params,
        }
    }

    /// True when this record was written for exactly `params`.
    pub fn matches(&self, params: &CacheParams) -> bool {
        &self.cache_params == params
    }
}

impl<R: Serialize> CacheRecord<R> {
    /// Raw value handed to a store.
    pub fn to_raw(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl<R: DeserializeOwned> CacheRecord<R> {
    pub fn from_raw(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}
