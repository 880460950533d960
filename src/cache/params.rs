//! Call arguments and the cache parameters derived from them.

use super::finite::to_finite_value;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

/// The full named-argument set of a wrapped call.
///
/// Every value is held as JSON so it can take part in key derivation. The
/// wrapped function receives the whole set, excluded parameters included.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallArgs {
    values: BTreeMap<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) an argument.
    ///
    /// Fails with [`Error::UnserializableParameter`] when `value` cannot be
    /// represented as JSON, e.g. a map with non-string keys or a NaN.
    pub fn insert<T: Serialize + ?Sized>(&mut self, name: impl Into<String>, value: &T) -> Result<()> {
        let name = name.into();
        let value = to_finite_value(value).map_err(|e| Error::unserializable(name.clone(), e))?;
        self.values.insert(name, value);
        Ok(())
    }

    /// Builder form of [`CallArgs::insert`].
    pub fn with<T: Serialize>(mut self, name: impl Into<String>, value: T) -> Result<Self> {
        self.insert(name, &value)?;
        Ok(self)
    }

    /// Add an argument that is already JSON.
    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    /// Deserialize an argument into a concrete type.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        self.values
            .get(name)
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .map_err(Error::from)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// The arguments that participate in key derivation: everything except
    /// the names in `exclude`.
    pub fn cache_params(&self, exclude: &HashSet<String>) -> CacheParams {
        CacheParams {
            values: self
                .values
                .iter()
                .filter(|(k, _)| !exclude.contains(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

impl From<Map<String, Value>> for CallArgs {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            values: map.into_iter().collect(),
        }
    }
}

/// Parameters that determine a call's result, persisted next to the response
/// so a read can reject records written for different parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheParams {
    values: BTreeMap<String, Value>,
}

impl CacheParams {
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Map<String, Value>> for CacheParams {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            values: map.into_iter().collect(),
        }
    }
}
