//! Settings files.
//!
//! A settings document picks the store backend and the default call options:
//!
//! ```yaml
//! store:
//!   kind: file
//!   path: cache.json
//! num_retries: 2
//! backoff_secs: [5, 10]
//! exclude_params: [timeout]
//! ```

use crate::executor::{default_backoff_intervals, CallOptions, MemoCache, DEFAULT_NUM_RETRIES};
use crate::store::{FileStore, KvStore, MemoryStore, NullStore};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Which backend to build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreSettings {
    #[default]
    Memory,
    Null,
    File {
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_secs: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_params: Vec<String>,
}

impl CacheSettings {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| {
            Error::configuration_with_context(
                "invalid cache settings",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("settings_loader"),
            )
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                "cannot read cache settings",
                ErrorContext::new()
                    .with_field_path(path.display().to_string())
                    .with_details(e.to_string())
                    .with_source("settings_loader"),
            )
        })?;
        Self::from_yaml_str(&text)
    }

    /// Default call options described by these settings. The retry count and
    /// backoff list are validated together.
    pub fn call_options(&self) -> Result<CallOptions> {
        let backoff_intervals = match &self.backoff_secs {
            Some(secs) => secs
                .iter()
                .map(|s| {
                    Duration::try_from_secs_f64(*s).map_err(|e| {
                        Error::configuration_with_context(
                            "backoff must be a non-negative number of seconds",
                            ErrorContext::new()
                                .with_field_path("backoff_secs")
                                .with_details(format!("{}: {}", s, e))
                                .with_source("settings_loader"),
                        )
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            None => default_backoff_intervals(),
        };
        let options = CallOptions::new()
            .with_exclude_params(self.exclude_params.iter().cloned())
            .with_num_retries(self.num_retries.unwrap_or(DEFAULT_NUM_RETRIES))
            .with_backoff_intervals(backoff_intervals);
        options.retry_state()?;
        Ok(options)
    }

    pub async fn build_store(&self) -> Result<Arc<dyn KvStore>> {
        Ok(match &self.store {
            StoreSettings::Memory => Arc::new(MemoryStore::new()),
            StoreSettings::Null => Arc::new(NullStore::new()),
            StoreSettings::File { path } => Arc::new(FileStore::open(path.clone()).await?),
        })
    }

    /// Build the cache and its default options in one step.
    pub async fn build_cache(&self) -> Result<(MemoCache, CallOptions)> {
        let options = self.call_options()?;
        let store = self.build_store().await?;
        Ok((MemoCache::new(store), options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_means_defaults() {
        let settings = CacheSettings::from_yaml_str("{}").unwrap();
        assert_eq!(settings.store, StoreSettings::Memory);
        assert_eq!(settings.call_options().unwrap(), CallOptions::default());
    }

    #[test]
    fn file_store_and_retry_schedule() {
        let settings = CacheSettings::from_yaml_str(
            "store:\n  kind: file\n  path: /tmp/cache.json\nnum_retries: 2\nbackoff_secs: [0.5, 10]\nexclude_params: [timeout]\n",
        )
        .unwrap();
        assert_eq!(
            settings.store,
            StoreSettings::File {
                path: PathBuf::from("/tmp/cache.json")
            }
        );
        let options = settings.call_options().unwrap();
        assert_eq!(options.num_retries, 2);
        assert_eq!(
            options.backoff_intervals,
            vec![Duration::from_millis(500), Duration::from_secs(10)]
        );
        assert!(options.exclude_params.contains("timeout"));
    }

    #[test]
    fn retry_count_without_matching_backoff_is_rejected() {
        let settings = CacheSettings::from_yaml_str("num_retries: 1\n").unwrap();
        assert!(matches!(
            settings.call_options(),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn out_of_range_backoff_is_a_configuration_error() {
        for bad in ["[1e300]", "[-1]", "[.nan]", "[.inf]"] {
            let settings =
                CacheSettings::from_yaml_str(&format!("num_retries: 1\nbackoff_secs: {}\n", bad))
                    .unwrap();
            let err = settings.call_options().unwrap_err();
            assert_eq!(
                err.context().and_then(|c| c.field_path.as_deref()),
                Some("backoff_secs")
            );
        }
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = CacheSettings::from_yaml_str("ttl: 60\n").unwrap_err();
        assert!(err.to_string().contains("invalid cache settings"));
    }
}
