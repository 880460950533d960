//! Per-call options and retry bookkeeping.

use crate::{Error, ErrorContext, Result};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;

pub const DEFAULT_NUM_RETRIES: u32 = 3;

pub fn default_backoff_intervals() -> Vec<Duration> {
    vec![
        Duration::from_secs(5),
        Duration::from_secs(30),
        Duration::from_secs(60),
    ]
}

/// Options recognized by [`MemoCache::call`](super::MemoCache::call) and
/// [`MemoCache::stream_call`](super::MemoCache::stream_call).
///
/// `backoff_intervals` must hold exactly one duration per retry. The pair is
/// checked when a call starts, so the setters may be applied in any order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOptions {
    pub exclude_params: HashSet<String>,
    pub num_retries: u32,
    pub backoff_intervals: Vec<Duration>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            exclude_params: HashSet::new(),
            num_retries: DEFAULT_NUM_RETRIES,
            backoff_intervals: default_backoff_intervals(),
        }
    }
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, overridden by the environment:
    /// - `LLM_CACHE_NUM_RETRIES` (default 3)
    /// - `LLM_CACHE_BACKOFF_SECS`, comma-separated seconds (default `5,30,60`)
    pub fn from_env() -> Result<Self> {
        let mut options = Self::default();
        if let Ok(raw) = std::env::var("LLM_CACHE_NUM_RETRIES") {
            options.num_retries = raw.trim().parse().map_err(|_| {
                Error::configuration_with_context(
                    "invalid retry count",
                    ErrorContext::new()
                        .with_field_path("LLM_CACHE_NUM_RETRIES")
                        .with_details(format!("expected a non-negative integer, got `{}`", raw))
                        .with_source("call_options"),
                )
            })?;
        }
        if let Ok(raw) = std::env::var("LLM_CACHE_BACKOFF_SECS") {
            options.backoff_intervals = parse_backoff_secs(&raw).map_err(|details| {
                Error::configuration_with_context(
                    "invalid backoff intervals",
                    ErrorContext::new()
                        .with_field_path("LLM_CACHE_BACKOFF_SECS")
                        .with_details(details)
                        .with_source("call_options"),
                )
            })?;
        }
        Ok(options)
    }

    pub fn with_exclude_params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_params = names.into_iter().map(Into::into).collect();
        self
    }

    /// Exclude one more argument from key derivation.
    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.exclude_params.insert(name.into());
        self
    }

    pub fn with_num_retries(mut self, n: u32) -> Self {
        self.num_retries = n;
        self
    }

    pub fn with_backoff_intervals(mut self, intervals: Vec<Duration>) -> Self {
        self.backoff_intervals = intervals;
        self
    }

    /// Set the retry count from the schedule itself: one retry per interval.
    pub fn with_retries(mut self, intervals: Vec<Duration>) -> Self {
        self.num_retries = intervals.len() as u32;
        self.backoff_intervals = intervals;
        self
    }

    /// No retries: the first failure is final.
    pub fn without_retries(self) -> Self {
        self.with_retries(Vec::new())
    }

    /// Check the retry/backoff pair and produce the state for one invocation.
    pub fn retry_state(&self) -> Result<RetryState> {
        RetryState::new(self.num_retries, self.backoff_intervals.clone())
    }
}

/// Parse a comma-separated list of (possibly fractional) seconds.
pub(crate) fn parse_backoff_secs(raw: &str) -> std::result::Result<Vec<Duration>, String> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',')
        .map(|part| {
            let part = part.trim();
            part.parse::<f64>()
                .ok()
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                .ok_or_else(|| format!("`{}` is not a non-negative number of seconds", part))
        })
        .collect()
}

/// Remaining retries and the backoff to wait before each of them.
///
/// `backoff.len() == remaining` holds from construction on; every
/// [`RetryState::next_backoff`] consumes one retry and its interval together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    remaining: u32,
    backoff: VecDeque<Duration>,
}

impl RetryState {
    pub fn new(retries: u32, intervals: Vec<Duration>) -> Result<Self> {
        if intervals.len() != retries as usize {
            return Err(Error::configuration_with_context(
                format!(
                    "the length of backoff_intervals ({}) must match num_retries ({})",
                    intervals.len(),
                    retries
                ),
                ErrorContext::new()
                    .with_field_path("backoff_intervals")
                    .with_source("retry_state"),
            ));
        }
        Ok(Self {
            remaining: retries,
            backoff: intervals.into(),
        })
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Take the next retry. `None` once the retries are used up.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        let delay = self.backoff.pop_front()?;
        self.remaining -= 1;
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_three_retries_at_5_30_60() {
        let options = CallOptions::default();
        assert_eq!(options.num_retries, 3);
        assert_eq!(
            options.backoff_intervals,
            vec![
                Duration::from_secs(5),
                Duration::from_secs(30),
                Duration::from_secs(60)
            ]
        );
        assert!(options.retry_state().is_ok());
    }

    #[test]
    fn mismatched_schedule_is_a_configuration_error() {
        let options = CallOptions::new()
            .with_num_retries(2)
            .with_backoff_intervals(vec![Duration::from_secs(5)]);
        let err = options.retry_state().unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(err.to_string().contains("(1) must match num_retries (2)"));
    }

    #[test]
    fn retry_state_drains_in_order() {
        let mut state = RetryState::new(
            2,
            vec![Duration::from_millis(10), Duration::from_millis(20)],
        )
        .unwrap();
        assert_eq!(state.next_backoff(), Some(Duration::from_millis(10)));
        assert_eq!(state.remaining(), 1);
        assert_eq!(state.next_backoff(), Some(Duration::from_millis(20)));
        assert_eq!(state.remaining(), 0);
        assert_eq!(state.next_backoff(), None);
        assert_eq!(state.remaining(), 0);
    }

    #[test]
    fn builder_keeps_exclusions() {
        let options = CallOptions::new()
            .with_exclude_params(["timeout"])
            .exclude("num_retries")
            .without_retries();
        assert!(options.exclude_params.contains("timeout"));
        assert!(options.exclude_params.contains("num_retries"));
        assert_eq!(options.num_retries, 0);
        assert!(options.backoff_intervals.is_empty());
    }

    #[test]
    fn backoff_list_parsing() {
        assert_eq!(
            parse_backoff_secs("1, 2.5,0").unwrap(),
            vec![
                Duration::from_secs(1),
                Duration::from_millis(2500),
                Duration::ZERO
            ]
        );
        assert_eq!(parse_backoff_secs("  ").unwrap(), Vec::<Duration>::new());
        assert!(parse_backoff_secs("1,-2").is_err());
        assert!(parse_backoff_secs("soon").is_err());
        assert!(parse_backoff_secs("1e300").is_err());
        assert!(parse_backoff_secs("inf").is_err());
        assert!(parse_backoff_secs("NaN").is_err());
    }
}
