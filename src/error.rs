use crate::store::StoreError;
use thiserror::Error;

/// Boxed error produced by a wrapped function or chunk source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Structured error context for configuration and validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Option or settings key that caused the error (e.g., "backoff_intervals", "store.path")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected length, offending value)
    pub details: Option<String>,
    /// Source of the error (e.g., "retry_state", "settings_loader")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the memoizing call layer.
///
/// Bookkeeping errors (configuration, parameter serialization) are fatal to a call.
/// Store errors raised inside the executor are logged and downgraded to misses; the
/// `Store` variant only surfaces from direct store use.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Unserializable parameter `{name}`: {source}")]
    UnserializableParameter {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Call to `{function}` failed after {attempts} attempt(s): {source}")]
    CallExhausted {
        function: String,
        attempts: u32,
        #[source]
        source: BoxError,
    },

    #[error("Stream from `{function}` failed after {attempts} attempt(s): {source}")]
    StreamExhausted {
        function: String,
        attempts: u32,
        #[source]
        source: BoxError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Create an unserializable-parameter error for the named parameter
    pub fn unserializable(name: impl Into<String>, source: serde_json::Error) -> Self {
        Error::UnserializableParameter {
            name: name.into(),
            source,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }

    /// True when every attempt of the wrapped function or stream failed.
    pub fn is_exhausted(&self) -> bool {
        matches!(
            self,
            Error::CallExhausted { .. } | Error::StreamExhausted { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_display_includes_context() {
        let err = Error::configuration_with_context(
            "backoff intervals do not match retries",
            ErrorContext::new()
                .with_field_path("backoff_intervals")
                .with_source("retry_state"),
        );
        let text = err.to_string();
        assert!(text.starts_with("Configuration error: backoff intervals"));
        assert!(text.contains("field: backoff_intervals"));
        assert!(text.contains("source: retry_state"));
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("backoff_intervals")
        );
    }

    #[test]
    fn exhausted_errors_keep_the_last_cause() {
        let err = Error::CallExhausted {
            function: "summarize".into(),
            attempts: 2,
            source: "upstream timed out".into(),
        };
        assert!(err.is_exhausted());
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("upstream timed out"));
        assert_eq!(
            err.to_string(),
            "Call to `summarize` failed after 2 attempt(s): upstream timed out"
        );
    }
}
