use crate::client::adapter::AdapterError;
use crate::resilience::FailureClass;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "request.credential", "cache.dir")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "orchestrator", "request_validator")
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

/// Unified error type for the facade.
///
/// Only fatal categories surface here. Rate-limited and transient server
/// failures are retried and, once the budget is spent, come back as a
/// `NormalizedResult` with `success: Some(false)` instead of an `Err`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Remote error: HTTP {} ({class}) on attempt {attempt}: {message}", format_status(.status))]
    Remote {
        /// `None` renders as "Unknown" (network failures, unclassified statuses).
        status: Option<u16>,
        class: FailureClass,
        message: String,
        body: Option<serde_json::Value>,
        /// 1-based attempt on which the failure was raised.
        attempt: u32,
        #[source]
        source: AdapterError,
    },

    #[error("Cache error: {message}{}", format_context(.context))]
    Cache {
        message: String,
        context: ErrorContext,
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

fn format_status(status: &Option<u16>) -> String {
    match status {
        Some(s) => s.to_string(),
        None => "Unknown".to_string(),
    }
}

impl Error {
    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn cache_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Cache {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Cache { context, .. } => Some(context),
            _ => None,
        }
    }

    /// HTTP status carried by a remote failure. `None` for everything else,
    /// including remote failures classified as unknown.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Remote { status, .. } => *status,
            _ => None,
        }
    }

    /// Attempt number (1-based) on which a remote failure was raised.
    pub fn attempt(&self) -> Option<u32> {
        match self {
            Error::Remote { attempt, .. } => Some(*attempt),
            _ => None,
        }
    }

    /// Classification of a remote failure.
    pub fn failure_class(&self) -> Option<FailureClass> {
        match self {
            Error::Remote { class, .. } => Some(*class),
            _ => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_rendered_in_display() {
        let err = Error::configuration_with_context(
            "missing credential",
            ErrorContext::new()
                .with_field_path("request.credential")
                .with_source("orchestrator"),
        );
        let text = err.to_string();
        assert!(text.contains("missing credential"));
        assert!(text.contains("field: request.credential"));
        assert!(text.contains("source: orchestrator"));
    }

    #[test]
    fn unknown_remote_status_displays_as_unknown() {
        let err = Error::Remote {
            status: None,
            class: FailureClass::UnknownFatal,
            message: "connection refused".into(),
            body: None,
            attempt: 1,
            source: AdapterError::network("connection refused"),
        };
        assert!(err.to_string().contains("HTTP Unknown"));
        assert_eq!(err.status(), None);
        assert_eq!(err.attempt(), Some(1));
    }
}
