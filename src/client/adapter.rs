//! The narrow interface provider adapters implement.
//!
//! Adapters translate the common request into a provider's wire format and
//! back. Whatever HTTP client they use, failures must be translated into
//! [`AdapterError`] at the boundary: the retry scheduler only ever looks at
//! `status_code` and `retry_after`.

use crate::types::{InterfaceOptions, RequestOptions};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// What an adapter hands back on success.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterResponse {
    /// Extracted payload: reply text for chat, a number array for embeddings.
    pub results: Value,
    /// Raw provider body, kept only when the caller asks for it.
    pub original_response: Option<Value>,
}

impl AdapterResponse {
    pub fn new(results: impl Into<Value>) -> Self {
        Self {
            results: results.into(),
            original_response: None,
        }
    }

    pub fn with_original(mut self, original: Value) -> Self {
        self.original_response = Some(original);
        self
    }
}

/// Normalized adapter failure.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AdapterError {
    /// HTTP status, `None` for network-level failures.
    pub status_code: Option<u16>,
    /// Provider response body, JSON when it parsed as such.
    pub body: Option<Value>,
    pub message: String,
    /// Server-provided backoff hint (`Retry-After`).
    pub retry_after: Option<Duration>,
}

impl AdapterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status_code: None,
            body: None,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Failure with an HTTP status.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(message).with_status(status)
    }

    /// Failure below HTTP: DNS, connect, TLS, timeout.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(message)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// Build from an HTTP error response: status, headers (for `Retry-After`)
    /// and the raw body text.
    #[cfg(feature = "http")]
    pub fn from_http(status: u16, headers: &reqwest::header::HeaderMap, body_text: &str) -> Self {
        let body = serde_json::from_str::<Value>(body_text)
            .unwrap_or_else(|_| Value::String(body_text.to_string()));
        let message = provider_message(&body).unwrap_or_else(|| format!("HTTP {}", status));
        let mut err = Self::http(status, message).with_body(body);
        if let Some(delay) = headers
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after)
        {
            err = err.with_retry_after(delay);
        }
        err
    }
}

/// Best-effort parse of a `Retry-After` value.
///
/// Only the `Retry-After: <seconds>` form is honoured; HTTP-date values are
/// ignored and fall back to computed backoff.
pub fn parse_retry_after(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    // out-of-range values (negative, NaN, too large for a Duration) are ignored
    raw.parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

/// Pull a human-readable message out of the common error body shapes.
#[cfg_attr(not(feature = "http"), allow(dead_code))]
fn provider_message(body: &Value) -> Option<String> {
    body.get("error")
        .and_then(|e| e.get("message").or(Some(e)))
        .and_then(|m| m.as_str())
        .or_else(|| body.get("message").and_then(|m| m.as_str()))
        .map(|s| s.to_string())
}

/// A provider integration.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn send_message(
        &self,
        message: &Value,
        options: &RequestOptions,
        interface_options: &InterfaceOptions,
    ) -> Result<AdapterResponse, AdapterError>;

    async fn embeddings(
        &self,
        _text: &str,
        _options: &RequestOptions,
        _interface_options: &InterfaceOptions,
    ) -> Result<AdapterResponse, AdapterError> {
        Err(AdapterError::new("embeddings are not supported by this provider"))
    }

    fn supports_embeddings(&self) -> bool {
        false
    }
}
