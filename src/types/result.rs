//! The canonical result contract every call resolves to.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of a facade call.
///
/// `success` is left unset on success. A call that spent its whole retry
/// budget on retryable failures comes back with `success: Some(false)` and a
/// descriptive `error`; callers aggregating many providers can keep going.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResult {
    pub results: Value,
    #[serde(
        rename = "originalResponse",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub original_response: Option<Value>,
    pub total_time: String,
    #[serde(default)]
    pub request_time: String,
    pub retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NormalizedResult {
    /// Soft failure produced when retries ran out.
    pub fn exhausted(error: impl Into<String>, total_time: String, retries: u32) -> Self {
        Self {
            results: Value::Null,
            original_response: None,
            total_time,
            request_time: String::new(),
            retries,
            success: Some(false),
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success != Some(false)
    }

    /// Text payload, when the provider answered with a string.
    pub fn text(&self) -> Option<&str> {
        self.results.as_str()
    }

    /// Whether `results` carries anything worth returning or caching.
    pub fn has_results(&self) -> bool {
        is_truthy(&self.results)
    }
}

/// Loose truthiness used to decide whether a payload counts as a response:
/// null, `false`, `0` and `""` do not. Containers always do, even when empty,
/// so an adapter legitimately answering `[]` is not retried.
pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Render a duration in milliseconds the way results carry it (`"12.345ms"`).
pub fn format_millis(elapsed: std::time::Duration) -> String {
    format!("{:.3}ms", elapsed.as_secs_f64() * 1000.0)
}
