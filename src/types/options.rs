//! Per-call option bags.
//!
//! [`RequestOptions`] is handed to the provider adapter untouched;
//! [`InterfaceOptions`] steers the facade itself and never reaches a provider.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Provider passthrough options.
///
/// `model` and `max_tokens` are understood by every adapter. Anything else
/// lands in `extra` and is flattened back out when serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// `"json_object"` asks the facade to extract structured JSON from the reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_response_format(mut self, format: impl Into<String>) -> Self {
        self.response_format = Some(format.into());
        self
    }

    /// Set an arbitrary passthrough field (e.g. `temperature`).
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn wants_json_object(&self) -> bool {
        self.response_format.as_deref() == Some("json_object")
    }
}

/// Facade-level knobs recognised on every call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceOptions {
    /// Enables the TTL cache for this call when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_timeout_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_multiplier: Option<f64>,
    #[serde(default)]
    pub attempt_json_repair: bool,
    #[serde(default)]
    pub include_original_response: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embeddings_default_provider: Option<String>,
}

impl InterfaceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_timeout_seconds(mut self, secs: u64) -> Self {
        self.cache_timeout_seconds = Some(secs);
        self
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = Some(attempts);
        self
    }

    pub fn with_retry_multiplier(mut self, multiplier: f64) -> Self {
        self.retry_multiplier = Some(multiplier);
        self
    }

    pub fn with_json_repair(mut self, enable: bool) -> Self {
        self.attempt_json_repair = enable;
        self
    }

    pub fn with_original_response(mut self, enable: bool) -> Self {
        self.include_original_response = enable;
        self
    }

    pub fn with_embeddings_default_provider(mut self, provider: impl Into<String>) -> Self {
        self.embeddings_default_provider = Some(provider.into());
        self
    }

    /// Fill every unset field from `defaults`. Boolean switches are OR-ed.
    pub fn merged_over(&self, defaults: &InterfaceOptions) -> InterfaceOptions {
        InterfaceOptions {
            cache_timeout_seconds: self.cache_timeout_seconds.or(defaults.cache_timeout_seconds),
            retry_attempts: self.retry_attempts.or(defaults.retry_attempts),
            retry_multiplier: self.retry_multiplier.or(defaults.retry_multiplier),
            attempt_json_repair: self.attempt_json_repair || defaults.attempt_json_repair,
            include_original_response: self.include_original_response
                || defaults.include_original_response,
            embeddings_default_provider: self
                .embeddings_default_provider
                .clone()
                .or_else(|| defaults.embeddings_default_provider.clone()),
        }
    }
}
