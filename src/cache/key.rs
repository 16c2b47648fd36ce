//! Cache key generation.

use crate::types::{EmbeddingRequest, NormalizedRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Bytes of the SHA-256 digest kept in a key (128 bits).
const KEY_BYTES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub hash: String,
    pub provider: Option<String>,
}

impl CacheKey {
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            provider: None,
        }
    }
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
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

/// Derives a stable key from a request's semantic identity.
///
/// Fields are collected into a map and serialized canonically (object keys
/// sorted at every depth), so the order in which options were assembled never
/// changes the key. Anything that can change the response must be added as a
/// field; the credential always is, keeping tenants apart.
#[derive(Debug, Clone, Default)]
pub struct CacheKeyBuilder {
    fields: Map<String, Value>,
    provider: Option<String>,
}

impl CacheKeyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider/module identifier.
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        let provider = provider.into();
        self.fields
            .insert("module".into(), Value::String(provider.clone()));
        self.provider = Some(provider);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Spread every top-level field of an object in. Fields already set are
    /// kept, so merged data never shadows an identity field such as the
    /// credential. Non-objects are stored under `name` instead so nothing is
    /// silently dropped.
    pub fn merge(mut self, name: &str, value: Value) -> Self {
        match value {
            Value::Object(map) => {
                for (k, v) in map {
                    self.fields.entry(k).or_insert(v);
                }
            }
            Value::Null => {}
            other => {
                self.fields.insert(name.to_string(), other);
            }
        }
        self
    }

    pub fn build(&self) -> CacheKey {
        let key = CacheKey::new(build_key(&Value::Object(self.fields.clone())));
        match &self.provider {
            Some(p) => key.with_provider(p.clone()),
            None => key,
        }
    }

    /// Key for a chat request: provider, credential, message, options and
    /// interface options. Option maps stay nested under their own names so
    /// passthrough fields cannot collide with the identity fields.
    pub fn for_request(request: &NormalizedRequest) -> CacheKey {
        Self::new()
            .provider(request.provider_id.clone())
            .field("apiKey", credential_value(&request.credential))
            .field("message", request.message.as_key_value())
            .field("options", to_value_or_null(&request.options))
            .field("interfaceOptions", to_value_or_null(&request.interface_options))
            .build()
    }

    pub fn for_embedding(request: &EmbeddingRequest) -> CacheKey {
        Self::new()
            .provider(request.provider_id.clone())
            .field("apiKey", credential_value(&request.credential))
            .field("embedding", request.text.clone())
            .field("options", to_value_or_null(&request.options))
            .field("interfaceOptions", to_value_or_null(&request.interface_options))
            .build()
    }
}

fn credential_value(credential: &crate::types::Credential) -> Value {
    to_value_or_null(credential)
}

fn to_value_or_null<T: Serialize>(v: &T) -> Value {
    serde_json::to_value(v).unwrap_or(Value::Null)
}

/// Hash any JSON value into a 32-char hex key after canonicalization.
pub fn build_key(fields: &Value) -> String {
    let mut canonical = String::new();
    write_canonical(fields, &mut canonical);
    let digest = Sha256::digest(canonical.as_bytes());
    digest[..KEY_BYTES]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn write_canonical(v: &Value, out: &mut String) {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, k) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*k).clone()).to_string());
                out.push(':');
                write_canonical(&map[*k], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
