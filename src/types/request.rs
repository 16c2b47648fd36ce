//! The per-call request value the orchestrator works from.

use super::message::Message;
use super::options::{InterfaceOptions, RequestOptions};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// Provider credential: a single API key, or a pair for providers that need
/// two secrets (key + secret, account id + token, ...).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Credential {
    Key(String),
    Pair(String, String),
}

impl Credential {
    pub fn is_empty(&self) -> bool {
        match self {
            Credential::Key(k) => k.trim().is_empty(),
            Credential::Pair(a, b) => a.trim().is_empty() || b.trim().is_empty(),
        }
    }

    /// Primary secret (the key, or the first half of a pair).
    pub fn primary(&self) -> &str {
        match self {
            Credential::Key(k) => k,
            Credential::Pair(a, _) => a,
        }
    }

    pub fn secondary(&self) -> Option<&str> {
        match self {
            Credential::Key(_) => None,
            Credential::Pair(_, b) => Some(b),
        }
    }

    /// Short stable digest used to pool adapter instances without keeping the
    /// raw secret in map keys or logs.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        match self {
            Credential::Key(k) => hasher.update(k.as_bytes()),
            Credential::Pair(a, b) => {
                hasher.update(a.as_bytes());
                hasher.update([0u8]);
                hasher.update(b.as_bytes());
            }
        }
        hasher.finalize()[..8]
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

// Never print secrets.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Key(_) => write!(f, "Credential::Key({})", self.fingerprint()),
            Credential::Pair(_, _) => write!(f, "Credential::Pair({})", self.fingerprint()),
        }
    }
}

impl From<&str> for Credential {
    fn from(s: &str) -> Self {
        Credential::Key(s.to_string())
    }
}

impl From<String> for Credential {
    fn from(s: String) -> Self {
        Credential::Key(s)
    }
}

impl From<(&str, &str)> for Credential {
    fn from((a, b): (&str, &str)) -> Self {
        Credential::Pair(a.to_string(), b.to_string())
    }
}

impl From<(String, String)> for Credential {
    fn from((a, b): (String, String)) -> Self {
        Credential::Pair(a, b)
    }
}

/// What the caller wants to say: a bare prompt or a ready-made message object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageInput {
    Text(String),
    Object(Value),
}

impl MessageInput {
    /// Object form handed to adapters. Text becomes a single user turn.
    pub fn to_message_object(&self) -> Value {
        match self {
            MessageInput::Text(text) => json!({ "messages": [Message::user(text.as_str())] }),
            MessageInput::Object(v) => v.clone(),
        }
    }

    /// Value used for cache key derivation.
    pub fn as_key_value(&self) -> Value {
        match self {
            MessageInput::Text(text) => Value::String(text.clone()),
            MessageInput::Object(v) => v.clone(),
        }
    }
}

impl From<&str> for MessageInput {
    fn from(s: &str) -> Self {
        MessageInput::Text(s.to_string())
    }
}

impl From<String> for MessageInput {
    fn from(s: String) -> Self {
        MessageInput::Text(s)
    }
}

/// A whole conversation, sent as `{"messages": [...]}`.
impl From<Vec<Message>> for MessageInput {
    fn from(messages: Vec<Message>) -> Self {
        MessageInput::Object(json!({ "messages": messages }))
    }
}

impl From<Value> for MessageInput {
    fn from(v: Value) -> Self {
        match v {
            Value::String(s) => MessageInput::Text(s),
            other => MessageInput::Object(other),
        }
    }
}

/// One chat call through the facade. Built per call, never persisted.
#[derive(Debug, Clone)]
pub struct NormalizedRequest {
    pub provider_id: String,
    pub credential: Credential,
    pub message: MessageInput,
    pub options: RequestOptions,
    pub interface_options: InterfaceOptions,
}

impl NormalizedRequest {
    pub fn new(
        provider_id: impl Into<String>,
        credential: impl Into<Credential>,
        message: impl Into<MessageInput>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            credential: credential.into(),
            message: message.into(),
            options: RequestOptions::default(),
            interface_options: InterfaceOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_interface_options(mut self, interface_options: InterfaceOptions) -> Self {
        self.interface_options = interface_options;
        self
    }
}

/// One embeddings call through the facade.
#[derive(Debug, Clone)]
pub struct EmbeddingRequest {
    pub provider_id: String,
    pub credential: Credential,
    pub text: String,
    pub options: RequestOptions,
    pub interface_options: InterfaceOptions,
}

impl EmbeddingRequest {
    pub fn new(
        provider_id: impl Into<String>,
        credential: impl Into<Credential>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            credential: credential.into(),
            text: text.into(),
            options: RequestOptions::default(),
            interface_options: InterfaceOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_interface_options(mut self, interface_options: InterfaceOptions) -> Self {
        self.interface_options = interface_options;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_message_becomes_single_user_turn() {
        let input = MessageInput::from("hi");
        assert_eq!(
            input.to_message_object(),
            json!({"messages": [{"role": "user", "content": "hi"}]})
        );
    }

    #[test]
    fn credential_debug_hides_secret() {
        let cred = Credential::from("sk-very-secret");
        let rendered = format!("{:?}", cred);
        assert!(!rendered.contains("sk-very-secret"));
        assert_eq!(cred.fingerprint().len(), 16);
    }

    #[test]
    fn pair_fingerprint_differs_from_concatenated_key() {
        let pair = Credential::from(("ab", "c"));
        let key = Credential::from("abc");
        assert_ne!(pair.fingerprint(), key.fingerprint());
        assert!(Credential::from(("a", " ")).is_empty());
    }
}
