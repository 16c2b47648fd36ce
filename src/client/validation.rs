//! 请求校验：在任何网络调用之前拒绝格式错误的消息与缺失的凭据。
//!
//! Request validation.

use crate::types::{Credential, MessageInput};
use crate::{Error, ErrorContext, Result};
use serde_json::Value;

/// A message is a non-empty string, or an object that is either a non-empty
/// `{"messages": [..]}` envelope or any other non-empty object.
pub(crate) fn validate_message(message: &MessageInput) -> Result<()> {
    match message {
        MessageInput::Text(text) if text.trim().is_empty() => Err(invalid(
            "message must not be empty",
            "message",
        )),
        MessageInput::Text(_) => Ok(()),
        MessageInput::Object(Value::Object(map)) => {
            if map.is_empty() {
                return Err(invalid("message object must not be empty", "message"));
            }
            match map.get("messages") {
                None => Ok(()),
                Some(Value::Array(items)) if items.is_empty() => Err(invalid(
                    "messages must contain at least one entry",
                    "message.messages",
                )),
                Some(Value::Array(items)) => {
                    if let Some(idx) = items.iter().position(|m| !m.is_object()) {
                        return Err(invalid(
                            "every entry in messages must be an object",
                            &format!("message.messages[{}]", idx),
                        ));
                    }
                    Ok(())
                }
                Some(_) => Err(invalid("messages must be an array", "message.messages")),
            }
        }
        MessageInput::Object(_) => Err(invalid(
            "message must be a string or an object",
            "message",
        )),
    }
}

pub(crate) fn validate_embedding_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(invalid("embedding text must not be empty", "text"));
    }
    Ok(())
}

/// Fail fast on a missing or blank credential.
pub(crate) fn validate_credential(provider_id: &str, credential: &Credential) -> Result<()> {
    if credential.is_empty() {
        return Err(Error::configuration_with_context(
            format!("Missing API key for provider {}", provider_id),
            ErrorContext::new()
                .with_field_path("credential")
                .with_source("credential_validator"),
        ));
    }
    Ok(())
}

fn invalid(msg: &str, field: &str) -> Error {
    Error::validation_with_context(
        msg,
        ErrorContext::new()
            .with_field_path(field)
            .with_source("message_validator"),
    )
}
