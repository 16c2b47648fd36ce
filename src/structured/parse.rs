//! The JSON extraction cascade.

use super::extract::{scan_balanced, strip_code_fences};
use super::repair::{repair_json, selective_unescape};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::borrow::Cow;
use tracing::debug;

/// Input to [`parse_json`]: model text, or a value that is already structured.
#[derive(Debug, Clone)]
pub enum JsonInput<'a> {
    Text(Cow<'a, str>),
    Value(Value),
}

impl<'a> From<&'a str> for JsonInput<'a> {
    fn from(s: &'a str) -> Self {
        JsonInput::Text(Cow::Borrowed(s))
    }
}

impl From<String> for JsonInput<'static> {
    fn from(s: String) -> Self {
        JsonInput::Text(Cow::Owned(s))
    }
}

impl<'a> From<&'a String> for JsonInput<'a> {
    fn from(s: &'a String) -> Self {
        JsonInput::Text(Cow::Borrowed(s.as_str()))
    }
}

/// A JSON string value is treated as text to parse; anything else is
/// already structured.
impl From<Value> for JsonInput<'static> {
    fn from(v: Value) -> Self {
        match v {
            Value::String(s) => JsonInput::Text(Cow::Owned(s)),
            other => JsonInput::Value(other),
        }
    }
}

/// Coerce model output into a JSON value.
///
/// Stages, each tried only if the previous one failed:
///
/// 1. structured input is returned unchanged
/// 2. strict parse
/// 3. code fences are stripped
/// 4. the first brace-balanced substring that parses
/// 5. with `attempt_repair`: structural repair of the original text, with a
///    second try after [`selective_unescape`] if the first one errors
///
/// Text that parses strictly is never repaired. Returns `None` when nothing
/// could be extracted; never panics.
pub fn parse_json<'a>(input: impl Into<JsonInput<'a>>, attempt_repair: bool) -> Option<Value> {
    let text = match input.into() {
        JsonInput::Value(v) => return Some(v),
        JsonInput::Text(t) => t,
    };

    if let Ok(v) = serde_json::from_str::<Value>(&text) {
        return Some(v);
    }

    let preprocessed = strip_code_fences(&text);
    if let Ok(v) = serde_json::from_str::<Value>(&preprocessed) {
        debug!(stage = "fences", "extracted JSON");
        return Some(v);
    }

    if let Some(v) = scan_balanced(&preprocessed) {
        debug!(stage = "brace_scan", "extracted JSON");
        return Some(v);
    }

    if !attempt_repair {
        return None;
    }

    // repair works from the untouched text; it handles fences itself
    let repaired = match repair_json(&text) {
        Ok(r) => r,
        Err(first) => {
            debug!(error = %first, "repair failed, retrying after unescape");
            match repair_json(&selective_unescape(&text)) {
                Ok(r) => r,
                Err(second) => {
                    debug!(error = %second, "repair failed");
                    return None;
                }
            }
        }
    };
    match serde_json::from_str::<Value>(&repaired) {
        Ok(v) => {
            debug!(stage = "repair", "extracted JSON");
            Some(v)
        }
        Err(_) => None,
    }
}

/// [`parse_json`] followed by typed deserialization.
pub fn parse_json_as<'a, T: DeserializeOwned>(
    input: impl Into<JsonInput<'a>>,
    attempt_repair: bool,
) -> Option<T> {
    parse_json(input, attempt_repair).and_then(|v| serde_json::from_value(v).ok())
}
