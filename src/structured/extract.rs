//! Locating JSON inside free-form model output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// A fenced block, with or without a language tag. Lazy so the first
/// closing fence ends the block.
static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```[A-Za-z0-9_+.-]*[ \t]*\r?\n?([\s\S]*?)```").expect("fenced block pattern")
});

/// A stray fence marker (opening or closing) with its optional language tag.
static FENCE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```[A-Za-z0-9_+.-]*").expect("fence marker pattern"));

/// Strip markdown code fences.
///
/// When a complete fenced block exists its inner content is returned;
/// otherwise any stray fence markers are removed from the whole string.
pub fn strip_code_fences(text: &str) -> String {
    if let Some(inner) = FENCED_BLOCK.captures(text).and_then(|c| c.get(1)) {
        return inner.as_str().trim().to_string();
    }
    FENCE_MARKER.replace_all(text, "").trim().to_string()
}

/// Walk `text` keeping a stack of `{`/`[` opens. Every time the stack
/// returns to empty, the substring from the outermost open to the current
/// close is parsed; the first one that parses wins.
///
/// Quotes are only tracked inside a candidate, so prose around the JSON can
/// contain unbalanced quotes without derailing the scan.
pub fn scan_balanced(text: &str) -> Option<Value> {
    let mut stack: Vec<char> = Vec::new();
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' if !stack.is_empty() => in_string = true,
            '{' | '[' => {
                if stack.is_empty() {
                    start = idx;
                }
                stack.push(ch);
            }
            '}' | ']' => {
                // closers outside any candidate are prose
                if stack.pop().is_none() {
                    continue;
                }
                if stack.is_empty() {
                    let end = idx + ch.len_utf8();
                    if let Ok(v) = serde_json::from_str::<Value>(&text[start..end]) {
                        return Some(v);
                    }
                }
            }
            _ => {}
        }
    }
    None
}
