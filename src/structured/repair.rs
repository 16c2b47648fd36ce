//! Structural repair of near-valid JSON text.
//!
//! A tolerant recursive-descent reader that accepts what language models
//! tend to emit and writes strict JSON back out. It fixes:
//!
//! - unquoted keys and bare-word string values
//! - single, smart and backtick quotes
//! - trailing, leading and missing commas; missing colons
//! - unbalanced and mismatched brackets, unterminated strings
//! - `//` and `/* */` comments, markdown fence markers
//! - Python-style `True`/`False`/`None`, `undefined`, `NaN`
//! - number forms such as `+1`, `.5`, `2.`
//! - strings wrapped in escaped quotes (`{\"a\": 1}`)
//! - prose before the first `{`/`[` and after a complete container
//!
//! It refuses input it cannot make sense of (invalid escapes, stray
//! punctuation where a value belongs) with a [`RepairError`].

use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Deepest container nesting the repairer will descend into, in line with
/// `serde_json`'s recursion limit.
pub const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepairError {
    #[error("no JSON value found")]
    Empty,
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("invalid escape sequence at position {pos}")]
    InvalidEscape { pos: usize },
    #[error("nesting deeper than {max} levels at position {pos}")]
    TooDeep { max: usize, pos: usize },
}

/// Repair `text` into strict JSON text.
pub fn repair_json(text: &str) -> Result<String, RepairError> {
    let value = Repairer::new(text).run()?;
    // serializing a Value cannot fail: keys are strings, numbers are finite
    Ok(value.to_string())
}

/// Collapse doubled backslashes, leaving any run of backslashes that escapes
/// a quote untouched.
///
/// Used as a second chance when repair fails on text that was escaped one
/// time too many.
pub fn selective_unescape(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '\\' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let run_start = i;
        while i < chars.len() && chars[i] == '\\' {
            i += 1;
        }
        let run = i - run_start;
        let escapes_quote = chars.get(i) == Some(&'"') && run % 2 == 1;
        let keep = if escapes_quote { run } else { (run + 1) / 2 };
        out.extend(std::iter::repeat('\\').take(keep));
    }
    out
}

struct Repairer {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Repairer {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            depth: 0,
        }
    }

    fn run(mut self) -> Result<Value, RepairError> {
        self.skip_noise();
        if self.at_end() {
            return Err(RepairError::Empty);
        }
        self.skip_leading_prose();

        let value = self.parse_value()?;
        let is_container = value.is_object() || value.is_array();

        self.skip_noise();
        while matches!(self.peek(), Some(',') | Some(';')) {
            self.pos += 1;
            self.skip_noise();
        }
        match self.peek() {
            Some(ch) if !is_container => Err(RepairError::UnexpectedChar { ch, pos: self.pos }),
            _ => Ok(value),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, c)| self.peek_at(i) == Some(c))
    }

    /// Whitespace, comments and fence markers.
    fn skip_noise(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => self.pos += 1,
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.pos += 2;
                    while !self.at_end() && !self.starts_with("*/") {
                        self.pos += 1;
                    }
                    self.pos = (self.pos + 2).min(self.chars.len());
                }
                Some('`') if self.starts_with("```") => {
                    self.pos += 3;
                    while matches!(self.peek(), Some(c) if c.is_alphanumeric() || "_+.-".contains(c)) {
                        self.pos += 1;
                    }
                }
                _ => return,
            }
        }
    }

    /// "Here is the JSON: {...}" -> start at the first bracket. Only applies
    /// when the text opens with a word that is not a JSON literal.
    fn skip_leading_prose(&mut self) {
        let Some(first) = self.peek() else { return };
        if !first.is_alphabetic() {
            return;
        }
        let word: String = self.chars[self.pos..]
            .iter()
            .take_while(|c| c.is_alphanumeric())
            .collect();
        if literal(&word).is_some() {
            return;
        }
        if let Some(offset) = self.chars[self.pos..]
            .iter()
            .position(|c| *c == '{' || *c == '[')
        {
            self.pos += offset;
        }
    }

    fn parse_value(&mut self) -> Result<Value, RepairError> {
        self.skip_noise();
        match self.peek() {
            None => Err(RepairError::Empty),
            Some(open @ ('{' | '[')) => {
                if self.depth >= MAX_DEPTH {
                    return Err(RepairError::TooDeep {
                        max: MAX_DEPTH,
                        pos: self.pos,
                    });
                }
                self.depth += 1;
                let container = if open == '{' {
                    self.parse_object()
                } else {
                    self.parse_array()
                };
                self.depth -= 1;
                container
            }
            Some(q) if closing_quote(q).is_some() => self.parse_string().map(Value::String),
            Some('\\') if self.peek_at(1) == Some('"') => {
                self.parse_escaped_string().map(Value::String)
            }
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.parse_number(),
            Some(c) if is_word_char(c) => Ok(self.parse_word()),
            Some(ch) => Err(RepairError::UnexpectedChar { ch, pos: self.pos }),
        }
    }

    fn parse_object(&mut self) -> Result<Value, RepairError> {
        self.pos += 1;
        let mut map = Map::new();
        loop {
            self.skip_noise();
            match self.peek() {
                // unclosed at end of input
                None => return Ok(Value::Object(map)),
                Some('}') | Some(']') => {
                    self.pos += 1;
                    return Ok(Value::Object(map));
                }
                Some(',') => {
                    self.pos += 1;
                    continue;
                }
                _ => {}
            }

            let key = self.parse_key()?;
            self.skip_noise();
            if self.peek() == Some(':') {
                self.pos += 1;
            }
            self.skip_noise();
            let value = match self.peek() {
                None | Some('}') | Some(']') | Some(',') => Value::Null,
                _ => self.parse_value()?,
            };
            map.insert(key, value);
        }
    }

    fn parse_array(&mut self) -> Result<Value, RepairError> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_noise();
            match self.peek() {
                None => return Ok(Value::Array(items)),
                Some(']') => {
                    self.pos += 1;
                    return Ok(Value::Array(items));
                }
                // mismatched closer: leave it for the enclosing object
                Some('}') => return Ok(Value::Array(items)),
                Some(',') => {
                    self.pos += 1;
                    continue;
                }
                _ => items.push(self.parse_value()?),
            }
        }
    }

    fn parse_key(&mut self) -> Result<String, RepairError> {
        match self.peek() {
            Some(q) if closing_quote(q).is_some() => self.parse_string(),
            Some('\\') if self.peek_at(1) == Some('"') => self.parse_escaped_string(),
            Some(c) if is_key_char(c) => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if is_key_char(c)) {
                    self.pos += 1;
                }
                Ok(self.chars[start..self.pos].iter().collect())
            }
            Some(ch) => Err(RepairError::UnexpectedChar { ch, pos: self.pos }),
            None => Err(RepairError::Empty),
        }
    }

    fn parse_string(&mut self) -> Result<String, RepairError> {
        let open = self.chars[self.pos];
        let close = closing_quote(open).unwrap_or(open);
        self.pos += 1;
        let mut out = String::new();
        loop {
            let Some(c) = self.peek() else {
                // unterminated: close at end of input
                return Ok(out);
            };
            self.pos += 1;
            if c == close || (close != '"' && open != '\'' && open != '`' && c == '"') {
                return Ok(out);
            }
            if c == '\\' {
                self.read_escape(&mut out)?;
            } else {
                out.push(c);
            }
        }
    }

    /// `\"text\"`: a string whose quotes were themselves escaped.
    fn parse_escaped_string(&mut self) -> Result<String, RepairError> {
        self.pos += 2;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Ok(out),
                Some('\\') if self.peek_at(1) == Some('"') => {
                    self.pos += 2;
                    return Ok(out);
                }
                Some('\\') => {
                    self.pos += 1;
                    self.read_escape(&mut out)?;
                }
                Some(c) => {
                    self.pos += 1;
                    out.push(c);
                }
            }
        }
    }

    /// Called with `pos` just past a backslash.
    fn read_escape(&mut self, out: &mut String) -> Result<(), RepairError> {
        let at = self.pos.saturating_sub(1);
        let Some(e) = self.peek() else {
            return Ok(());
        };
        self.pos += 1;
        match e {
            '"' | '\\' | '/' | '\'' | '`' => out.push(e),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'u' => {
                let high = self.read_hex4().ok_or(RepairError::InvalidEscape { pos: at })?;
                let ch = if (0xD800..0xDC00).contains(&high) {
                    // surrogate pair
                    if self.peek() == Some('\\') && self.peek_at(1) == Some('u') {
                        self.pos += 2;
                        let low = self.read_hex4().ok_or(RepairError::InvalidEscape { pos: at })?;
                        let code = 0x10000 + ((high - 0xD800) << 10) + (low.wrapping_sub(0xDC00) & 0x3FF);
                        char::from_u32(code)
                    } else {
                        None
                    }
                } else {
                    char::from_u32(high)
                };
                out.push(ch.unwrap_or('\u{FFFD}'));
            }
            _ => return Err(RepairError::InvalidEscape { pos: at }),
        }
        Ok(())
    }

    fn read_hex4(&mut self) -> Option<u32> {
        let hex: String = (0..4).filter_map(|i| self.peek_at(i)).collect();
        if hex.len() != 4 {
            return None;
        }
        let v = u32::from_str_radix(&hex, 16).ok()?;
        self.pos += 4;
        Some(v)
    }

    fn parse_number(&mut self) -> Result<Value, RepairError> {
        let start = self.pos;
        if matches!(self.peek(), Some('-') | Some('+')) {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let save = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some('-') | Some('+')) {
                self.pos += 1;
            }
            if matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.pos += 1;
                }
            } else {
                self.pos = save;
            }
        }

        // "2024-01-01", "3px": not a number after all
        if matches!(self.peek(), Some(c) if is_word_char(c) || c == '-' || c == ':') {
            self.pos = start;
            return Ok(self.parse_unquoted());
        }

        let token: String = self.chars[start..self.pos].iter().collect();
        match normalize_number(&token) {
            Some(n) => Ok(Value::Number(n)),
            None if token.chars().any(|c| c.is_ascii_digit()) => Ok(Value::String(token)),
            None => {
                self.pos = start;
                Err(RepairError::UnexpectedChar {
                    ch: self.chars[start],
                    pos: start,
                })
            }
        }
    }

    /// Literal keyword or bare-word string.
    fn parse_word(&mut self) -> Value {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric()) {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        let save = self.pos;
        self.skip_inline_space();
        let at_delimiter = matches!(self.peek(), None | Some(',') | Some('}') | Some(']') | Some('\n') | Some('\r'));
        self.pos = save;
        match literal(&word) {
            Some(v) if at_delimiter => v,
            _ => {
                self.pos = start;
                self.parse_unquoted()
            }
        }
    }

    /// Bare text up to the next structural delimiter or line break.
    fn parse_unquoted(&mut self) -> Value {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, ',' | '}' | ']' | '\n' | '\r') {
                break;
            }
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        Value::String(text.trim_end().to_string())
    }

    fn skip_inline_space(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.pos += 1;
        }
    }
}

fn closing_quote(open: char) -> Option<char> {
    match open {
        '"' => Some('"'),
        '\'' => Some('\''),
        '`' => Some('`'),
        '\u{201C}' => Some('\u{201D}'),
        '\u{2018}' => Some('\u{2019}'),
        _ => None,
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '-' | '.')
}

fn literal(word: &str) -> Option<Value> {
    match word {
        "true" | "True" => Some(Value::Bool(true)),
        "false" | "False" => Some(Value::Bool(false)),
        "null" | "None" | "undefined" | "NaN" => Some(Value::Null),
        _ => None,
    }
}

fn normalize_number(token: &str) -> Option<Number> {
    let mut t = token.trim_start_matches('+').to_string();
    let negative = t.starts_with('-');
    if negative {
        t.remove(0);
    }
    if t.starts_with('.') {
        t.insert(0, '0');
    }
    if t.ends_with('.') {
        t.push('0');
    }
    if negative {
        t.insert(0, '-');
    }
    if let Ok(Value::Number(n)) = serde_json::from_str::<Value>(&t) {
        return Some(n);
    }
    // leading zeros and the like
    t.parse::<f64>().ok().and_then(Number::from_f64)
}
