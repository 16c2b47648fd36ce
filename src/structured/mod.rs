//! 结构化输出模块：从不可靠的模型文本中提取并修复 JSON。
//!
//! # Structured Output Module
//!
//! Turns unreliable model text into structured data. The entry point is
//! [`parse_json`], a cascade that escalates from a strict parse through
//! code-fence stripping and brace-matched scanning to an opt-in structural
//! repair.
//!
//! | Item | Description |
//! |------|-------------|
//! | [`parse_json`] | The full cascade; `None` when nothing could be extracted |
//! | [`parse_json_as`] | Cascade plus typed deserialization |
//! | [`strip_code_fences`] | Markdown fence removal |
//! | [`scan_balanced`] | First brace-balanced substring that parses |
//! | [`repair_json`] | Structural repair of near-valid JSON text |
//! | [`selective_unescape`] | Collapse doubled backslashes, keep escaped quotes |
//!
//! # Examples
//!
//! ```
//! use llm_facade::structured::parse_json;
//! use serde_json::json;
//!
//! assert_eq!(parse_json("```json\n{\"a\":1}\n```", false), Some(json!({"a": 1})));
//! assert_eq!(parse_json("{a: 'b'}", false), None);
//! assert_eq!(parse_json("{a: 'b'}", true), Some(json!({"a": "b"})));
//! ```

pub mod extract;
pub mod parse;
pub mod repair;

pub use extract::{scan_balanced, strip_code_fences};
pub use parse::{parse_json, parse_json_as, JsonInput};
pub use repair::{repair_json, selective_unescape, RepairError};
