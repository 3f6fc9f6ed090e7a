//! Strict resource parser.
//!
//! Thin adapter over `serde_json`. Anything that is not a single JSON object,
//! including trailing content after the top-level value, is rejected with the
//! byte offset where parsing stopped.

use crate::error::ParseError;
use crate::i18n::tree::ResourceTree;
use serde_json::{Map, Value};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Parse raw bytes into a JSON object, keeping the original scalar types.
pub fn parse_document(bytes: &[u8]) -> Result<Map<String, Value>, ParseError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ParseError {
            offset: 0,
            message: "top-level value must be an object".to_string(),
        }),
        Err(e) => Err(ParseError {
            offset: byte_offset(bytes, e.line(), e.column()),
            message: e.to_string(),
        }),
    }
}

/// Parse raw bytes into a resource tree.
pub fn parse(bytes: &[u8]) -> Result<ResourceTree, ParseError> {
    parse_document(bytes).map(|map| {
        ResourceTree::from_json(Value::Object(map)).unwrap_or_default()
    })
}

/// Convert serde_json's 1-based line/column into a byte offset.
fn byte_offset(bytes: &[u8], line: usize, column: usize) -> usize {
    let line_start = if line <= 1 {
        0
    } else {
        bytes
            .iter()
            .enumerate()
            .filter(|(_, b)| **b == b'\n')
            .nth(line - 2)
            .map(|(index, _)| index + 1)
            .unwrap_or(0)
    };

    (line_start + column.saturating_sub(1)).min(bytes.len())
}
