//! Strict JSON extraction
//!
//! Model output is parsed exactly; the only cleanup allowed is removing a
//! byte-order mark, surrounding whitespace and a single markdown code fence.
//! Anything else that fails to parse is a shape error for the caller, which
//! keeps the raw text for the user.

use serde_json::Value;
use tracing::debug;

/// Parse a model response as JSON.
///
/// Returns the parser's message on failure so it can be shown alongside the
/// raw response.
pub fn extract_json(raw: &str) -> std::result::Result<Value, String> {
    let cleaned = preprocess(raw);

    if cleaned.is_empty() {
        return Err("empty response".to_string());
    }

    serde_json::from_str::<Value>(&cleaned).map_err(|e| {
        debug!("JSON parse failed: {}", e);
        e.to_string()
    })
}

/// Preprocess raw input
fn preprocess(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('\u{feff}').trim();
    strip_code_fences(trimmed).trim().to_string()
}

/// Strip a markdown code fence (```json ... ``` or ``` ... ```)
fn strip_code_fences(s: &str) -> &str {
    let mut result = s;

    if result.starts_with("```") {
        match result.find('\n') {
            Some(first_newline) => result = &result[first_newline + 1..],
            None => return result.trim_matches('`'),
        }
        if let Some(stripped) = result.trim_end().strip_suffix("```") {
            result = stripped;
        }
    }

    result
}

/// Short description of a JSON value's type for error messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
