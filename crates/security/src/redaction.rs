//! Output redaction: reduce a tool result to an allowlisted subset.
//!
//! Only top-level keys are filtered. Nested values under an allowed key
//! pass through as-is.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RedactionError {
    /// Allowlist filtering needs an object; anything else is refused.
    #[error("expected an object for top-level redaction, got {0}")]
    NotAnObject(&'static str),
}

/// Keep only the allowlisted top-level keys of `value`.
pub fn redact_top_level(value: &Value, allowlist: &[String]) -> Result<Value, RedactionError> {
    let Value::Object(fields) = value else {
        return Err(RedactionError::NotAnObject(json_kind(value)));
    };

    let kept: Map<String, Value> = fields
        .iter()
        .filter(|(key, _)| allowlist.iter().any(|allowed| allowed == *key))
        .map(|(key, v)| (key.clone(), v.clone()))
        .collect();

    Ok(Value::Object(kept))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
