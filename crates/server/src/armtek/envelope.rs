//! Armtek response envelope handling.
//!
//! Every Armtek web-service answer is wrapped as
//! `{"STATUS": 200, "MESSAGES": [...], "RESP": ...}`. The payload under
//! `RESP` is either a mapping or, for list endpoints, a bare array.

use serde_json::{Map, Value};

use super::ArmtekError;

/// Validate the envelope and return its normalized `RESP` mapping.
///
/// A bare array payload is wrapped as `{"ARRAY": [...]}` so callers can
/// always go through [`extract_array`].
///
/// # Errors
///
/// - `ArmtekError::Status` when `STATUS` is not 200, carrying `MESSAGES`
/// - `ArmtekError::ResponseFormat` when the body is not an object, `STATUS`
///   or `RESP` is missing, or `RESP` is neither an object nor an array
pub fn unwrap_envelope(raw: Value) -> Result<Map<String, Value>, ArmtekError> {
    let Value::Object(mut body) = raw else {
        return Err(ArmtekError::ResponseFormat(
            "response body is not a JSON object".to_string(),
        ));
    };

    let status = body
        .get("STATUS")
        .and_then(status_code)
        .ok_or_else(|| ArmtekError::ResponseFormat("missing STATUS".to_string()))?;

    if status != 200 {
        return Err(ArmtekError::Status {
            status,
            messages: messages(body.get("MESSAGES")),
        });
    }

    match body.remove("RESP") {
        Some(Value::Object(resp)) => Ok(resp),
        Some(Value::Array(items)) => {
            let mut resp = Map::new();
            resp.insert("ARRAY".to_string(), Value::Array(items));
            Ok(resp)
        }
        Some(other) => Err(ArmtekError::ResponseFormat(format!(
            "unexpected RESP type: {}",
            type_name(&other)
        ))),
        None => Err(ArmtekError::ResponseFormat("missing RESP".to_string())),
    }
}

/// Fetch a named list from an unwrapped `RESP`.
///
/// # Errors
///
/// Returns `ArmtekError::ResponseFormat` if the key is absent or not a list.
pub fn extract_array<'a>(
    resp: &'a Map<String, Value>,
    name: &str,
) -> Result<&'a [Value], ArmtekError> {
    match resp.get(name) {
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(ArmtekError::ResponseFormat(format!(
            "RESP.{name} is {}, expected a list",
            type_name(other)
        ))),
        None => Err(ArmtekError::ResponseFormat(format!("missing RESP.{name}"))),
    }
}

/// Fetch `RESP.STRUCTURE`, accepting either a mapping or a list of mappings.
///
/// # Errors
///
/// Returns `ArmtekError::ResponseFormat` when the structure is missing, is
/// an empty list, or its first element is not a mapping.
pub fn extract_structure(resp: &Map<String, Value>) -> Result<&Map<String, Value>, ArmtekError> {
    let structure = match resp.get("STRUCTURE") {
        Some(Value::Array(items)) => items.first().ok_or_else(|| {
            ArmtekError::ResponseFormat("RESP.STRUCTURE is an empty list".to_string())
        })?,
        Some(value) => value,
        None => return Err(ArmtekError::ResponseFormat("missing RESP.STRUCTURE".to_string())),
    };

    structure.as_object().ok_or_else(|| {
        ArmtekError::ResponseFormat(format!(
            "RESP.STRUCTURE is {}, expected a mapping",
            type_name(structure)
        ))
    })
}

fn status_code(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Coerce `MESSAGES` into a list of strings.
///
/// Armtek sends a list of strings or of `{TYPE, TEXT}` objects, and
/// occasionally a lone scalar.
fn messages(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(message_text).collect(),
        Some(other) => message_text(other).into_iter().collect(),
        None => Vec::new(),
    }
}

fn message_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("TEXT")
            .and_then(Value::as_str)
            .map(String::from)
            .or_else(|| Some(value.to_string())),
        other => Some(other.to_string()),
    }
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
