//! Reading model-supplied argument text.
//!
//! ```rust
//! use mdtooling::{parse_json_object, required_string, required_usize};
//!
//! let args = parse_json_object(r#"{"query":"rust","max_results":2}"#).expect("object should parse");
//! assert_eq!(required_string(&args, "query").expect("query should be present"), "rust");
//! assert_eq!(required_usize(&args, "max_results").expect("count should be present"), 2);
//! ```

use serde_json::{Map, Value};

use crate::ToolError;

pub fn parse_json_value(args_json: &str) -> Result<Value, ToolError> {
    serde_json::from_str(args_json).map_err(|err| {
        ToolError::invalid_arguments(format!("arguments are not valid JSON: {err}"))
    })
}

/// Models sometimes send `""` for a call with no parameters; that reads as `{}`.
pub fn parse_json_object(args_json: &str) -> Result<Map<String, Value>, ToolError> {
    if args_json.trim().is_empty() {
        return Ok(Map::new());
    }

    match parse_json_value(args_json)? {
        Value::Object(map) => Ok(map),
        other => Err(ToolError::invalid_arguments(format!(
            "arguments must be a JSON object, got {}",
            json_type(&other)
        ))),
    }
}

pub fn required_string(args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    match args.get(key) {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(other) => Err(mistyped(key, "a string", other)),
        None => Err(missing(key)),
    }
}

pub fn required_usize(args: &Map<String, Value>, key: &str) -> Result<usize, ToolError> {
    let value = args.get(key).ok_or_else(|| missing(key))?;
    value
        .as_u64()
        .and_then(|count| usize::try_from(count).ok())
        .ok_or_else(|| mistyped(key, "a non-negative integer", value))
}

fn missing(key: &str) -> ToolError {
    ToolError::invalid_arguments(format!("missing required argument '{key}'"))
}

fn mistyped(key: &str, expected: &str, found: &Value) -> ToolError {
    ToolError::invalid_arguments(format!(
        "argument '{key}' must be {expected}, got {}",
        json_type(found)
    ))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
