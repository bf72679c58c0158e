//! JSON encode/decode functions.

use ruleflow_value::Value;

use super::{check_arg_count, str_arg};
use crate::error::ExpressionResult;

/// Encode a value as compact JSON. Encoding failures are reported in-band as
/// a JSON error object rather than failing the expression.
pub fn to_json(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("toJson", args, 1)?;
    let json = serde_json::to_string(&args[0])
        .unwrap_or_else(|e| format!(r#"{{"error": "Failed to serialize: {}"}}"#, e));
    Ok(Value::text(json))
}

/// Encode a value as pretty-printed JSON.
pub fn to_pretty_json(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("toPrettyJson", args, 1)?;
    let json = serde_json::to_string_pretty(&args[0])
        .unwrap_or_else(|e| format!(r#"{{"error": "Failed to serialize: {}"}}"#, e));
    Ok(Value::text(json))
}

/// Decode a JSON string; null on blank input or any parse failure.
pub fn from_json(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("fromJson", args, 1)?;
    if args[0].is_null() {
        return Ok(Value::Null);
    }
    let text = str_arg("fromJson", args, 0)?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(text).unwrap_or(Value::Null))
}
