//! Null handling and lenient numeric coercion.

use ruleflow_value::Value;

use super::check_arg_count;
use crate::error::ExpressionResult;

/// Whether the value is null.
pub fn is_null(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("isNull", args, 1)?;
    Ok(Value::boolean(args[0].is_null()))
}

/// Whether the value is not null.
pub fn is_not_null(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("isNotNull", args, 1)?;
    Ok(Value::boolean(!args[0].is_null()))
}

/// The value itself, or the fallback when the value is null.
pub fn default_if_null(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("defaultIfNull", args, 2)?;
    if args[0].is_null() {
        Ok(args[1].clone())
    } else {
        Ok(args[0].clone())
    }
}

/// Lenient double coercion: numbers pass through, numeric strings parse,
/// everything else (including null and parse failures) is 0.0.
pub fn to_double(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("toDouble", args, 1)?;
    let value = match &args[0] {
        Value::Integer(i) => *i as f64,
        Value::Float(f) => *f,
        Value::Text(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(Value::float(value))
}

/// Lenient integer coercion, analogous to [`to_double`]. Floats truncate.
pub fn to_int(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("toInt", args, 1)?;
    let value = match &args[0] {
        Value::Integer(i) => *i,
        Value::Float(f) => *f as i64,
        Value::Text(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    };
    Ok(Value::integer(value))
}
