//! Collection functions, including the cart-style aggregations.

use ruleflow_value::Value;

use super::{check_arg_count, str_arg};
use crate::error::{ExpressionError, ExpressionResult};

/// Lenient numeric coercion used by the aggregation functions: numbers pass
/// through, numeric strings parse, everything else counts as 0.0.
fn to_double_lenient(value: &Value) -> f64 {
    match value {
        Value::Integer(i) => *i as f64,
        Value::Float(f) => *f,
        Value::Text(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Sum `price * quantity` over a list of item objects. Items missing either
/// field are skipped; a null or empty list sums to 0.0.
pub fn sum_items(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("sumItems", args, 1)?;
    let items = match &args[0] {
        Value::Array(items) => items,
        Value::Null => return Ok(Value::float(0.0)),
        other => return Err(ExpressionError::type_error("array", other.kind().name())),
    };

    let mut total = 0.0;
    for item in items {
        if let Value::Object(entries) = item {
            match (entries.get("price"), entries.get("quantity")) {
                (Some(price), Some(quantity)) if !price.is_null() && !quantity.is_null() => {
                    total += to_double_lenient(price) * to_double_lenient(quantity);
                }
                _ => {}
            }
        }
    }
    Ok(Value::float(total))
}

/// Sum the named field over a list of objects.
pub fn sum_field(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("sumField", args, 2)?;
    let items = match &args[0] {
        Value::Array(items) => items,
        Value::Null => return Ok(Value::float(0.0)),
        other => return Err(ExpressionError::type_error("array", other.kind().name())),
    };
    let field = str_arg("sumField", args, 1)?;

    let mut total = 0.0;
    for item in items {
        if let Value::Object(entries) = item {
            if let Some(value) = entries.get(field) {
                if !value.is_null() {
                    total += to_double_lenient(value);
                }
            }
        }
    }
    Ok(Value::float(total))
}

/// Average of the named field: `sumField / size`, 0.0 for a null or empty
/// list.
pub fn avg_field(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("avgField", args, 2)?;
    let len = match &args[0] {
        Value::Array(items) => items.len(),
        Value::Null => 0,
        other => return Err(ExpressionError::type_error("array", other.kind().name())),
    };
    if len == 0 {
        return Ok(Value::float(0.0));
    }

    let sum = sum_field(args)?;
    let sum = sum.as_float().unwrap_or(0.0);
    Ok(Value::float(sum / len as f64))
}

/// Number of elements; 0 for null.
pub fn count_items(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("countItems", args, 1)?;
    match &args[0] {
        Value::Array(items) => Ok(Value::integer(items.len() as i64)),
        Value::Object(entries) => Ok(Value::integer(entries.len() as i64)),
        Value::Null => Ok(Value::integer(0)),
        other => Err(ExpressionError::type_error(
            "collection",
            other.kind().name(),
        )),
    }
}

/// Collection size; 0 for null.
pub fn size(args: &[Value]) -> ExpressionResult<Value> {
    count_items(args)
}

/// First element of a collection; null when empty or null. Objects yield
/// their first value in key order.
pub fn first(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("first", args, 1)?;
    match &args[0] {
        Value::Array(items) => Ok(items.first().cloned().unwrap_or(Value::Null)),
        Value::Object(entries) => {
            Ok(entries.values().next().cloned().unwrap_or(Value::Null))
        }
        Value::Null => Ok(Value::Null),
        other => Err(ExpressionError::type_error(
            "collection",
            other.kind().name(),
        )),
    }
}

/// Last element of a list; null when empty or null.
pub fn last(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("last", args, 1)?;
    match &args[0] {
        Value::Array(items) => Ok(items.last().cloned().unwrap_or(Value::Null)),
        Value::Null => Ok(Value::Null),
        other => Err(ExpressionError::type_error("array", other.kind().name())),
    }
}
