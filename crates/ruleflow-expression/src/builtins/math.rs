//! Math functions.

use ruleflow_value::Value;

use super::{check_arg_count, int_arg, number_arg};
use crate::error::{ExpressionError, ExpressionResult};

/// Absolute value.
pub fn abs(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("abs", args, 1)?;
    Ok(Value::float(number_arg("abs", args, 0)?.abs()))
}

/// Round to the nearest integer, halves away from zero.
pub fn round(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("round", args, 1)?;
    let value = number_arg("round", args, 0)?;
    Ok(Value::integer(value.round() as i64))
}

/// Ceiling.
pub fn ceil(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("ceil", args, 1)?;
    Ok(Value::float(number_arg("ceil", args, 0)?.ceil()))
}

/// Floor.
pub fn floor(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("floor", args, 1)?;
    Ok(Value::float(number_arg("floor", args, 0)?.floor()))
}

/// Maximum of two numbers.
pub fn max(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("max", args, 2)?;
    let a = number_arg("max", args, 0)?;
    let b = number_arg("max", args, 1)?;
    Ok(Value::float(a.max(b)))
}

/// Minimum of two numbers.
pub fn min(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("min", args, 2)?;
    let a = number_arg("min", args, 0)?;
    let b = number_arg("min", args, 1)?;
    Ok(Value::float(a.min(b)))
}

/// Power.
pub fn pow(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("pow", args, 2)?;
    let base = number_arg("pow", args, 0)?;
    let exponent = number_arg("pow", args, 1)?;
    Ok(Value::float(base.powf(exponent)))
}

/// Square root; negative input is a domain error.
pub fn sqrt(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("sqrt", args, 1)?;
    let value = number_arg("sqrt", args, 0)?;
    if value < 0.0 {
        return Err(ExpressionError::invalid_argument(
            "sqrt",
            "cannot take square root of a negative number",
        ));
    }
    Ok(Value::float(value.sqrt()))
}

/// Round to `decimals` decimal places, halves away from zero. Negative
/// decimal counts are a domain error.
pub fn round_to(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("roundTo", args, 2)?;
    let value = number_arg("roundTo", args, 0)?;
    let decimals = int_arg("roundTo", args, 1)?;
    if decimals < 0 {
        return Err(ExpressionError::invalid_argument(
            "roundTo",
            "decimals cannot be negative",
        ));
    }

    let multiplier = 10f64.powi(decimals as i32);
    Ok(Value::float((value * multiplier).round() / multiplier))
}
