//! String functions. `isEmpty`, `isNotEmpty`, and `contains` also carry the
//! collection overloads, resolved on the runtime kind of the first argument.

use ruleflow_value::Value;

use super::{check_arg_count, int_arg, str_arg};
use crate::error::{ExpressionError, ExpressionResult};

/// Whether a string or collection is empty. Null is empty.
pub fn is_empty(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("isEmpty", args, 1)?;
    let empty = match &args[0] {
        Value::Null => true,
        Value::Text(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(entries) => entries.is_empty(),
        other => {
            return Err(ExpressionError::type_error(
                "string or collection",
                other.kind().name(),
            ));
        }
    };
    Ok(Value::boolean(empty))
}

/// Negation of [`is_empty`].
pub fn is_not_empty(args: &[Value]) -> ExpressionResult<Value> {
    let empty = is_empty(args)?;
    Ok(Value::boolean(!empty.as_bool().unwrap_or(false)))
}

/// Whether a string is null, empty, or whitespace-only.
pub fn is_blank(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("isBlank", args, 1)?;
    let blank = match &args[0] {
        Value::Null => true,
        Value::Text(s) => s.trim().is_empty(),
        other => return Err(ExpressionError::type_error("string", other.kind().name())),
    };
    Ok(Value::boolean(blank))
}

/// Lowercase; null-safe.
pub fn lower(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("lower", args, 1)?;
    transform(args, "lower", |s| s.to_lowercase())
}

/// Uppercase; null-safe.
pub fn upper(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("upper", args, 1)?;
    transform(args, "upper", |s| s.to_uppercase())
}

/// Trim surrounding whitespace; null-safe.
pub fn trim(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("trim", args, 1)?;
    transform(args, "trim", |s| s.trim().to_owned())
}

fn transform(
    args: &[Value],
    function: &str,
    apply: impl Fn(&str) -> String,
) -> ExpressionResult<Value> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::Text(s) => Ok(Value::text(apply(s))),
        other => Err(ExpressionError::type_error("string", other.kind().name())),
    }
}

/// Substring / element containment, by runtime kind. Null inputs are false.
pub fn contains(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("contains", args, 2)?;
    let result = match (&args[0], &args[1]) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Text(s), needle) => match needle.as_str() {
            Some(needle) => s.contains(needle),
            None => false,
        },
        (Value::Array(items), needle) => items.iter().any(|item| item.loose_eq(needle)),
        (other, _) => {
            return Err(ExpressionError::type_error(
                "string or collection",
                other.kind().name(),
            ));
        }
    };
    Ok(Value::boolean(result))
}

/// Prefix test; null inputs are false.
pub fn starts_with(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("startsWith", args, 2)?;
    affix_test(args, |s, affix| s.starts_with(affix))
}

/// Suffix test; null inputs are false.
pub fn ends_with(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("endsWith", args, 2)?;
    affix_test(args, |s, affix| s.ends_with(affix))
}

fn affix_test(args: &[Value], test: impl Fn(&str, &str) -> bool) -> ExpressionResult<Value> {
    let result = match (args[0].as_str(), args[1].as_str()) {
        (Some(s), Some(affix)) => test(s, affix),
        _ => false,
    };
    Ok(Value::boolean(result))
}

/// Character-index substring `[start, end)`; null-safe, out-of-range is a
/// domain error.
pub fn substring(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("substring", args, 3)?;
    if args[0].is_null() {
        return Ok(Value::Null);
    }
    let s = str_arg("substring", args, 0)?;
    let start = int_arg("substring", args, 1)?;
    let end = int_arg("substring", args, 2)?;

    let chars: Vec<char> = s.chars().collect();
    if start < 0 || end < start || end as usize > chars.len() {
        return Err(ExpressionError::invalid_argument(
            "substring",
            format!(
                "range {}..{} out of bounds for length {}",
                start,
                end,
                chars.len()
            ),
        ));
    }
    Ok(Value::text(
        chars[start as usize..end as usize].iter().collect::<String>(),
    ))
}

/// Literal replacement of all occurrences; null-safe.
pub fn replace(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("replace", args, 3)?;
    if args[0].is_null() {
        return Ok(Value::Null);
    }
    let s = str_arg("replace", args, 0)?;
    let target = str_arg("replace", args, 1)?;
    let replacement = str_arg("replace", args, 2)?;
    Ok(Value::text(s.replace(target, replacement)))
}
