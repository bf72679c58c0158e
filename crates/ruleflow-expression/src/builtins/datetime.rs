//! Date and time functions.

use chrono::format::{Item, StrftimeItems};
use chrono::{Local, Utc};

use ruleflow_value::Value;

use super::{check_arg_count, str_arg};
use crate::error::{ExpressionError, ExpressionResult};

/// Current instant on the UTC timeline.
pub fn now(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("now", args, 0)?;
    Ok(Value::Instant(Utc::now()))
}

/// Current calendar date in the system zone.
pub fn today(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("today", args, 0)?;
    Ok(Value::Date(Local::now().date_naive()))
}

/// Current local date-time without zone.
pub fn current_date_time(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("currentDateTime", args, 0)?;
    Ok(Value::DateTime(Local::now().naive_local()))
}

/// Milliseconds since the Unix epoch.
pub fn current_time_millis(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("currentTimeMillis", args, 0)?;
    Ok(Value::integer(Utc::now().timestamp_millis()))
}

/// Format a temporal value with a strftime pattern.
///
/// Instants format in the system zone; local date-times and dates format
/// directly. A null value yields null; any non-temporal value falls back to
/// its default string form.
pub fn format_date(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("formatDate", args, 2)?;

    if args[0].is_null() {
        return Ok(Value::Null);
    }
    let pattern = str_arg("formatDate", args, 1)?;

    let formatted = match &args[0] {
        Value::Instant(instant) => format_with(pattern, |items| {
            instant
                .with_timezone(&Local)
                .format_with_items(items)
                .to_string()
        })?,
        Value::DateTime(dt) => {
            format_with(pattern, |items| dt.format_with_items(items).to_string())?
        }
        Value::Date(date) => {
            format_with(pattern, |items| date.format_with_items(items).to_string())?
        }
        other => other.to_string(),
    };

    Ok(Value::text(formatted))
}

/// Parse a strftime pattern up front so a bad pattern is a clean error
/// instead of a formatting panic.
fn format_with<'p>(
    pattern: &'p str,
    render: impl Fn(std::vec::IntoIter<Item<'p>>) -> String,
) -> ExpressionResult<String> {
    let items: Vec<Item<'p>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(ExpressionError::invalid_argument(
            "formatDate",
            format!("invalid format pattern: {}", pattern),
        ));
    }
    Ok(render(items.into_iter()))
}
