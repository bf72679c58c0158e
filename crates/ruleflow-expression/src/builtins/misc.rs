//! Identifier, randomness, and joining/splitting helpers.

use rand::Rng;
use ruleflow_value::Value;
use uuid::Uuid;

use super::{check_arg_count, int_arg, str_arg};
use crate::error::{ExpressionError, ExpressionResult};

/// RFC-4122 v4 UUID, lowercase hyphenated.
pub fn uuid(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("uuid", args, 0)?;
    Ok(Value::text(Uuid::new_v4().to_string()))
}

/// Uniform random integer in `[min, max]`, both bounds inclusive.
pub fn random_int(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("randomInt", args, 2)?;
    let min = int_arg("randomInt", args, 0)?;
    let max = int_arg("randomInt", args, 1)?;
    if max < min {
        return Err(ExpressionError::invalid_argument(
            "randomInt",
            format!("max ({}) is less than min ({})", max, min),
        ));
    }
    Ok(Value::integer(rand::thread_rng().gen_range(min..=max)))
}

/// Join collection elements with a delimiter; empty string for null.
pub fn join(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("join", args, 2)?;
    let delimiter = str_arg("join", args, 1)?;
    let joined = match &args[0] {
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(|item| item.to_string())
            .collect::<Vec<_>>()
            .join(delimiter),
        other => return Err(ExpressionError::type_error("array", other.kind().name())),
    };
    Ok(Value::text(joined))
}

/// Split a string on a literal delimiter; empty list for null.
pub fn split(args: &[Value]) -> ExpressionResult<Value> {
    check_arg_count("split", args, 2)?;
    if args[0].is_null() {
        return Ok(Value::array(Vec::new()));
    }
    let s = str_arg("split", args, 0)?;
    let delimiter = str_arg("split", args, 1)?;
    let parts = s.split(delimiter).map(Value::text).collect();
    Ok(Value::Array(parts))
}

/// First non-null argument, or null when all are null.
pub fn coalesce(args: &[Value]) -> ExpressionResult<Value> {
    Ok(args
        .iter()
        .find(|value| !value.is_null())
        .cloned()
        .unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_is_v4_lowercase() {
        let value = uuid(&[]).unwrap();
        let s = value.as_str().unwrap();
        assert_eq!(s.len(), 36);
        assert_eq!(s, s.to_lowercase());
        let parsed = Uuid::parse_str(s).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn random_int_stays_in_inclusive_bounds() {
        for _ in 0..100 {
            let value = random_int(&[Value::integer(1), Value::integer(3)]).unwrap();
            let n = value.as_integer().unwrap();
            assert!((1..=3).contains(&n));
        }
        // Degenerate range is allowed.
        assert_eq!(
            random_int(&[Value::integer(5), Value::integer(5)]).unwrap(),
            Value::integer(5)
        );
    }

    #[test]
    fn random_int_rejects_inverted_range() {
        assert!(random_int(&[Value::integer(3), Value::integer(1)]).is_err());
    }

    #[test]
    fn join_renders_default_string_forms() {
        let items = Value::array(vec![Value::integer(1), Value::text("a"), Value::Null]);
        assert_eq!(
            join(&[items, Value::text(",")]).unwrap(),
            Value::text("1,a,null")
        );
        assert_eq!(join(&[Value::Null, Value::text(",")]).unwrap(), Value::text(""));
    }

    #[test]
    fn split_on_literal_delimiter() {
        let parts = split(&[Value::text("a,b,c"), Value::text(",")]).unwrap();
        assert_eq!(
            parts,
            Value::array(vec![Value::text("a"), Value::text("b"), Value::text("c")])
        );
        assert_eq!(
            split(&[Value::Null, Value::text(",")]).unwrap(),
            Value::array(vec![])
        );
    }

    #[test]
    fn coalesce_first_non_null() {
        assert_eq!(
            coalesce(&[Value::Null, Value::Null, Value::integer(3), Value::integer(4)]).unwrap(),
            Value::integer(3)
        );
        assert_eq!(coalesce(&[Value::Null]).unwrap(), Value::Null);
        assert_eq!(coalesce(&[]).unwrap(), Value::Null);
    }
}
