//! Typed extraction from dynamic values.

use std::collections::BTreeMap;

use crate::error::ValueError;
use crate::value::Value;

/// Conversion from a dynamic [`Value`] into a concrete Rust type.
///
/// This backs the `getAs`-style accessors on the execution context and the
/// expression engine's typed evaluation: a mismatch yields a
/// [`ValueError::TypeMismatch`] naming both sides.
pub trait FromValue: Sized {
    /// Name of the target type for error messages.
    const EXPECTED: &'static str;

    /// Try to extract `Self` from the value.
    fn from_value(value: Value) -> Result<Self, ValueError>;
}

impl FromValue for Value {
    const EXPECTED: &'static str = "value";

    fn from_value(value: Value) -> Result<Self, ValueError> {
        Ok(value)
    }
}

impl FromValue for bool {
    const EXPECTED: &'static str = "boolean";

    fn from_value(value: Value) -> Result<Self, ValueError> {
        value
            .as_bool()
            .ok_or_else(|| ValueError::mismatch(Self::EXPECTED, value.kind().name()))
    }
}

impl FromValue for i64 {
    const EXPECTED: &'static str = "integer";

    fn from_value(value: Value) -> Result<Self, ValueError> {
        value
            .as_integer()
            .ok_or_else(|| ValueError::mismatch(Self::EXPECTED, value.kind().name()))
    }
}

impl FromValue for f64 {
    const EXPECTED: &'static str = "number";

    fn from_value(value: Value) -> Result<Self, ValueError> {
        value
            .as_number()
            .ok_or_else(|| ValueError::mismatch(Self::EXPECTED, value.kind().name()))
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "string";

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(ValueError::mismatch(Self::EXPECTED, other.kind().name())),
        }
    }
}

impl FromValue for Vec<Value> {
    const EXPECTED: &'static str = "array";

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Array(a) => Ok(a),
            other => Err(ValueError::mismatch(Self::EXPECTED, other.kind().name())),
        }
    }
}

impl FromValue for BTreeMap<String, Value> {
    const EXPECTED: &'static str = "object";

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Object(o) => Ok(o),
            other => Err(ValueError::mismatch(Self::EXPECTED, other.kind().name())),
        }
    }
}
