//! The unified value type and its coercion rules.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::kind::ValueKind;

/// A dynamically typed value flowing through a rule execution.
///
/// The scalar and collection variants map one-to-one onto JSON. The temporal
/// variants are produced by the expression language's date/time builtins and
/// serialize as ISO-8601 strings.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent / null value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 string.
    Text(String),
    /// Ordered list of values.
    Array(Vec<Value>),
    /// String-keyed map with deterministic (sorted) key order.
    Object(BTreeMap<String, Value>),
    /// Calendar date without time or zone.
    Date(NaiveDate),
    /// Local date-time without zone.
    DateTime(NaiveDateTime),
    /// Point on the UTC timeline.
    Instant(DateTime<Utc>),
}

impl Value {
    /// Create a null value.
    pub const fn null() -> Self {
        Self::Null
    }

    /// Create a boolean value.
    pub const fn boolean(v: bool) -> Self {
        Self::Bool(v)
    }

    /// Create an integer value.
    pub const fn integer(v: i64) -> Self {
        Self::Integer(v)
    }

    /// Create a float value.
    pub const fn float(v: f64) -> Self {
        Self::Float(v)
    }

    /// Create a text value.
    pub fn text(v: impl Into<String>) -> Self {
        Self::Text(v.into())
    }

    /// Create an array value.
    pub fn array(v: Vec<Value>) -> Self {
        Self::Array(v)
    }

    /// Create an object value.
    pub fn object(v: BTreeMap<String, Value>) -> Self {
        Self::Object(v)
    }

    /// Create an empty object value.
    pub fn object_empty() -> Self {
        Self::Object(BTreeMap::new())
    }

    /// The kind tag of this value, for dispatch and error messages.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::Text(_) => ValueKind::Text,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
            Value::Date(_) => ValueKind::Date,
            Value::DateTime(_) => ValueKind::DateTime,
            Value::Instant(_) => ValueKind::Instant,
        }
    }

    /// Whether this value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Boolean accessor.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer accessor.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Float accessor. Integers widen.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// String slice accessor.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Array accessor.
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Object accessor.
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Numeric view used by arithmetic and comparisons: integers widen to
    /// float, everything else is not a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Whether this value is an integer or float.
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// Truthiness used for guard coercion and the logical operators.
    ///
    /// `Null` is false; booleans are themselves; numbers are truthy iff
    /// non-zero; strings are truthy iff non-empty and not case-insensitively
    /// equal to `"false"`; any other value is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => !s.is_empty() && !s.eq_ignore_ascii_case("false"),
            _ => true,
        }
    }

    /// Equality as seen by the expression language's `==` operator.
    ///
    /// Numbers compare across the integer/float divide (`1 == 1.0`); all
    /// other combinations compare structurally.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }

    /// Number of elements for collection kinds, `None` otherwise.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Array(a) => Some(a.len()),
            Value::Object(o) => Some(o.len()),
            Value::Text(s) => Some(s.chars().count()),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Object(v)
    }
}

impl fmt::Display for Value {
    /// The "default string form": what `+`-concatenation and `util.join`
    /// render. Scalars print bare, temporals print ISO-8601, collections
    /// print as JSON.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.3f")),
            Value::Instant(i) => write!(f, "{}", i.to_rfc3339()),
            Value::Array(_) | Value::Object(_) => {
                let json = serde_json::to_string(self)
                    .unwrap_or_else(|_| String::from("<unprintable>"));
                write!(f, "{}", json)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_null_and_bool() {
        assert!(!Value::Null.is_truthy());
        assert!(Value::boolean(true).is_truthy());
        assert!(!Value::boolean(false).is_truthy());
    }

    #[test]
    fn truthiness_numbers() {
        assert!(Value::integer(1).is_truthy());
        assert!(!Value::integer(0).is_truthy());
        assert!(Value::float(0.5).is_truthy());
        assert!(!Value::float(0.0).is_truthy());
    }

    #[test]
    fn truthiness_strings() {
        assert!(Value::text("yes").is_truthy());
        assert!(!Value::text("").is_truthy());
        assert!(!Value::text("false").is_truthy());
        assert!(!Value::text("FALSE").is_truthy());
        assert!(Value::text("truthy").is_truthy());
    }

    #[test]
    fn truthiness_collections_are_truthy() {
        assert!(Value::array(vec![]).is_truthy());
        assert!(Value::object_empty().is_truthy());
    }

    #[test]
    fn loose_eq_across_numeric_kinds() {
        assert!(Value::integer(1).loose_eq(&Value::float(1.0)));
        assert!(!Value::integer(1).loose_eq(&Value::float(1.5)));
        assert!(Value::text("a").loose_eq(&Value::text("a")));
        assert!(!Value::text("1").loose_eq(&Value::integer(1)));
    }

    #[test]
    fn as_float_widens_integers() {
        assert_eq!(Value::integer(3).as_float(), Some(3.0));
        assert_eq!(Value::float(3.5).as_float(), Some(3.5));
        assert_eq!(Value::text("3").as_float(), None);
    }

    #[test]
    fn display_scalars() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::integer(42).to_string(), "42");
        assert_eq!(Value::boolean(true).to_string(), "true");
        assert_eq!(Value::text("hi").to_string(), "hi");
    }

    #[test]
    fn display_collections_as_json() {
        let v = Value::array(vec![Value::integer(1), Value::text("a")]);
        assert_eq!(v.to_string(), r#"[1,"a"]"#);
    }

    #[test]
    fn kind_names() {
        assert_eq!(Value::Null.kind().name(), "null");
        assert_eq!(Value::integer(1).kind().name(), "integer");
        assert_eq!(Value::object_empty().kind().name(), "object");
    }
}
