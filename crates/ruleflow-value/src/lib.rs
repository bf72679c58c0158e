//! # ruleflow-value
//!
//! Dynamic value model shared by the ruleflow expression language and the
//! rule execution engine.
//!
//! Rule execution contexts are heterogeneous key/value bags: a variable may
//! hold a number one moment and a list of objects the next. [`Value`] is the
//! tagged sum that models this, together with the coercions the engine is
//! specified against:
//!
//! - truthiness ([`Value::is_truthy`]) used by guard evaluation,
//! - loose numeric equality ([`Value::loose_eq`]) used by `==`/`!=`,
//! - numeric widening ([`Value::as_number`]) used by arithmetic,
//! - typed extraction ([`FromValue`]) used by `getAs`-style accessors.
//!
//! Values serialize to and from plain JSON. Temporal variants render as
//! ISO-8601 strings on the way out; deserialization never produces them, so
//! any value built from the JSON-composable subset round-trips exactly.
//!
//! ```
//! use ruleflow_value::Value;
//!
//! let v = Value::integer(42);
//! assert!(v.is_truthy());
//! assert!(v.loose_eq(&Value::float(42.0)));
//! ```

mod convert;
mod error;
mod kind;
mod serde_impl;
mod value;

pub use convert::FromValue;
pub use error::ValueError;
pub use kind::ValueKind;
pub use value::Value;

/// Convenience alias for fallible value operations.
pub type ValueResult<T> = Result<T, ValueError>;
