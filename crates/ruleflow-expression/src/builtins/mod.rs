//! The `util` builtin namespace.
//!
//! Every evaluation scope can call these through `util.fn(args)` or the
//! colon form `util:fn(args)`. All functions are pure over values: no I/O,
//! no access to host state.

pub mod collection;
pub mod datetime;
pub mod json;
pub mod math;
pub mod misc;
pub mod string;
pub mod types;

use std::collections::HashMap;

use ruleflow_value::Value;

use crate::error::{ExpressionError, ExpressionResult};

/// Signature of a builtin function.
pub type UtilFunction = fn(&[Value]) -> ExpressionResult<Value>;

/// Registry of all `util` functions, keyed by name.
pub struct UtilRegistry {
    functions: HashMap<&'static str, UtilFunction>,
}

impl UtilRegistry {
    /// Create a registry with the full standard function set.
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };

        registry.register_datetime_functions();
        registry.register_math_functions();
        registry.register_collection_functions();
        registry.register_json_functions();
        registry.register_string_functions();
        registry.register_type_functions();
        registry.register_misc_functions();

        registry
    }

    /// Register a function under a name.
    pub fn register(&mut self, name: &'static str, function: UtilFunction) {
        self.functions.insert(name, function);
    }

    /// Call a function by name.
    pub fn call(&self, name: &str, args: &[Value]) -> ExpressionResult<Value> {
        let function = self.functions.get(name).ok_or_else(|| {
            ExpressionError::eval(format!("unknown util function '{}'", name))
        })?;
        function(args)
    }

    /// Whether a function with this name exists.
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    fn register_datetime_functions(&mut self) {
        self.register("now", datetime::now);
        self.register("today", datetime::today);
        self.register("currentDateTime", datetime::current_date_time);
        self.register("currentTimeMillis", datetime::current_time_millis);
        self.register("formatDate", datetime::format_date);
    }

    fn register_math_functions(&mut self) {
        self.register("abs", math::abs);
        self.register("round", math::round);
        self.register("ceil", math::ceil);
        self.register("floor", math::floor);
        self.register("max", math::max);
        self.register("min", math::min);
        self.register("pow", math::pow);
        self.register("sqrt", math::sqrt);
        self.register("roundTo", math::round_to);
    }

    fn register_collection_functions(&mut self) {
        self.register("sumItems", collection::sum_items);
        self.register("sumField", collection::sum_field);
        self.register("avgField", collection::avg_field);
        self.register("countItems", collection::count_items);
        self.register("size", collection::size);
        self.register("first", collection::first);
        self.register("last", collection::last);
    }

    fn register_json_functions(&mut self) {
        self.register("toJson", json::to_json);
        self.register("toPrettyJson", json::to_pretty_json);
        self.register("fromJson", json::from_json);
    }

    fn register_string_functions(&mut self) {
        // isEmpty / isNotEmpty / contains resolve their overloads on the
        // runtime kind of the first argument (string or collection).
        self.register("isEmpty", string::is_empty);
        self.register("isNotEmpty", string::is_not_empty);
        self.register("isBlank", string::is_blank);
        self.register("lower", string::lower);
        self.register("upper", string::upper);
        self.register("trim", string::trim);
        self.register("contains", string::contains);
        self.register("startsWith", string::starts_with);
        self.register("endsWith", string::ends_with);
        self.register("substring", string::substring);
        self.register("replace", string::replace);
    }

    fn register_type_functions(&mut self) {
        self.register("isNull", types::is_null);
        self.register("isNotNull", types::is_not_null);
        self.register("defaultIfNull", types::default_if_null);
        self.register("toDouble", types::to_double);
        self.register("toInt", types::to_int);
    }

    fn register_misc_functions(&mut self) {
        self.register("uuid", misc::uuid);
        self.register("randomInt", misc::random_int);
        self.register("join", misc::join);
        self.register("split", misc::split);
        self.register("coalesce", misc::coalesce);
    }
}

impl Default for UtilRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn check_arg_count(
    function: &str,
    args: &[Value],
    expected: usize,
) -> ExpressionResult<()> {
    if args.len() != expected {
        Err(ExpressionError::invalid_argument(
            function,
            format!("expected {} arguments, got {}", expected, args.len()),
        ))
    } else {
        Ok(())
    }
}

pub(crate) fn number_arg(function: &str, args: &[Value], index: usize) -> ExpressionResult<f64> {
    let arg = args.get(index).ok_or_else(|| {
        ExpressionError::invalid_argument(function, format!("missing argument {}", index + 1))
    })?;
    arg.as_number()
        .ok_or_else(|| ExpressionError::type_error("number", arg.kind().name()))
}

pub(crate) fn int_arg(function: &str, args: &[Value], index: usize) -> ExpressionResult<i64> {
    let arg = args.get(index).ok_or_else(|| {
        ExpressionError::invalid_argument(function, format!("missing argument {}", index + 1))
    })?;
    arg.as_integer()
        .ok_or_else(|| ExpressionError::type_error("integer", arg.kind().name()))
}

pub(crate) fn str_arg<'v>(
    function: &str,
    args: &'v [Value],
    index: usize,
) -> ExpressionResult<&'v str> {
    let arg = args.get(index).ok_or_else(|| {
        ExpressionError::invalid_argument(function, format!("missing argument {}", index + 1))
    })?;
    arg.as_str()
        .ok_or_else(|| ExpressionError::type_error("string", arg.kind().name()))
}
