//! Tree-walking evaluator for parsed programs.

use std::collections::BTreeMap;
use std::sync::Arc;

use ruleflow_value::Value;

use crate::builtins::UtilRegistry;
use crate::context::EvaluationContext;
use crate::core::ast::{BinaryOp, Expr, Program, Stmt};
use crate::error::{ExpressionError, ExpressionResult};

/// Maximum recursion depth for expression evaluation.
const MAX_RECURSION_DEPTH: usize = 256;

/// Evaluator for expression ASTs.
///
/// Stateless apart from the shared builtin registry; cheap to clone.
#[derive(Clone)]
pub struct Evaluator {
    util: Arc<UtilRegistry>,
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator").finish()
    }
}

impl Evaluator {
    /// Create an evaluator over the given builtin registry.
    pub fn new(util: Arc<UtilRegistry>) -> Self {
        Self { util }
    }

    /// Run a program to completion and return its result value.
    ///
    /// The result of a program is the value of the last statement evaluated:
    /// an expression's value, an assignment's assigned value, or the last
    /// body value of a loop's final iteration.
    pub fn run(
        &self,
        program: &Program,
        ctx: &mut EvaluationContext,
    ) -> ExpressionResult<Value> {
        let mut last = Value::Null;
        for stmt in &program.statements {
            if ctx.is_cancelled() {
                return Err(ExpressionError::eval("expression evaluation cancelled"));
            }
            last = self.exec_stmt(stmt, ctx, 0)?;
        }
        Ok(last)
    }

    fn exec_stmt(
        &self,
        stmt: &Stmt,
        ctx: &mut EvaluationContext,
        depth: usize,
    ) -> ExpressionResult<Value> {
        self.check_depth(depth)?;
        match stmt {
            Stmt::Expr(expr) => self.eval(expr, ctx, depth + 1),
            Stmt::Assign { name, value } => {
                let value = self.eval(value, ctx, depth + 1)?;
                ctx.set(name.as_ref(), value.clone());
                Ok(value)
            }
            Stmt::For {
                var,
                iterable,
                body,
            } => {
                let iterable = self.eval(iterable, ctx, depth + 1)?;
                let items: Vec<Value> = match iterable {
                    Value::Array(items) => items,
                    Value::Object(entries) => entries.into_values().collect(),
                    Value::Null => Vec::new(),
                    other => {
                        return Err(ExpressionError::type_error(
                            "array or object",
                            other.kind().name(),
                        ));
                    }
                };

                let mut last = Value::Null;
                for item in items {
                    if ctx.is_cancelled() {
                        return Err(ExpressionError::eval("expression evaluation cancelled"));
                    }
                    ctx.set(var.as_ref(), item);
                    for stmt in body {
                        last = self.exec_stmt(stmt, ctx, depth + 1)?;
                    }
                }
                Ok(last)
            }
        }
    }

    /// Evaluate a single expression.
    pub fn eval(
        &self,
        expr: &Expr,
        ctx: &EvaluationContext,
        depth: usize,
    ) -> ExpressionResult<Value> {
        self.check_depth(depth)?;
        match expr {
            Expr::Literal(value) => Ok(value.clone()),

            // Unresolved identifiers evaluate to null so guards can probe
            // variables that earlier conditional actions may have skipped.
            Expr::Identifier(name) => Ok(ctx.get(name).cloned().unwrap_or(Value::Null)),

            Expr::Not(inner) => {
                let value = self.eval(inner, ctx, depth + 1)?;
                Ok(Value::boolean(!value.is_truthy()))
            }

            Expr::Negate(inner) => {
                let value = self.eval(inner, ctx, depth + 1)?;
                match value {
                    Value::Integer(i) => i
                        .checked_neg()
                        .map(Value::integer)
                        .ok_or_else(|| ExpressionError::eval("integer overflow in negation")),
                    Value::Float(f) => Ok(Value::float(-f)),
                    other => Err(ExpressionError::type_error("number", other.kind().name())),
                }
            }

            Expr::Binary { left, op, right } => self.eval_binary(*op, left, right, ctx, depth),

            Expr::Property { object, name } => {
                let object = self.eval(object, ctx, depth + 1)?;
                self.access_property(&object, name)
            }

            Expr::Index { object, index } => {
                let object = self.eval(object, ctx, depth + 1)?;
                let index = self.eval(index, ctx, depth + 1)?;
                self.access_index(&object, &index)
            }

            Expr::Ternary {
                condition,
                then_expr,
                else_expr,
            } => {
                let condition = self.eval(condition, ctx, depth + 1)?;
                if condition.is_truthy() {
                    self.eval(then_expr, ctx, depth + 1)
                } else {
                    self.eval(else_expr, ctx, depth + 1)
                }
            }

            Expr::MethodCall {
                object,
                method,
                args,
            } => {
                // `util` wins over any same-named variable, mirroring how the
                // namespace is bound into every evaluation scope.
                if matches!(&**object, Expr::Identifier(name) if name.as_ref() == "util") {
                    let args = self.eval_args(args, ctx, depth)?;
                    return self.util.call(method, &args);
                }

                let receiver = self.eval(object, ctx, depth + 1)?;
                let args = self.eval_args(args, ctx, depth)?;
                self.call_method(&receiver, method, &args)
            }

            Expr::NamespaceCall {
                namespace,
                function,
                args,
            } => {
                if namespace.as_ref() != "util" {
                    return Err(ExpressionError::eval(format!(
                        "unknown namespace '{}'",
                        namespace
                    )));
                }
                let args = self.eval_args(args, ctx, depth)?;
                self.util.call(function, &args)
            }

            Expr::FunctionCall { name, args: _ } => Err(ExpressionError::eval(format!(
                "unknown function '{}'; functions are provided on the util namespace \
                 (util.{}(...))",
                name, name
            ))),

            Expr::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.eval(element, ctx, depth + 1)?);
                }
                Ok(Value::Array(values))
            }

            Expr::Object(pairs) => {
                let mut object = BTreeMap::new();
                for (key, value) in pairs {
                    object.insert(key.to_string(), self.eval(value, ctx, depth + 1)?);
                }
                Ok(Value::Object(object))
            }
        }
    }

    fn eval_args(
        &self,
        args: &[Expr],
        ctx: &EvaluationContext,
        depth: usize,
    ) -> ExpressionResult<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, ctx, depth + 1)?);
        }
        Ok(values)
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        ctx: &EvaluationContext,
        depth: usize,
    ) -> ExpressionResult<Value> {
        // Logical operators short-circuit.
        match op {
            BinaryOp::And => {
                let left = self.eval(left, ctx, depth + 1)?;
                if !left.is_truthy() {
                    return Ok(Value::boolean(false));
                }
                let right = self.eval(right, ctx, depth + 1)?;
                return Ok(Value::boolean(right.is_truthy()));
            }
            BinaryOp::Or => {
                let left = self.eval(left, ctx, depth + 1)?;
                if left.is_truthy() {
                    return Ok(Value::boolean(true));
                }
                let right = self.eval(right, ctx, depth + 1)?;
                return Ok(Value::boolean(right.is_truthy()));
            }
            _ => {}
        }

        let left = self.eval(left, ctx, depth + 1)?;
        let right = self.eval(right, ctx, depth + 1)?;

        match op {
            BinaryOp::Add => add(&left, &right),
            BinaryOp::Subtract => numeric_op(&left, &right, "-", |a, b| a - b, i64::checked_sub),
            BinaryOp::Multiply => numeric_op(&left, &right, "*", |a, b| a * b, i64::checked_mul),
            BinaryOp::Divide => divide(&left, &right),
            BinaryOp::Modulo => modulo(&left, &right),
            BinaryOp::Equal => Ok(Value::boolean(left.loose_eq(&right))),
            BinaryOp::NotEqual => Ok(Value::boolean(!left.loose_eq(&right))),
            BinaryOp::LessThan => compare(&left, &right, |o| o == std::cmp::Ordering::Less),
            BinaryOp::GreaterThan => compare(&left, &right, |o| o == std::cmp::Ordering::Greater),
            BinaryOp::LessEqual => compare(&left, &right, |o| o != std::cmp::Ordering::Greater),
            BinaryOp::GreaterEqual => compare(&left, &right, |o| o != std::cmp::Ordering::Less),
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    fn access_property(&self, object: &Value, name: &str) -> ExpressionResult<Value> {
        match object {
            Value::Object(entries) => Ok(entries.get(name).cloned().unwrap_or(Value::Null)),
            // Null-safe chaining: a missing intermediate yields null rather
            // than failing the whole guard.
            Value::Null => Ok(Value::Null),
            other => Err(ExpressionError::type_error("object", other.kind().name())),
        }
    }

    fn access_index(&self, object: &Value, index: &Value) -> ExpressionResult<Value> {
        match object {
            Value::Array(items) => {
                let idx = index.as_integer().ok_or_else(|| {
                    ExpressionError::type_error("integer index", index.kind().name())
                })?;
                let len = items.len() as i64;
                let actual = if idx < 0 { len + idx } else { idx };
                if actual < 0 || actual >= len {
                    return Err(ExpressionError::eval(format!(
                        "index {} out of bounds (length {})",
                        idx, len
                    )));
                }
                Ok(items[actual as usize].clone())
            }
            Value::Object(entries) => {
                let key = index.as_str().ok_or_else(|| {
                    ExpressionError::type_error("string key", index.kind().name())
                })?;
                Ok(entries.get(key).cloned().unwrap_or(Value::Null))
            }
            Value::Null => Ok(Value::Null),
            other => Err(ExpressionError::type_error(
                "array or object",
                other.kind().name(),
            )),
        }
    }

    /// Method dispatch against the fixed allowlist. A null receiver yields
    /// null so property chains stay null-safe end to end.
    fn call_method(&self, receiver: &Value, method: &str, args: &[Value]) -> ExpressionResult<Value> {
        if receiver.is_null() {
            return Ok(Value::Null);
        }

        match (method, receiver) {
            ("length" | "size", v) => v
                .len()
                .map(|n| Value::integer(n as i64))
                .ok_or_else(|| ExpressionError::type_error("string or collection", v.kind().name())),

            ("isEmpty", v) => v
                .len()
                .map(|n| Value::boolean(n == 0))
                .ok_or_else(|| ExpressionError::type_error("string or collection", v.kind().name())),

            ("contains", Value::Text(s)) => {
                let needle = require_str(method, args, 0)?;
                Ok(Value::boolean(s.contains(needle)))
            }
            ("contains", Value::Array(items)) => {
                let needle = require_arg(method, args, 0)?;
                Ok(Value::boolean(items.iter().any(|i| i.loose_eq(needle))))
            }
            ("contains", Value::Object(entries)) => {
                let key = require_str(method, args, 0)?;
                Ok(Value::boolean(entries.contains_key(key)))
            }

            ("startsWith", Value::Text(s)) => {
                Ok(Value::boolean(s.starts_with(require_str(method, args, 0)?)))
            }
            ("endsWith", Value::Text(s)) => {
                Ok(Value::boolean(s.ends_with(require_str(method, args, 0)?)))
            }
            ("trim", Value::Text(s)) => Ok(Value::text(s.trim())),
            ("toLowerCase", Value::Text(s)) => Ok(Value::text(s.to_lowercase())),
            ("toUpperCase", Value::Text(s)) => Ok(Value::text(s.to_uppercase())),
            ("substring", Value::Text(s)) => {
                let start = require_int(method, args, 0)?;
                let end = require_int(method, args, 1)?;
                let chars: Vec<char> = s.chars().collect();
                if start < 0 || end < start || end as usize > chars.len() {
                    return Err(ExpressionError::invalid_argument(
                        "substring",
                        format!("range {}..{} out of bounds for length {}", start, end, chars.len()),
                    ));
                }
                Ok(Value::text(
                    chars[start as usize..end as usize].iter().collect::<String>(),
                ))
            }

            ("keys", Value::Object(entries)) => Ok(Value::Array(
                entries.keys().map(|k| Value::text(k.clone())).collect(),
            )),
            ("values", Value::Object(entries)) => {
                Ok(Value::Array(entries.values().cloned().collect()))
            }
            ("get", Value::Object(entries)) => {
                let key = require_str(method, args, 0)?;
                Ok(entries.get(key).cloned().unwrap_or(Value::Null))
            }
            ("get", Value::Array(items)) => {
                let idx = require_int(method, args, 0)?;
                Ok(items.get(idx.max(0) as usize).cloned().unwrap_or(Value::Null))
            }

            ("first", Value::Array(items)) => Ok(items.first().cloned().unwrap_or(Value::Null)),
            ("last", Value::Array(items)) => Ok(items.last().cloned().unwrap_or(Value::Null)),

            ("toString", v) => Ok(Value::text(v.to_string())),

            (_, v) => Err(ExpressionError::eval(format!(
                "unknown method '{}' on {}",
                method,
                v.kind().name()
            ))),
        }
    }

    fn check_depth(&self, depth: usize) -> ExpressionResult<()> {
        if depth > MAX_RECURSION_DEPTH {
            return Err(ExpressionError::eval(format!(
                "maximum evaluation depth ({}) exceeded",
                MAX_RECURSION_DEPTH
            )));
        }
        Ok(())
    }
}

fn require_arg<'v>(function: &str, args: &'v [Value], index: usize) -> ExpressionResult<&'v Value> {
    args.get(index).ok_or_else(|| {
        ExpressionError::invalid_argument(function, format!("missing argument {}", index + 1))
    })
}

fn require_str<'v>(function: &str, args: &'v [Value], index: usize) -> ExpressionResult<&'v str> {
    let arg = require_arg(function, args, index)?;
    arg.as_str()
        .ok_or_else(|| ExpressionError::type_error("string", arg.kind().name()))
}

fn require_int(function: &str, args: &[Value], index: usize) -> ExpressionResult<i64> {
    let arg = require_arg(function, args, index)?;
    arg.as_integer()
        .ok_or_else(|| ExpressionError::type_error("integer", arg.kind().name()))
}

fn add(left: &Value, right: &Value) -> ExpressionResult<Value> {
    // A string operand on either side turns + into concatenation of both
    // operands' default string forms.
    if matches!(left, Value::Text(_)) || matches!(right, Value::Text(_)) {
        return Ok(Value::text(format!("{}{}", left, right)));
    }
    numeric_op(left, right, "+", |a, b| a + b, i64::checked_add)
}

fn numeric_op(
    left: &Value,
    right: &Value,
    symbol: &str,
    float_op: fn(f64, f64) -> f64,
    int_op: fn(i64, i64) -> Option<i64>,
) -> ExpressionResult<Value> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => int_op(*a, *b).map(Value::integer).ok_or_else(|| {
            ExpressionError::eval(format!("integer overflow: {} {} {}", a, symbol, b))
        }),
        _ => {
            let (a, b) = numeric_operands(left, right, symbol)?;
            Ok(Value::float(float_op(a, b)))
        }
    }
}

fn divide(left: &Value, right: &Value) -> ExpressionResult<Value> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => {
            if *b == 0 {
                return Err(ExpressionError::eval("division by zero"));
            }
            a.checked_div(*b).map(Value::integer).ok_or_else(|| {
                ExpressionError::eval(format!("integer overflow: {} / {}", a, b))
            })
        }
        _ => {
            let (a, b) = numeric_operands(left, right, "/")?;
            if b == 0.0 {
                return Err(ExpressionError::eval("division by zero"));
            }
            Ok(Value::float(a / b))
        }
    }
}

fn modulo(left: &Value, right: &Value) -> ExpressionResult<Value> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => {
            if *b == 0 {
                return Err(ExpressionError::eval("division by zero"));
            }
            Ok(Value::integer(a % b))
        }
        _ => {
            let (a, b) = numeric_operands(left, right, "%")?;
            if b == 0.0 {
                return Err(ExpressionError::eval("division by zero"));
            }
            Ok(Value::float(a % b))
        }
    }
}

fn numeric_operands(left: &Value, right: &Value, symbol: &str) -> ExpressionResult<(f64, f64)> {
    match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(ExpressionError::eval(format!(
            "cannot apply '{}' to {} and {}",
            symbol,
            left.kind().name(),
            right.kind().name()
        ))),
    }
}

fn compare(
    left: &Value,
    right: &Value,
    accept: fn(std::cmp::Ordering) -> bool,
) -> ExpressionResult<Value> {
    let ordering = match (left, right) {
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        _ => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).ok_or_else(|| {
                ExpressionError::eval("cannot compare NaN")
            })?,
            _ => {
                return Err(ExpressionError::eval(format!(
                    "cannot compare {} and {}",
                    left.kind().name(),
                    right.kind().name()
                )));
            }
        },
    };
    Ok(Value::boolean(accept(ordering)))
}
