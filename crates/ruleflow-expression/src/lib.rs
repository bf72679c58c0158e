//! # ruleflow-expression
//!
//! Embedded expression language for the ruleflow rule engine.
//!
//! Expressions are small, side-effect-free programs evaluated against a
//! key/value scope: guard conditions (`age >= 18`), computations
//! (`amount * 0.9`), and extraction paths (`result.data.user.id`). The
//! language supports literals, variables, member and index access, arithmetic
//! with string concatenation, comparisons, short-circuit logic, ternaries,
//! method calls against a fixed allowlist, and the `util` builtin namespace
//! (`util.roundTo(x, 2)`, `util:uuid()`).
//!
//! Sources containing `;` or `for (` are treated as multi-statement scripts
//! with assignment and `for` loops; assignments are evaluation-local and the
//! last statement's value is the result.
//!
//! ## Quick start
//!
//! ```
//! use ruleflow_expression::{EvaluationContext, ExpressionEngine};
//! use ruleflow_value::Value;
//!
//! let engine = ExpressionEngine::new();
//! let mut ctx = EvaluationContext::new();
//! ctx.set("age", Value::integer(25));
//!
//! assert!(engine.evaluate_boolean("age >= 18", &mut ctx).unwrap());
//! ```
//!
//! Single expressions are compiled once and cached; the cache is safe for
//! concurrent use, so one [`ExpressionEngine`] serves any number of parallel
//! executions.
//!
//! Safety: the evaluator has no I/O surface. Expressions cannot spawn
//! processes, touch files, or reach the network; `util` is the only provided
//! namespace and method dispatch is allowlisted.

pub mod builtins;
pub mod context;
pub mod core;
pub mod engine;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;

pub use builtins::UtilRegistry;
pub use context::EvaluationContext;
pub use core::ast::{BinaryOp, Expr, Program, Stmt};
pub use engine::{CompiledExpression, ExpressionEngine, DEFAULT_CACHE_SIZE};
pub use error::{ExpressionError, ExpressionResult};
pub use eval::Evaluator;

// Re-export the value types for convenience.
pub use ruleflow_value::{Value, ValueKind};
