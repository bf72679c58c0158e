//! # ruleflow-engine
//!
//! Declarative, JSON-configured rule workflow engine.
//!
//! A configuration names an entry-point rule and a set of rules, each
//! bundling parameterized actions and guarded transitions to other rules.
//! Execution carries a mutable key/value context through the graph: each
//! rule runs its actions (the built-in `SCRIPT` action evaluates expressions
//! from `ruleflow-expression`), stores their outputs back into the context,
//! and picks a successor through the first truthy transition guard.
//! Execution ends on a terminal rule, on a rule with no matching transition,
//! or on an unrecoverable failure.
//!
//! ## Quick start
//!
//! ```
//! use ruleflow_engine::{ExecutionContext, RuleEngineBuilder};
//! use ruleflow_value::Value;
//!
//! let executor = RuleEngineBuilder::new()
//!     .with_config_str(r#"{
//!         "entryPoint": "validate",
//!         "rules": [
//!             {
//!                 "ruleId": "validate",
//!                 "transitions": [
//!                     {"condition": "age >= 18", "targetRule": "approve", "priority": 1},
//!                     {"condition": "!(age >= 18)", "targetRule": "reject", "priority": 2}
//!                 ]
//!             },
//!             {
//!                 "ruleId": "approve",
//!                 "terminal": true,
//!                 "actions": [{
//!                     "actionId": "set-status",
//!                     "type": "SCRIPT",
//!                     "config": {"expression": "'APPROVED'"},
//!                     "outputVariable": "status"
//!                 }]
//!             },
//!             {"ruleId": "reject", "terminal": true}
//!         ]
//!     }"#)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//!
//! let mut ctx = ExecutionContext::new();
//! ctx.set_variable("age", Value::integer(25));
//!
//! let result = executor.execute(&mut ctx);
//! assert!(result.is_success());
//! assert_eq!(result.final_rule_id(), Some("approve"));
//! assert_eq!(ctx.variable("status"), Some(&Value::text("APPROVED")));
//! ```
//!
//! ## Structure
//!
//! - [`model`] — typed configuration (rules, actions, transitions, limits)
//! - [`loader`] — JSON loading, including the `ruleEngineConfig` wrapper
//! - [`validation`] — composable pre-execution checks with stable codes
//! - [`action`] — the `Action`/`ActionProvider` contracts, the
//!   priority-sorted registry, and the built-in `SCRIPT` action
//! - [`context`] — per-execution variables, resources, history, and tracing
//! - [`executor`] — the traversal state machine, timeout watchdog, and trace
//! - [`builder`] — glue assembling everything into a [`RuleExecutor`]
//!
//! Executors are shareable: one executor can serve concurrent executions as
//! long as each runs with its own [`ExecutionContext`].

pub mod action;
pub mod builder;
pub mod context;
pub mod error;
pub mod executor;
pub mod loader;
pub mod model;
pub mod validation;

pub use action::{Action, ActionProvider, ActionRegistry, ActionResult, ScriptActionProvider};
pub use builder::{BuildError, RuleEngineBuilder};
pub use context::{ErrorInfo, ExecutionContext, ExecutionStep, StepType};
pub use error::{ActionCreationError, ActionError, ResourceError, RuleExecutionError};
pub use executor::{CancellationToken, ExecutionResult, ExecutionTrace, RuleExecutor};
pub use loader::{ConfigurationError, ConfigurationLoader};
pub use model::{
    ActionDefinition, ErrorHandlerDefinition, GlobalSettings, RuleDefinition, RuleEngineConfig,
    TransitionDefinition,
};
pub use validation::{
    CompositeValidator, ConfigValidator, ValidationIssue, ValidationResult, ValidationSeverity,
};

// Re-export the sibling crates' primary types for downstream convenience.
pub use ruleflow_expression::{EvaluationContext, ExpressionEngine};
pub use ruleflow_value::{Value, ValueKind};
