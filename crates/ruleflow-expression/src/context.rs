//! Evaluation scope for a single expression evaluation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ruleflow_value::Value;

/// Scratch scope an expression evaluates against.
///
/// The engine materialises one per evaluation from the execution context's
/// variables. Script-local assignments land here and are discarded with the
/// scope, so expressions can never mutate engine state behind the executor's
/// back.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    variables: HashMap<String, Value>,
    cancel: Option<Arc<AtomicBool>>,
}

impl EvaluationContext {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope seeded with the given variables.
    pub fn from_variables(variables: HashMap<String, Value>) -> Self {
        Self {
            variables,
            cancel: None,
        }
    }

    /// Set a variable.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    /// Look up a variable.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Copy all entries of `other` into this scope.
    pub fn extend(&mut self, other: impl IntoIterator<Item = (String, Value)>) {
        self.variables.extend(other);
    }

    /// Number of variables in scope.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Whether the scope holds no variables.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Attach a cancellation flag observed by script loops.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Whether evaluation has been asked to stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}
