//! Action contracts: the unit-of-work trait, its result type, and the
//! provider factory trait.

pub mod registry;
pub mod script;

pub use registry::ActionRegistry;
pub use script::{ScriptAction, ScriptActionProvider};

use ruleflow_value::Value;

use crate::context::ExecutionContext;
use crate::error::{ActionCreationError, ActionError};
use crate::model::ActionDefinition;

/// A unit of work executed within a rule.
///
/// Actions communicate exclusively through the execution context: they read
/// variables and resources, do their work, and return a result the executor
/// binds back into the context.
pub trait Action: Send + Sync + std::fmt::Debug {
    /// Execute against the given context.
    fn execute(&self, ctx: &mut ExecutionContext) -> Result<ActionResult, ActionError>;

    /// The type tag this action was created for.
    fn action_type(&self) -> &str;

    /// Id of this action instance.
    fn action_id(&self) -> &str;
}

/// Outcome of one action execution: a success payload or a failure message.
#[derive(Debug, Clone)]
pub struct ActionResult {
    success: bool,
    value: Value,
    error_message: Option<String>,
}

impl ActionResult {
    /// Successful result carrying a payload.
    pub fn success(value: Value) -> Self {
        Self {
            success: true,
            value,
            error_message: None,
        }
    }

    /// Successful result with no payload.
    pub fn success_empty() -> Self {
        Self::success(Value::Null)
    }

    /// Failed result with a message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            value: Value::Null,
            error_message: Some(message.into()),
        }
    }

    /// Whether the action succeeded.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// The success payload (null for empty or failed results).
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Consume the result, returning the payload.
    pub fn into_value(self) -> Value {
        self.value
    }

    /// The failure message, if this result is a failure.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

/// Factory for actions of a given type tag.
///
/// Providers are registered on the [`ActionRegistry`] and consulted in
/// descending priority order; the first provider whose [`supports`] matches
/// creates the action.
///
/// [`supports`]: ActionProvider::supports
pub trait ActionProvider: Send + Sync {
    /// Whether this provider handles the given type tag. Matching is
    /// case-insensitive.
    fn supports(&self, action_type: &str) -> bool;

    /// Instantiate an action from its definition.
    fn create_action(
        &self,
        definition: &ActionDefinition,
    ) -> Result<Box<dyn Action>, ActionCreationError>;

    /// Dispatch priority; higher wins. Defaults to 0.
    fn priority(&self) -> i32 {
        0
    }

    /// Human-readable provider name, used in diagnostics.
    fn provider_name(&self) -> &str;
}
