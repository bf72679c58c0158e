//! The built-in `SCRIPT` action: evaluate an expression against the context.

use std::sync::Arc;

use tracing::debug;

use ruleflow_expression::{CompiledExpression, EvaluationContext, ExpressionEngine};

use super::{Action, ActionProvider, ActionResult};
use crate::context::ExecutionContext;
use crate::error::{ActionCreationError, ActionError};
use crate::model::ActionDefinition;

const ACTION_TYPE: &str = "SCRIPT";
const CONFIG_KEY_EXPRESSION: &str = "expression";

/// Action that evaluates a pre-compiled expression and returns its value.
///
/// Configuration shape:
///
/// ```json
/// {
///   "type": "SCRIPT",
///   "config": { "expression": "amount * 1.1 + fee" }
/// }
/// ```
#[derive(Debug)]
pub struct ScriptAction {
    action_id: String,
    compiled: CompiledExpression,
}

impl ScriptAction {
    /// The expression source, for diagnostics.
    pub fn expression(&self) -> &str {
        self.compiled.source()
    }
}

impl Action for ScriptAction {
    fn execute(&self, ctx: &mut ExecutionContext) -> Result<ActionResult, ActionError> {
        debug!(
            action_id = %self.action_id,
            expression = self.compiled.source(),
            "executing script action"
        );

        let mut scope = EvaluationContext::from_variables(ctx.snapshot_variables());
        if let Some(flag) = ctx.cancel_flag() {
            scope = scope.with_cancel_flag(flag);
        }

        match self.compiled.evaluate(&mut scope) {
            Ok(value) => Ok(ActionResult::success(value)),
            Err(e) => Err(ActionError::with_source(
                &self.action_id,
                format!("failed to evaluate script expression: {}", e),
                e,
            )),
        }
    }

    fn action_type(&self) -> &str {
        ACTION_TYPE
    }

    fn action_id(&self) -> &str {
        &self.action_id
    }
}

/// Provider for [`ScriptAction`]; supports the `SCRIPT` type tag at default
/// priority.
pub struct ScriptActionProvider {
    engine: Arc<ExpressionEngine>,
}

impl ScriptActionProvider {
    /// Create a provider compiling through the given engine.
    pub fn new(engine: Arc<ExpressionEngine>) -> Self {
        Self { engine }
    }
}

impl ActionProvider for ScriptActionProvider {
    fn supports(&self, action_type: &str) -> bool {
        action_type.eq_ignore_ascii_case(ACTION_TYPE)
    }

    fn create_action(
        &self,
        definition: &ActionDefinition,
    ) -> Result<Box<dyn Action>, ActionCreationError> {
        let expression = definition
            .config_str(CONFIG_KEY_EXPRESSION)
            .map(str::trim)
            .filter(|expr| !expr.is_empty())
            .ok_or_else(|| ActionCreationError::Invalid {
                action_type: definition.action_type.clone(),
                action_id: definition.action_id.clone(),
                message: format!(
                    "config requires a non-empty string '{}'",
                    CONFIG_KEY_EXPRESSION
                ),
            })?;

        let compiled =
            self.engine
                .compile(expression)
                .map_err(|e| ActionCreationError::Invalid {
                    action_type: definition.action_type.clone(),
                    action_id: definition.action_id.clone(),
                    message: e.to_string(),
                })?;

        Ok(Box::new(ScriptAction {
            action_id: definition.action_id.clone(),
            compiled,
        }))
    }

    fn provider_name(&self) -> &str {
        "ScriptActionProvider"
    }
}
