//! Engine error taxonomy.

use thiserror::Error;

use ruleflow_expression::ExpressionError;

/// Runtime failure of one action.
#[derive(Debug, Error)]
#[error("action '{action_id}' failed: {message}")]
pub struct ActionError {
    /// Id of the failed action.
    pub action_id: String,
    /// What went wrong.
    pub message: String,
    /// Underlying cause, when one exists.
    #[source]
    pub source: Option<ExpressionError>,
}

impl ActionError {
    /// Construct an action error without a cause.
    pub fn new(action_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Construct an action error caused by an expression failure.
    pub fn with_source(
        action_id: impl Into<String>,
        message: impl Into<String>,
        source: ExpressionError,
    ) -> Self {
        Self {
            action_id: action_id.into(),
            message: message.into(),
            source: Some(source),
        }
    }
}

/// Failure to instantiate an action from its definition.
#[derive(Debug, Error)]
pub enum ActionCreationError {
    /// No registered provider supports the requested type tag.
    #[error(
        "no action provider found for type '{action_type}' (actionId: {action_id}); \
         available providers: {available}"
    )]
    UnsupportedType {
        /// The requested type tag.
        action_type: String,
        /// Id of the action being created.
        action_id: String,
        /// Description of the registered providers.
        available: String,
    },

    /// A provider matched the type but rejected the definition.
    #[error("cannot create action '{action_id}' of type '{action_type}': {message}")]
    Invalid {
        /// The requested type tag.
        action_type: String,
        /// Id of the action being created.
        action_id: String,
        /// Why the definition was rejected.
        message: String,
    },
}

/// Terminal engine-level failure of one execution.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RuleExecutionError {
    /// Rule the failure occurred in, when known.
    pub rule_id: Option<String>,
    /// What went wrong.
    pub message: String,
}

impl RuleExecutionError {
    /// Failure not attributable to a specific rule.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            rule_id: None,
            message: message.into(),
        }
    }

    /// Failure inside a specific rule.
    pub fn in_rule(rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule_id: Some(rule_id.into()),
            message: message.into(),
        }
    }
}

/// Failure to resolve a host-provided resource from the context.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// No resource registered under the name.
    #[error("resource not found: {name}")]
    NotFound {
        /// Requested resource name.
        name: String,
    },

    /// The resource exists but has a different concrete type.
    #[error("resource '{name}' is not of the requested type")]
    WrongType {
        /// Requested resource name.
        name: String,
    },
}
