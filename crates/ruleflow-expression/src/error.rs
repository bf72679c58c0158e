//! Expression language errors.

use thiserror::Error;

/// Error raised while lexing, parsing, or evaluating an expression.
///
/// The message carries the offending expression text when the failure
/// surfaces through the [`crate::ExpressionEngine`] public entry points.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExpressionError {
    /// Lexical error: the source contains characters or literals that do not
    /// form valid tokens.
    #[error("syntax error: {message}")]
    Syntax {
        /// What went wrong.
        message: String,
    },

    /// Structural error: the token stream does not form a valid expression
    /// or script.
    #[error("parse error: {message}")]
    Parse {
        /// What went wrong.
        message: String,
    },

    /// Runtime error during evaluation.
    #[error("evaluation error: {message}")]
    Eval {
        /// What went wrong.
        message: String,
    },
}

impl ExpressionError {
    /// Lexical error.
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax {
            message: message.into(),
        }
    }

    /// Parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Evaluation error.
    pub fn eval(message: impl Into<String>) -> Self {
        Self::Eval {
            message: message.into(),
        }
    }

    /// Type-mismatch evaluation error.
    pub fn type_error(expected: impl AsRef<str>, actual: impl AsRef<str>) -> Self {
        Self::eval(format!(
            "expected {}, got {}",
            expected.as_ref(),
            actual.as_ref()
        ))
    }

    /// Invalid argument to a builtin function.
    pub fn invalid_argument(function: &str, message: impl AsRef<str>) -> Self {
        Self::eval(format!("{}: {}", function, message.as_ref()))
    }

    /// Attach the offending expression source to this error's message.
    pub fn in_expression(self, expression: &str) -> Self {
        let tag = |message: String| format!("{} (in expression: {})", message, expression);
        match self {
            Self::Syntax { message } => Self::Syntax {
                message: tag(message),
            },
            Self::Parse { message } => Self::Parse {
                message: tag(message),
            },
            Self::Eval { message } => Self::Eval {
                message: tag(message),
            },
        }
    }
}

/// Convenience alias for expression results.
pub type ExpressionResult<T> = Result<T, ExpressionError>;
