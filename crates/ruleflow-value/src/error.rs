//! Value-level errors.

use thiserror::Error;

/// Errors raised by typed extraction from a [`crate::Value`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValueError {
    /// The value's runtime kind does not match the requested type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Human-readable name of the requested type.
        expected: &'static str,
        /// Kind name of the actual value.
        actual: &'static str,
    },
}

impl ValueError {
    /// Construct a mismatch error from the expected type name and the actual
    /// value kind name.
    pub fn mismatch(expected: &'static str, actual: &'static str) -> Self {
        Self::TypeMismatch { expected, actual }
    }
}
