//! Expression engine with compiled-program caching.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use ruleflow_value::{FromValue, Value};
use tracing::trace;

use crate::builtins::UtilRegistry;
use crate::context::EvaluationContext;
use crate::core::ast::Program;
use crate::error::{ExpressionError, ExpressionResult};
use crate::eval::Evaluator;
use crate::lexer::Lexer;
use crate::parser::Parser;

/// Default maximum number of cached compiled expressions.
pub const DEFAULT_CACHE_SIZE: usize = 512;

/// Parses and evaluates expressions, caching compiled single expressions.
///
/// Script sources (anything containing a `;` or a `for (`) are parsed per
/// call; single expressions go through the cache. The cache tolerates many
/// concurrent readers with occasional idempotent inserts, so one engine can
/// serve any number of concurrent executions.
pub struct ExpressionEngine {
    cache: Option<RwLock<HashMap<String, Arc<Program>>>>,
    cache_capacity: usize,
    evaluator: Evaluator,
}

impl ExpressionEngine {
    /// Create an engine with the default cache size.
    pub fn new() -> Self {
        Self::with_cache_size(DEFAULT_CACHE_SIZE)
    }

    /// Create an engine with a specific cache capacity.
    pub fn with_cache_size(capacity: usize) -> Self {
        Self {
            cache: Some(RwLock::new(HashMap::new())),
            cache_capacity: capacity,
            evaluator: Evaluator::new(Arc::new(UtilRegistry::new())),
        }
    }

    /// Create an engine that recompiles on every evaluation.
    pub fn without_cache() -> Self {
        Self {
            cache: None,
            cache_capacity: 0,
            evaluator: Evaluator::new(Arc::new(UtilRegistry::new())),
        }
    }

    /// Whether the source is a multi-statement script.
    fn is_script(expression: &str) -> bool {
        expression.contains(';') || expression.contains("for (")
    }

    /// Evaluate an expression or script against the given scope.
    pub fn evaluate(
        &self,
        expression: &str,
        ctx: &mut EvaluationContext,
    ) -> ExpressionResult<Value> {
        if expression.trim().is_empty() {
            return Err(ExpressionError::eval("expression cannot be empty"));
        }

        trace!(expression, "evaluating expression");

        let program = if Self::is_script(expression) {
            Arc::new(self.parse(expression)?)
        } else {
            self.cached_program(expression)?
        };

        self.evaluator
            .run(&program, ctx)
            .map_err(|e| e.in_expression(expression))
    }

    /// Evaluate and coerce the result to a boolean through value truthiness.
    pub fn evaluate_boolean(
        &self,
        expression: &str,
        ctx: &mut EvaluationContext,
    ) -> ExpressionResult<bool> {
        Ok(self.evaluate(expression, ctx)?.is_truthy())
    }

    /// Evaluate and extract a typed result. A null result passes through as
    /// `None`; a kind mismatch is an error carrying the expression text.
    pub fn evaluate_as<T: FromValue>(
        &self,
        expression: &str,
        ctx: &mut EvaluationContext,
    ) -> ExpressionResult<Option<T>> {
        let value = self.evaluate(expression, ctx)?;
        if value.is_null() {
            return Ok(None);
        }
        T::from_value(value)
            .map(Some)
            .map_err(|e| ExpressionError::eval(e.to_string()).in_expression(expression))
    }

    /// Compile an expression or script into a reusable handle.
    pub fn compile(&self, expression: &str) -> ExpressionResult<CompiledExpression> {
        if expression.trim().is_empty() {
            return Err(ExpressionError::parse("expression cannot be empty"));
        }
        let program = self.parse(expression)?;
        Ok(CompiledExpression {
            source: expression.to_owned(),
            program: Arc::new(program),
            evaluator: self.evaluator.clone(),
        })
    }

    /// Parse-only validity check. Never fails; a malformed source is simply
    /// invalid.
    pub fn is_valid(&self, expression: &str) -> bool {
        !expression.trim().is_empty() && self.parse(expression).is_ok()
    }

    /// Drop all cached compiled expressions.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.write().clear();
        }
    }

    /// Number of cached compiled expressions.
    pub fn cache_len(&self) -> usize {
        self.cache.as_ref().map_or(0, |cache| cache.read().len())
    }

    fn cached_program(&self, expression: &str) -> ExpressionResult<Arc<Program>> {
        let Some(cache) = &self.cache else {
            return Ok(Arc::new(self.parse(expression)?));
        };

        if let Some(program) = cache.read().get(expression) {
            return Ok(Arc::clone(program));
        }

        let program = Arc::new(self.parse(expression)?);
        let mut cache = cache.write();
        if cache.len() >= self.cache_capacity {
            // Full: drop an arbitrary entry to stay bounded.
            if let Some(key) = cache.keys().next().cloned() {
                cache.remove(&key);
            }
        }
        cache
            .entry(expression.to_owned())
            .or_insert_with(|| Arc::clone(&program));
        Ok(program)
    }

    fn parse(&self, expression: &str) -> ExpressionResult<Program> {
        let tokens = Lexer::new(expression)
            .tokenize()
            .map_err(|e| e.in_expression(expression))?;
        Parser::new(tokens)
            .parse()
            .map_err(|e| e.in_expression(expression))
    }
}

impl Default for ExpressionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExpressionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionEngine")
            .field("cache_capacity", &self.cache_capacity)
            .finish()
    }
}

/// A parsed, reusable expression bound to its evaluator.
#[derive(Clone)]
pub struct CompiledExpression {
    source: String,
    program: Arc<Program>,
    evaluator: Evaluator,
}

impl std::fmt::Debug for CompiledExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledExpression")
            .field("source", &self.source)
            .finish()
    }
}

impl CompiledExpression {
    /// The original source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against the given scope.
    pub fn evaluate(&self, ctx: &mut EvaluationContext) -> ExpressionResult<Value> {
        self.evaluator
            .run(&self.program, ctx)
            .map_err(|e| e.in_expression(&self.source))
    }
}
