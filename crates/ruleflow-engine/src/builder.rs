//! Assembles a [`RuleExecutor`] from configuration and providers.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use ruleflow_expression::ExpressionEngine;

use crate::action::{ActionProvider, ActionRegistry, ScriptActionProvider};
use crate::executor::RuleExecutor;
use crate::loader::{ConfigurationError, ConfigurationLoader};
use crate::model::RuleEngineConfig;
use crate::validation::{CompositeValidator, ConfigValidator};

/// Failure to assemble an executor.
#[derive(Debug, Error)]
pub enum BuildError {
    /// No configuration was supplied.
    #[error("configuration is required")]
    MissingConfig,

    /// Loading the configuration failed.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Startup validation found errors.
    #[error("configuration validation failed:\n{summary}")]
    Validation {
        /// Rendered validation issues.
        summary: String,
    },
}

/// Builder wiring configuration, expression engine, and action providers
/// into a ready [`RuleExecutor`].
///
/// ```
/// use ruleflow_engine::RuleEngineBuilder;
///
/// let executor = RuleEngineBuilder::new()
///     .with_config_str(r#"{
///         "entryPoint": "done",
///         "rules": [{"ruleId": "done", "terminal": true}]
///     }"#)
///     .unwrap()
///     .build()
///     .unwrap();
/// # let _ = executor;
/// ```
#[derive(Default)]
pub struct RuleEngineBuilder {
    config: Option<RuleEngineConfig>,
    engine: Option<Arc<ExpressionEngine>>,
    registry: Option<ActionRegistry>,
    providers: Vec<Arc<dyn ActionProvider>>,
    validate_on_build: bool,
    include_built_in_actions: bool,
}

impl RuleEngineBuilder {
    /// Start a builder with validation and built-in actions enabled.
    pub fn new() -> Self {
        Self {
            config: None,
            engine: None,
            registry: None,
            providers: Vec::new(),
            validate_on_build: true,
            include_built_in_actions: true,
        }
    }

    /// Use an already-parsed configuration.
    pub fn with_config(mut self, config: RuleEngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load the configuration from a JSON string.
    pub fn with_config_str(mut self, content: &str) -> Result<Self, ConfigurationError> {
        self.config = Some(ConfigurationLoader::new().from_str(content)?);
        Ok(self)
    }

    /// Load the configuration from a JSON file.
    pub fn with_config_file(
        mut self,
        path: impl AsRef<Path>,
    ) -> Result<Self, ConfigurationError> {
        self.config = Some(ConfigurationLoader::new().from_file(path)?);
        Ok(self)
    }

    /// Use a custom expression engine (e.g. a different cache size).
    pub fn with_expression_engine(mut self, engine: Arc<ExpressionEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Use a fully caller-assembled registry. When set, built-in actions and
    /// providers registered on the builder are not added; the registry is
    /// taken as-is.
    pub fn with_registry(mut self, registry: ActionRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Register a custom action provider.
    pub fn register_provider(mut self, provider: Arc<dyn ActionProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Enable or disable startup validation (enabled by default).
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate_on_build = validate;
        self
    }

    /// Include or exclude the built-in `SCRIPT` action (included by
    /// default).
    pub fn with_built_in_actions(mut self, include: bool) -> Self {
        self.include_built_in_actions = include;
        self
    }

    /// Assemble the executor.
    pub fn build(self) -> Result<RuleExecutor, BuildError> {
        let config = self.config.ok_or(BuildError::MissingConfig)?;

        info!(rules = config.rule_count(), "building rule executor");

        if self.validate_on_build {
            let validator = CompositeValidator::default_chain(true);
            let result = validator.validate(&config);
            if result.has_errors() {
                return Err(BuildError::Validation {
                    summary: result.summary(),
                });
            }
            if result.has_warnings() {
                warn!(summary = %result.summary(), "configuration has warnings");
            }
            debug!("configuration validation passed");
        }

        let engine = self
            .engine
            .unwrap_or_else(|| Arc::new(ExpressionEngine::new()));

        let registry = match self.registry {
            Some(registry) => registry,
            None => {
                let registry = ActionRegistry::new();
                if self.include_built_in_actions {
                    debug!("registering built-in script action provider");
                    registry.register_provider(Arc::new(ScriptActionProvider::new(Arc::clone(
                        &engine,
                    ))));
                }
                registry.register_providers(self.providers);
                registry
            }
        };

        Ok(RuleExecutor::new(config, registry, engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use ruleflow_value::Value;

    const VALID: &str = r#"{
        "entryPoint": "start",
        "rules": [{
            "ruleId": "start",
            "terminal": true,
            "actions": [{
                "actionId": "greet",
                "type": "SCRIPT",
                "config": {"expression": "'hello'"},
                "outputVariable": "greeting"
            }]
        }]
    }"#;

    #[test]
    fn builds_and_executes() {
        let executor = RuleEngineBuilder::new()
            .with_config_str(VALID)
            .unwrap()
            .build()
            .unwrap();

        let mut ctx = ExecutionContext::new();
        let result = executor.execute(&mut ctx);
        assert!(result.is_success());
        assert_eq!(ctx.variable("greeting"), Some(&Value::text("hello")));
    }

    #[test]
    fn missing_config_is_rejected() {
        assert!(matches!(
            RuleEngineBuilder::new().build(),
            Err(BuildError::MissingConfig)
        ));
    }

    #[test]
    fn invalid_references_fail_the_build() {
        let err = RuleEngineBuilder::new()
            .with_config_str(
                r#"{
                    "entryPoint": "ghost",
                    "rules": [{"ruleId": "start", "terminal": true}]
                }"#,
            )
            .unwrap()
            .build()
            .unwrap_err();

        match err {
            BuildError::Validation { summary } => assert!(summary.contains("REF-004")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn validation_can_be_disabled() {
        let executor = RuleEngineBuilder::new()
            .with_config_str(
                r#"{
                    "entryPoint": "ghost",
                    "rules": [{"ruleId": "start", "terminal": true}]
                }"#,
            )
            .unwrap()
            .with_validation(false)
            .build();
        // Builds fine; the dangling entry point only fails at execution.
        assert!(executor.is_ok());
    }

    #[test]
    fn built_in_actions_can_be_excluded() {
        let executor = RuleEngineBuilder::new()
            .with_config_str(VALID)
            .unwrap()
            .with_built_in_actions(false)
            .build()
            .unwrap();

        let mut ctx = ExecutionContext::new();
        let result = executor.execute(&mut ctx);
        // The SCRIPT type has no provider, so the action fails the run.
        assert!(!result.is_success());
        assert!(result.error_message().unwrap().contains("no action provider"));
    }
}
