//! Rule traversal state machine.

pub mod trace;
pub mod watchdog;

pub use trace::ExecutionTrace;
pub use watchdog::{CancellationToken, Watchdog};

use std::collections::HashMap;
use std::time::{Duration, Instant};

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use ruleflow_expression::{EvaluationContext, ExpressionEngine};
use ruleflow_value::Value;

use crate::action::ActionRegistry;
use crate::context::{ErrorInfo, ExecutionContext, ExecutionStep, StepType};
use crate::error::{ActionError, RuleExecutionError};
use crate::model::{ActionDefinition, RuleDefinition, RuleEngineConfig, TransitionDefinition};

/// Outcome of one `execute` call.
///
/// The executor never panics and never returns an `Err`: failures are
/// encoded here, with the rule the execution stopped in and the elapsed
/// wall-clock time.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    success: bool,
    final_rule_id: Option<String>,
    error_message: Option<String>,
    execution_time_ms: u64,
}

impl ExecutionResult {
    /// Start building a result.
    pub fn builder() -> ExecutionResultBuilder {
        ExecutionResultBuilder::default()
    }

    /// Whether the execution completed without a terminal failure.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// The rule the execution ended in.
    pub fn final_rule_id(&self) -> Option<&str> {
        self.final_rule_id.as_deref()
    }

    /// The failure message, when the execution failed.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Elapsed wall-clock milliseconds.
    pub fn execution_time_ms(&self) -> u64 {
        self.execution_time_ms
    }
}

/// Builder for [`ExecutionResult`].
#[derive(Debug, Default)]
pub struct ExecutionResultBuilder {
    success: bool,
    final_rule_id: Option<String>,
    error_message: Option<String>,
    execution_time_ms: u64,
}

impl ExecutionResultBuilder {
    /// Set the success flag.
    pub fn success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    /// Set the final rule id.
    pub fn final_rule_id(mut self, rule_id: impl Into<String>) -> Self {
        self.final_rule_id = Some(rule_id.into());
        self
    }

    /// Set the failure message.
    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Set the elapsed time.
    pub fn execution_time_ms(mut self, millis: u64) -> Self {
        self.execution_time_ms = millis;
        self
    }

    /// Finish the result.
    pub fn build(self) -> ExecutionResult {
        ExecutionResult {
            success: self.success,
            final_rule_id: self.final_rule_id,
            error_message: self.error_message,
            execution_time_ms: self.execution_time_ms,
        }
    }
}

/// Walks the rule graph: runs each rule's actions, selects a transition,
/// and routes errors, under a depth limit and a wall-clock timeout.
#[derive(Debug)]
pub struct RuleExecutor {
    config: RuleEngineConfig,
    rule_map: HashMap<String, RuleDefinition>,
    registry: ActionRegistry,
    engine: Arc<ExpressionEngine>,
    max_depth: u32,
    timeout_ms: u64,
    default_error_rule: Option<String>,
    watchdog: Watchdog,
}

impl RuleExecutor {
    /// Create an executor over a validated configuration.
    pub fn new(
        config: RuleEngineConfig,
        registry: ActionRegistry,
        engine: Arc<ExpressionEngine>,
    ) -> Self {
        let rule_map = config.build_rule_map();
        let max_depth = config.global_settings.max_execution_depth;
        let timeout_ms = config.global_settings.timeout;
        let default_error_rule = config.global_settings.default_error_rule.clone();

        info!(
            rules = rule_map.len(),
            max_depth, timeout_ms, "rule executor initialized"
        );

        Self {
            config,
            rule_map,
            registry,
            engine,
            max_depth,
            timeout_ms,
            default_error_rule,
            watchdog: Watchdog::new(),
        }
    }

    /// The configuration this executor runs.
    pub fn config(&self) -> &RuleEngineConfig {
        &self.config
    }

    /// The provider registry.
    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Stop the timeout watcher. Also happens on drop.
    pub fn shutdown(&self) {
        self.watchdog.shutdown();
    }

    /// Execute from the configured entry point against the given context.
    pub fn execute(&self, ctx: &mut ExecutionContext) -> ExecutionResult {
        let started = Instant::now();

        let entry_point = self.config.entry_point.trim().to_owned();
        if entry_point.is_empty() {
            return ExecutionResult::builder()
                .success(false)
                .error_message("Entry point is not configured")
                .execution_time_ms(started.elapsed().as_millis() as u64)
                .build();
        }

        info!(entry_point = %entry_point, "starting rule execution");

        if ctx.tracing_enabled() {
            let variables = ctx.snapshot_variables();
            if let Some(trace) = ctx.trace_mut() {
                trace.set_entry_point(&entry_point);
                trace.snapshot_variables("initial-state", variables);
            }
        }

        let token = self.watchdog.arm(Duration::from_millis(self.timeout_ms));
        ctx.set_cancel_flag(token.flag());

        let outcome = self.run(&entry_point, ctx, &token);
        token.disarm();

        let execution_time_ms = started.elapsed().as_millis() as u64;
        let result = match outcome {
            Ok(final_rule_id) => {
                info!(
                    final_rule = %final_rule_id,
                    elapsed_ms = execution_time_ms,
                    "rule execution completed"
                );
                ExecutionResult::builder()
                    .success(true)
                    .final_rule_id(final_rule_id)
                    .execution_time_ms(execution_time_ms)
                    .build()
            }
            Err(e) => {
                error!(
                    elapsed_ms = execution_time_ms,
                    error = %e,
                    "rule execution failed"
                );
                let mut builder = ExecutionResult::builder()
                    .success(false)
                    .error_message(&e.message)
                    .execution_time_ms(execution_time_ms);
                if let Some(rule_id) = ctx.current_rule_id() {
                    builder = builder.final_rule_id(rule_id);
                }
                builder.build()
            }
        };

        if ctx.tracing_enabled() {
            let variables = ctx.snapshot_variables();
            let success = result.is_success();
            let error_message = result.error_message().map(str::to_owned);
            if let Some(trace) = ctx.trace_mut() {
                trace.snapshot_variables("final-state", variables);
                trace.complete(success, error_message);
            }
        }

        result
    }

    fn run(
        &self,
        entry_point: &str,
        ctx: &mut ExecutionContext,
        token: &CancellationToken,
    ) -> Result<String, RuleExecutionError> {
        let mut current = entry_point.to_owned();

        loop {
            if token.is_cancelled() {
                return Err(self.timeout_error(&current));
            }

            if ctx.depth() >= self.max_depth {
                return Err(RuleExecutionError::in_rule(
                    current.clone(),
                    format!("Maximum execution depth exceeded: {}", self.max_depth),
                ));
            }

            let rule = self.rule_map.get(&current).ok_or_else(|| {
                RuleExecutionError::in_rule(current.clone(), format!("Rule not found: {}", current))
            })?;

            debug!(rule = %current, depth = ctx.depth(), "executing rule");
            ctx.set_current_rule_id(&current);
            ctx.increment_depth();
            ctx.add_step(
                ExecutionStep::builder(StepType::RuleEntered)
                    .rule_id(&current)
                    .build(),
            );

            if let Err(failure) = self.execute_actions(rule, ctx, token) {
                // A cooperative cancellation surfaces as an action failure;
                // report the timeout, not the action.
                if token.is_cancelled() {
                    return Err(self.timeout_error(&current));
                }
                match self.route_error(rule, &failure, ctx) {
                    Some(next) => {
                        current = next;
                        continue;
                    }
                    None => {
                        return Err(RuleExecutionError::in_rule(
                            current,
                            format!("Action execution failed: {}", failure.message),
                        ));
                    }
                }
            }

            ctx.add_step(
                ExecutionStep::builder(StepType::RuleExited)
                    .rule_id(&current)
                    .build(),
            );

            if rule.terminal {
                debug!(rule = %current, "reached terminal rule");
                return Ok(current);
            }

            match self.evaluate_transitions(rule, ctx)? {
                Some(next) => current = next,
                None => {
                    debug!(rule = %current, "no transition matched, halting");
                    return Ok(current);
                }
            }
        }
    }

    fn execute_actions(
        &self,
        rule: &RuleDefinition,
        ctx: &mut ExecutionContext,
        token: &CancellationToken,
    ) -> Result<(), ActionError> {
        if rule.actions.is_empty() {
            return Ok(());
        }
        debug!(rule = %rule.rule_id, count = rule.actions.len(), "executing actions");

        for definition in &rule.actions {
            if token.is_cancelled() {
                return Err(ActionError::new(
                    &definition.action_id,
                    "execution cancelled",
                ));
            }
            self.execute_action(definition, ctx)?;
        }
        Ok(())
    }

    fn execute_action(
        &self,
        definition: &ActionDefinition,
        ctx: &mut ExecutionContext,
    ) -> Result<(), ActionError> {
        if let Some(condition) = &definition.condition {
            let mut scope = self.scope(ctx);
            let should_run = match self.engine.evaluate_boolean(condition, &mut scope) {
                Ok(value) => value,
                Err(e) => {
                    // A malformed guard must not silently drop a side effect;
                    // validators flag these ahead of time.
                    warn!(
                        action = %definition.action_id,
                        condition = %condition,
                        error = %e,
                        "action condition failed to evaluate, defaulting to true"
                    );
                    true
                }
            };
            if !should_run {
                debug!(action = %definition.action_id, "condition is false, skipping action");
                return Ok(());
            }
        }

        ctx.add_step(
            ExecutionStep::builder(StepType::ActionStarted)
                .rule_id(ctx.current_rule_id().unwrap_or_default())
                .action_id(&definition.action_id)
                .build(),
        );

        let started = Instant::now();
        let outcome = self.run_action(definition, ctx);
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => {
                ctx.add_step(
                    ExecutionStep::builder(StepType::ActionCompleted)
                        .rule_id(ctx.current_rule_id().unwrap_or_default())
                        .action_id(&definition.action_id)
                        .duration_ms(duration_ms)
                        .metadata("success", true)
                        .build(),
                );
                debug!(action = %definition.action_id, duration_ms, "action completed");
                Ok(())
            }
            Err(e) => {
                ctx.add_step(
                    ExecutionStep::builder(StepType::ActionFailed)
                        .rule_id(ctx.current_rule_id().unwrap_or_default())
                        .action_id(&definition.action_id)
                        .duration_ms(duration_ms)
                        .metadata("error", e.message.as_str())
                        .build(),
                );
                error!(action = %definition.action_id, duration_ms, error = %e, "action failed");

                if definition.continue_on_error {
                    warn!(
                        action = %definition.action_id,
                        "continuing execution despite action error"
                    );
                    return Ok(());
                }
                Err(e)
            }
        }
    }

    /// Instantiate, execute, and bind the output of one action.
    fn run_action(
        &self,
        definition: &ActionDefinition,
        ctx: &mut ExecutionContext,
    ) -> Result<(), ActionError> {
        let action = self
            .registry
            .create_action(definition)
            .map_err(|e| ActionError::new(&definition.action_id, e.to_string()))?;

        let result = action.execute(ctx)?;
        if !result.is_success() {
            let message = result
                .error_message()
                .unwrap_or("action reported failure")
                .to_owned();
            return Err(ActionError::new(&definition.action_id, message));
        }

        if let Some(output_variable) = &definition.output_variable {
            let raw = result.into_value();
            let value = if definition.has_output_expression() {
                self.extract_output(definition, raw, ctx)?
            } else {
                raw
            };
            debug!(
                action = %definition.action_id,
                variable = %output_variable,
                "stored action result"
            );
            ctx.set_variable(output_variable, value);
        }

        Ok(())
    }

    /// Evaluate the output expression in a scoped sub-context where `result`
    /// is bound only for the duration of the evaluation, so the name never
    /// leaks into (or collides with) the execution context.
    fn extract_output(
        &self,
        definition: &ActionDefinition,
        raw: Value,
        ctx: &ExecutionContext,
    ) -> Result<Value, ActionError> {
        let expression = definition
            .output_expression
            .as_deref()
            .unwrap_or_default();

        let mut scope = self.scope(ctx);
        scope.set("result", raw.clone());

        match self.engine.evaluate(expression, &mut scope) {
            Ok(value) => {
                debug!(expression, "extracted output data");
                Ok(value)
            }
            Err(e) => {
                error!(expression, error = %e, "failed to evaluate output expression");
                if definition.continue_on_error {
                    warn!("returning full action result due to output expression failure");
                    return Ok(raw);
                }
                Err(ActionError::with_source(
                    &definition.action_id,
                    format!("Failed to evaluate output expression: {}", e),
                    e,
                ))
            }
        }
    }

    fn evaluate_transitions(
        &self,
        rule: &RuleDefinition,
        ctx: &mut ExecutionContext,
    ) -> Result<Option<String>, RuleExecutionError> {
        if !rule.has_transitions() {
            return Ok(None);
        }

        for transition in rule.sorted_transitions() {
            let mut scope = self.scope(ctx);
            let matched = self
                .engine
                .evaluate_boolean(&transition.condition, &mut scope)
                .map_err(|e| {
                    RuleExecutionError::in_rule(
                        &rule.rule_id,
                        format!("Failed to evaluate transition condition: {}", e),
                    )
                })?;

            ctx.add_step(
                ExecutionStep::builder(StepType::TransitionEvaluated)
                    .rule_id(&rule.rule_id)
                    .metadata("condition", transition.condition.as_str())
                    .metadata("result", matched)
                    .metadata("targetRule", transition.target_rule.as_str())
                    .build(),
            );

            if matched {
                debug!(
                    from = %rule.rule_id,
                    to = %transition.target_rule,
                    "transition matched"
                );
                if transition.has_context_transform() {
                    apply_context_transform(transition, ctx);
                }
                return Ok(Some(transition.target_rule.clone()));
            }
        }

        Ok(None)
    }

    /// Action error routing: the failed action's own handler first, then the
    /// global default error rule, otherwise surface.
    fn route_error(
        &self,
        rule: &RuleDefinition,
        failure: &ActionError,
        ctx: &mut ExecutionContext,
    ) -> Option<String> {
        ctx.set_error(
            ErrorInfo::new(&rule.rule_id, "ACTION_ERROR", &failure.message)
                .with_action_id(&failure.action_id),
        );
        ctx.add_step(
            ExecutionStep::builder(StepType::ErrorOccurred)
                .rule_id(&rule.rule_id)
                .action_id(&failure.action_id)
                .metadata("error", failure.message.as_str())
                .build(),
        );

        let handler_target = rule
            .actions
            .iter()
            .find(|action| action.action_id == failure.action_id)
            .and_then(|action| action.on_error.as_ref())
            .map(|handler| handler.target_rule.trim())
            .filter(|target| !target.is_empty());

        if let Some(target) = handler_target {
            info!(action = %failure.action_id, target, "routing to action error handler");
            return Some(target.to_owned());
        }

        if let Some(default_error_rule) = &self.default_error_rule {
            info!(target = %default_error_rule, "routing to default error rule");
            return Some(default_error_rule.clone());
        }

        None
    }

    fn scope(&self, ctx: &ExecutionContext) -> EvaluationContext {
        let mut scope = EvaluationContext::from_variables(ctx.snapshot_variables());
        if let Some(flag) = ctx.cancel_flag() {
            scope = scope.with_cancel_flag(flag);
        }
        scope
    }

    fn timeout_error(&self, rule_id: &str) -> RuleExecutionError {
        RuleExecutionError::in_rule(
            rule_id,
            format!("Execution timed out after {}ms", self.timeout_ms),
        )
    }
}

fn apply_context_transform(transition: &TransitionDefinition, ctx: &mut ExecutionContext) {
    let Some(transform) = &transition.context_transform else {
        return;
    };
    for (target, source) in transform {
        let value = ctx.variable(source).cloned().unwrap_or(Value::Null);
        debug!(source = %source, target = %target, "applying context transform");
        ctx.set_variable(target, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ScriptActionProvider;

    fn executor_for(json: &str) -> RuleExecutor {
        let config: RuleEngineConfig = serde_json::from_str(json).unwrap();
        let engine = Arc::new(ExpressionEngine::new());
        let registry = ActionRegistry::new();
        registry.register_provider(Arc::new(ScriptActionProvider::new(Arc::clone(&engine))));
        RuleExecutor::new(config, registry, engine)
    }

    #[test]
    fn missing_entry_point_fails_immediately() {
        let executor = executor_for(r#"{"rules": [{"ruleId": "a", "terminal": true}]}"#);
        let mut ctx = ExecutionContext::new();
        let result = executor.execute(&mut ctx);
        assert!(!result.is_success());
        assert_eq!(
            result.error_message(),
            Some("Entry point is not configured")
        );
    }

    #[test]
    fn unknown_rule_fails() {
        let executor = executor_for(
            r#"{"entryPoint": "ghost", "rules": [{"ruleId": "a", "terminal": true}]}"#,
        );
        let mut ctx = ExecutionContext::new();
        let result = executor.execute(&mut ctx);
        assert!(!result.is_success());
        assert!(result.error_message().unwrap().contains("Rule not found"));
    }

    #[test]
    fn terminal_rule_ends_execution() {
        let executor = executor_for(
            r#"{
                "entryPoint": "only",
                "rules": [{
                    "ruleId": "only",
                    "terminal": true,
                    "actions": [{
                        "actionId": "set",
                        "type": "SCRIPT",
                        "config": {"expression": "'done'"},
                        "outputVariable": "status"
                    }]
                }]
            }"#,
        );
        let mut ctx = ExecutionContext::new();
        let result = executor.execute(&mut ctx);
        assert!(result.is_success());
        assert_eq!(result.final_rule_id(), Some("only"));
        assert_eq!(ctx.variable("status"), Some(&Value::text("done")));
    }

    #[test]
    fn no_matching_transition_halts_successfully() {
        let executor = executor_for(
            r#"{
                "entryPoint": "a",
                "rules": [
                    {"ruleId": "a", "transitions": [{"condition": "false", "targetRule": "b"}]},
                    {"ruleId": "b", "terminal": true}
                ]
            }"#,
        );
        let mut ctx = ExecutionContext::new();
        let result = executor.execute(&mut ctx);
        assert!(result.is_success());
        assert_eq!(result.final_rule_id(), Some("a"));
    }

    #[test]
    fn context_transform_copies_variables() {
        let executor = executor_for(
            r#"{
                "entryPoint": "a",
                "rules": [
                    {
                        "ruleId": "a",
                        "actions": [{
                            "actionId": "produce",
                            "type": "SCRIPT",
                            "config": {"expression": "41 + 1"},
                            "outputVariable": "raw"
                        }],
                        "transitions": [{
                            "condition": "true",
                            "targetRule": "b",
                            "contextTransform": {"renamed": "raw", "ghost": "missing"}
                        }]
                    },
                    {"ruleId": "b", "terminal": true}
                ]
            }"#,
        );
        let mut ctx = ExecutionContext::new();
        let result = executor.execute(&mut ctx);
        assert!(result.is_success());
        assert_eq!(ctx.variable("renamed"), Some(&Value::integer(42)));
        assert_eq!(ctx.variable("ghost"), Some(&Value::Null));
    }

    #[test]
    fn transition_guard_failure_is_fatal() {
        let executor = executor_for(
            r#"{
                "entryPoint": "a",
                "rules": [
                    {"ruleId": "a", "transitions": [{"condition": "missing +", "targetRule": "b"}]},
                    {"ruleId": "b", "terminal": true}
                ]
            }"#,
        );
        let mut ctx = ExecutionContext::new();
        let result = executor.execute(&mut ctx);
        assert!(!result.is_success());
        assert!(result
            .error_message()
            .unwrap()
            .contains("Failed to evaluate transition condition"));
    }

    #[test]
    fn steps_are_recorded_in_order() {
        let executor = executor_for(
            r#"{
                "entryPoint": "a",
                "rules": [{
                    "ruleId": "a",
                    "terminal": true,
                    "actions": [{
                        "actionId": "one",
                        "type": "SCRIPT",
                        "config": {"expression": "1"}
                    }]
                }]
            }"#,
        );
        let mut ctx = ExecutionContext::new();
        executor.execute(&mut ctx);

        let types: Vec<StepType> = ctx
            .execution_history()
            .iter()
            .map(|step| step.step_type)
            .collect();
        assert_eq!(
            types,
            vec![
                StepType::RuleEntered,
                StepType::ActionStarted,
                StepType::ActionCompleted,
                StepType::RuleExited
            ]
        );
    }
}
