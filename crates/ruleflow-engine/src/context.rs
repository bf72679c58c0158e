//! Mutable per-execution state: variables, resources, history, error slot.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use ruleflow_value::{FromValue, Value, ValueError};

use crate::error::ResourceError;
use crate::executor::trace::ExecutionTrace;

/// Kind of an [`ExecutionStep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepType {
    /// Traversal entered a rule.
    RuleEntered,
    /// Traversal left a rule after its actions completed.
    RuleExited,
    /// An action is about to run.
    ActionStarted,
    /// An action finished successfully.
    ActionCompleted,
    /// An action failed.
    ActionFailed,
    /// A transition guard was evaluated.
    TransitionEvaluated,
    /// An action error was recorded on the context.
    ErrorOccurred,
}

impl StepType {
    /// Stable uppercase name used in summaries.
    pub fn name(&self) -> &'static str {
        match self {
            StepType::RuleEntered => "RULE_ENTERED",
            StepType::RuleExited => "RULE_EXITED",
            StepType::ActionStarted => "ACTION_STARTED",
            StepType::ActionCompleted => "ACTION_COMPLETED",
            StepType::ActionFailed => "ACTION_FAILED",
            StepType::TransitionEvaluated => "TRANSITION_EVALUATED",
            StepType::ErrorOccurred => "ERROR_OCCURRED",
        }
    }
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry in the append-only execution history.
#[derive(Debug, Clone)]
pub struct ExecutionStep {
    /// What happened.
    pub step_type: StepType,
    /// Rule this step belongs to.
    pub rule_id: Option<String>,
    /// Action this step belongs to.
    pub action_id: Option<String>,
    /// When the step was recorded.
    pub timestamp: DateTime<Utc>,
    /// Elapsed milliseconds, for completed/failed actions.
    pub duration_ms: Option<u64>,
    /// Free-form step metadata.
    pub metadata: BTreeMap<String, Value>,
}

impl ExecutionStep {
    /// Start building a step of the given type.
    pub fn builder(step_type: StepType) -> ExecutionStepBuilder {
        ExecutionStepBuilder {
            step_type,
            rule_id: None,
            action_id: None,
            duration_ms: None,
            metadata: BTreeMap::new(),
        }
    }
}

/// Builder for [`ExecutionStep`].
#[derive(Debug)]
pub struct ExecutionStepBuilder {
    step_type: StepType,
    rule_id: Option<String>,
    action_id: Option<String>,
    duration_ms: Option<u64>,
    metadata: BTreeMap<String, Value>,
}

impl ExecutionStepBuilder {
    /// Set the rule id.
    pub fn rule_id(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    /// Set the action id.
    pub fn action_id(mut self, action_id: impl Into<String>) -> Self {
        self.action_id = Some(action_id.into());
        self
    }

    /// Set the duration in milliseconds.
    pub fn duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Add one metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Finish the step, stamping the current time.
    pub fn build(self) -> ExecutionStep {
        ExecutionStep {
            step_type: self.step_type,
            rule_id: self.rule_id,
            action_id: self.action_id,
            timestamp: Utc::now(),
            duration_ms: self.duration_ms,
            metadata: self.metadata,
        }
    }
}

/// Details of a failure recorded on the context.
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Rule the failure occurred in.
    pub rule_id: String,
    /// Failing action, when the failure came from one.
    pub action_id: Option<String>,
    /// Coarse error classification (e.g. `ACTION_ERROR`).
    pub error_type: String,
    /// Human-readable message.
    pub message: String,
    /// Underlying cause rendered to text, when one exists.
    pub cause: Option<String>,
    /// When the error was recorded.
    pub timestamp: DateTime<Utc>,
}

impl ErrorInfo {
    /// Create an error record stamped with the current time.
    pub fn new(
        rule_id: impl Into<String>,
        error_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            action_id: None,
            error_type: error_type.into(),
            message: message.into(),
            cause: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach the failing action id.
    pub fn with_action_id(mut self, action_id: impl Into<String>) -> Self {
        self.action_id = Some(action_id.into());
        self
    }

    /// Attach the rendered cause.
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

/// Mutable state carried through one `execute` call.
///
/// A context is owned by a single execution: it must not be shared across
/// concurrent `execute` calls. Distinct contexts may run concurrently
/// against the same executor.
#[derive(Default)]
pub struct ExecutionContext {
    variables: HashMap<String, Value>,
    resources: HashMap<String, Arc<dyn Any + Send + Sync>>,
    history: Vec<ExecutionStep>,
    error: Option<ErrorInfo>,
    depth: u32,
    current_rule_id: Option<String>,
    cancel_flag: Option<Arc<AtomicBool>>,
    trace: Option<ExecutionTrace>,
}

impl ExecutionContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    // ---- variables ----

    /// Set a variable.
    pub fn set_variable(&mut self, key: impl Into<String>, value: Value) {
        self.variables.insert(key.into(), value);
    }

    /// Set multiple variables at once.
    pub fn set_variables(&mut self, vars: impl IntoIterator<Item = (String, Value)>) {
        self.variables.extend(vars);
    }

    /// Look up a variable.
    pub fn variable(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// Typed variable lookup. Absent keys and nulls yield `None`; a kind
    /// mismatch is an error.
    pub fn variable_as<T: FromValue>(&self, key: &str) -> Result<Option<T>, ValueError> {
        match self.variables.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::from_value(value.clone()).map(Some),
        }
    }

    /// Whether a variable exists.
    pub fn has_variable(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    /// Remove a variable.
    pub fn remove_variable(&mut self, key: &str) {
        self.variables.remove(key);
    }

    /// Read-only view of all variables.
    pub fn variables(&self) -> &HashMap<String, Value> {
        &self.variables
    }

    /// Copy of the current variables, used for trace snapshots and
    /// evaluation scopes.
    pub fn snapshot_variables(&self) -> HashMap<String, Value> {
        self.variables.clone()
    }

    // ---- resources ----

    /// Register a host-provided resource. Resources are read-only to
    /// actions and never touched by the engine itself.
    pub fn register_resource<R: Any + Send + Sync>(
        &mut self,
        name: impl Into<String>,
        resource: R,
    ) {
        self.resources.insert(name.into(), Arc::new(resource));
    }

    /// Typed resource lookup.
    pub fn resource<R: Any + Send + Sync>(&self, name: &str) -> Result<Arc<R>, ResourceError> {
        let resource = self
            .resources
            .get(name)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound {
                name: name.to_owned(),
            })?;
        resource
            .downcast::<R>()
            .map_err(|_| ResourceError::WrongType {
                name: name.to_owned(),
            })
    }

    /// Whether a resource exists.
    pub fn has_resource(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    /// Names of all registered resources.
    pub fn resource_names(&self) -> Vec<&str> {
        self.resources.keys().map(String::as_str).collect()
    }

    // ---- execution tracking ----

    /// Append a step to the history (and the trace, when enabled).
    pub fn add_step(&mut self, step: ExecutionStep) {
        if let Some(trace) = &mut self.trace {
            trace.record_step(step.clone());
        }
        self.history.push(step);
    }

    /// The append-only execution history.
    pub fn execution_history(&self) -> &[ExecutionStep] {
        &self.history
    }

    /// Current execution depth (number of rule entries so far).
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Increment the depth; called on every rule entry.
    pub fn increment_depth(&mut self) {
        self.depth += 1;
    }

    /// Rule currently being executed.
    pub fn current_rule_id(&self) -> Option<&str> {
        self.current_rule_id.as_deref()
    }

    /// Set the rule currently being executed.
    pub fn set_current_rule_id(&mut self, rule_id: impl Into<String>) {
        self.current_rule_id = Some(rule_id.into());
    }

    // ---- errors ----

    /// Record an error.
    pub fn set_error(&mut self, error: ErrorInfo) {
        self.error = Some(error);
    }

    /// The recorded error, if any.
    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    /// Whether an error has been recorded.
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Clear the recorded error.
    pub fn clear_error(&mut self) {
        self.error = None;
    }

    // ---- cancellation ----

    /// Install the cancellation flag for this execution. Custom actions may
    /// poll it through [`ExecutionContext::is_cancelled`].
    pub fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>) {
        self.cancel_flag = Some(flag);
    }

    /// The installed cancellation flag, if any.
    pub fn cancel_flag(&self) -> Option<Arc<AtomicBool>> {
        self.cancel_flag.clone()
    }

    /// Whether this execution has been asked to stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    // ---- tracing ----

    /// Turn on execution tracing. Every subsequent step is mirrored into the
    /// trace together with variable snapshots taken by the executor.
    pub fn enable_tracing(&mut self) {
        if self.trace.is_none() {
            self.trace = Some(ExecutionTrace::new());
        }
    }

    /// Whether tracing is enabled.
    pub fn tracing_enabled(&self) -> bool {
        self.trace.is_some()
    }

    /// The accumulated trace, if tracing is enabled.
    pub fn trace(&self) -> Option<&ExecutionTrace> {
        self.trace.as_ref()
    }

    /// Mutable access to the trace for the executor's snapshots.
    pub fn trace_mut(&mut self) -> Option<&mut ExecutionTrace> {
        self.trace.as_mut()
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("variables", &self.variables.keys().collect::<Vec<_>>())
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .field("depth", &self.depth)
            .field("current_rule_id", &self.current_rule_id)
            .field("has_error", &self.has_error())
            .field("steps", &self.history.len())
            .finish()
    }
}
