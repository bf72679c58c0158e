//! Composable pre-execution configuration checks.
//!
//! Every validator inspects the full configuration and returns a
//! [`ValidationResult`] of coded issues. A [`CompositeValidator`] chains
//! them, merging results and optionally short-circuiting after the first
//! validator that produces an error. Validation is pure: running a chain
//! twice over the same configuration yields the same issues.

pub mod circular;
pub mod conditional;
pub mod cycle;
pub mod duplicate;
pub mod reachability;
pub mod reference;

pub use circular::CircularDependencyValidator;
pub use conditional::ConditionalActionValidator;
pub use cycle::CycleDetector;
pub use duplicate::DuplicateActionValidator;
pub use reachability::ReachabilityValidator;
pub use reference::ReferenceValidator;

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, error, info};

use crate::model::RuleEngineConfig;

/// Issue severity. Only errors make a configuration invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    /// Configuration cannot be executed.
    Error,
    /// Suspicious but executable.
    Warning,
    /// Informational note.
    Info,
}

impl fmt::Display for ValidationSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValidationSeverity::Error => "ERROR",
            ValidationSeverity::Warning => "WARNING",
            ValidationSeverity::Info => "INFO",
        })
    }
}

/// One coded finding.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity of the finding.
    pub severity: ValidationSeverity,
    /// Stable machine-readable code (e.g. `REF-004`).
    pub code: String,
    /// Human-readable description.
    pub message: String,
    /// Optional key=value location context.
    pub context: Option<String>,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code, self.message)?;
        if let Some(context) = &self.context {
            write!(f, " ({})", context)?;
        }
        Ok(())
    }
}

/// Accumulated findings of one or more validators.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error.
    pub fn add_error(&mut self, code: impl Into<String>, message: impl Into<String>) {
        self.push(ValidationSeverity::Error, code, message, None);
    }

    /// Record an error with location context.
    pub fn add_error_with_context(
        &mut self,
        code: impl Into<String>,
        message: impl Into<String>,
        context: impl Into<String>,
    ) {
        self.push(ValidationSeverity::Error, code, message, Some(context.into()));
    }

    /// Record a warning.
    pub fn add_warning(&mut self, code: impl Into<String>, message: impl Into<String>) {
        self.push(ValidationSeverity::Warning, code, message, None);
    }

    /// Record a warning with location context.
    pub fn add_warning_with_context(
        &mut self,
        code: impl Into<String>,
        message: impl Into<String>,
        context: impl Into<String>,
    ) {
        self.push(
            ValidationSeverity::Warning,
            code,
            message,
            Some(context.into()),
        );
    }

    /// Record an informational note.
    pub fn add_info(&mut self, code: impl Into<String>, message: impl Into<String>) {
        self.push(ValidationSeverity::Info, code, message, None);
    }

    fn push(
        &mut self,
        severity: ValidationSeverity,
        code: impl Into<String>,
        message: impl Into<String>,
        context: Option<String>,
    ) {
        self.issues.push(ValidationIssue {
            severity,
            code: code.into(),
            message: message.into(),
            context,
        });
    }

    /// Absorb another result's issues.
    pub fn merge(&mut self, other: ValidationResult) {
        self.issues.extend(other.issues);
    }

    /// All issues, in recording order.
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Issues of a given severity.
    pub fn issues_with_severity(
        &self,
        severity: ValidationSeverity,
    ) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(move |issue| issue.severity == severity)
    }

    /// Whether any errors were recorded.
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Whether any warnings were recorded.
    pub fn has_warnings(&self) -> bool {
        self.warning_count() > 0
    }

    /// Valid means error-free; warnings and notes do not invalidate.
    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    /// Number of errors.
    pub fn error_count(&self) -> usize {
        self.issues_with_severity(ValidationSeverity::Error).count()
    }

    /// Number of warnings.
    pub fn warning_count(&self) -> usize {
        self.issues_with_severity(ValidationSeverity::Warning).count()
    }

    /// Multi-line human-readable rendering of all issues.
    pub fn summary(&self) -> String {
        if self.issues.is_empty() {
            return String::from("validation passed with no issues");
        }
        self.issues
            .iter()
            .map(ValidationIssue::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A single configuration check.
pub trait ConfigValidator: Send + Sync {
    /// Inspect the configuration and report findings.
    fn validate(&self, config: &RuleEngineConfig) -> ValidationResult;

    /// Name used in logs and composite diagnostics.
    fn name(&self) -> &'static str;
}

/// Runs validators in registration order, merging their results.
///
/// A panicking validator is converted into a `COMP-002` error entry rather
/// than unwinding out of validation.
pub struct CompositeValidator {
    validators: Vec<Box<dyn ConfigValidator>>,
    short_circuit_on_error: bool,
}

impl CompositeValidator {
    /// Composite that runs every validator regardless of findings.
    pub fn new() -> Self {
        Self::with_short_circuit(false)
    }

    /// Composite that optionally stops after the first validator emitting an
    /// error.
    pub fn with_short_circuit(short_circuit_on_error: bool) -> Self {
        Self {
            validators: Vec::new(),
            short_circuit_on_error,
        }
    }

    /// The standard chain: references, reachability, cycles.
    pub fn default_chain(short_circuit_on_error: bool) -> Self {
        Self::with_short_circuit(short_circuit_on_error)
            .add_validator(ReferenceValidator)
            .add_validator(ReachabilityValidator)
            .add_validator(CycleDetector)
    }

    /// Append a validator to the chain.
    pub fn add_validator(mut self, validator: impl ConfigValidator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Number of validators in the chain.
    pub fn validator_count(&self) -> usize {
        self.validators.len()
    }
}

impl Default for CompositeValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidator for CompositeValidator {
    fn validate(&self, config: &RuleEngineConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if self.validators.is_empty() {
            result.add_warning("COMP-001", "No validators configured");
            return result;
        }

        info!(count = self.validators.len(), "running validators");

        for validator in &self.validators {
            let name = validator.name();
            debug!(validator = name, "running validator");

            match catch_unwind(AssertUnwindSafe(|| validator.validate(config))) {
                Ok(validator_result) => {
                    let stop =
                        self.short_circuit_on_error && validator_result.has_errors();
                    result.merge(validator_result);
                    if stop {
                        info!(validator = name, "short-circuiting validation after errors");
                        break;
                    }
                }
                Err(panic) => {
                    let message = panic_message(&panic);
                    error!(validator = name, message, "validator panicked");
                    result.add_error_with_context(
                        "COMP-002",
                        format!("Validator {} failed: {}", name, message),
                        format!("validator={}", name),
                    );
                    if self.short_circuit_on_error {
                        break;
                    }
                }
            }
        }

        debug!(
            errors = result.error_count(),
            warnings = result.warning_count(),
            "validation complete"
        );
        result
    }

    fn name(&self) -> &'static str {
        "CompositeValidator"
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("unknown panic")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config(json: &str) -> RuleEngineConfig {
        serde_json::from_str(json).unwrap()
    }

    struct PanickingValidator;

    impl ConfigValidator for PanickingValidator {
        fn validate(&self, _config: &RuleEngineConfig) -> ValidationResult {
            panic!("deliberate test panic");
        }

        fn name(&self) -> &'static str {
            "PanickingValidator"
        }
    }

    struct NoopValidator;

    impl ConfigValidator for NoopValidator {
        fn validate(&self, _config: &RuleEngineConfig) -> ValidationResult {
            ValidationResult::new()
        }

        fn name(&self) -> &'static str {
            "NoopValidator"
        }
    }

    #[test]
    fn result_counts_and_validity() {
        let mut result = ValidationResult::new();
        assert!(result.is_valid());

        result.add_warning("W-001", "odd but fine");
        result.add_info("I-001", "fyi");
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 1);

        result.add_error("E-001", "broken");
        assert!(!result.is_valid());
        assert_eq!(result.error_count(), 1);
        assert_eq!(result.issues().len(), 3);
    }

    #[test]
    fn merge_concatenates_issues() {
        let mut a = ValidationResult::new();
        a.add_error("E-001", "x");
        let mut b = ValidationResult::new();
        b.add_warning("W-001", "y");

        a.merge(b);
        assert_eq!(a.issues().len(), 2);
        assert!(a.has_errors());
        assert!(a.has_warnings());
    }

    #[test]
    fn summary_renders_codes_and_context() {
        let mut result = ValidationResult::new();
        result.add_error_with_context("E-001", "broken thing", "ruleId=r1");
        let summary = result.summary();
        assert!(summary.contains("[ERROR] E-001"));
        assert!(summary.contains("ruleId=r1"));
    }

    #[test]
    fn empty_composite_warns() {
        let composite = CompositeValidator::new();
        let config = minimal_config(r#"{"entryPoint": "a", "rules": [{"ruleId": "a"}]}"#);
        let result = composite.validate(&config);
        assert!(result.issues().iter().any(|issue| issue.code == "COMP-001"));
    }

    #[test]
    fn panicking_validator_becomes_comp_002() {
        let composite = CompositeValidator::new()
            .add_validator(PanickingValidator)
            .add_validator(NoopValidator);
        let config = minimal_config(r#"{"entryPoint": "a", "rules": [{"ruleId": "a"}]}"#);

        let result = composite.validate(&config);
        let issue = result
            .issues()
            .iter()
            .find(|issue| issue.code == "COMP-002")
            .expect("COMP-002 issue");
        assert!(issue.message.contains("deliberate test panic"));
    }

    #[test]
    fn short_circuit_stops_after_errors() {
        struct FailingValidator;
        impl ConfigValidator for FailingValidator {
            fn validate(&self, _config: &RuleEngineConfig) -> ValidationResult {
                let mut result = ValidationResult::new();
                result.add_error("E-XXX", "first failure");
                result
            }
            fn name(&self) -> &'static str {
                "FailingValidator"
            }
        }

        struct CountingValidator(std::sync::Arc<std::sync::atomic::AtomicUsize>);
        impl ConfigValidator for CountingValidator {
            fn validate(&self, _config: &RuleEngineConfig) -> ValidationResult {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                ValidationResult::new()
            }
            fn name(&self) -> &'static str {
                "CountingValidator"
            }
        }

        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let composite = CompositeValidator::with_short_circuit(true)
            .add_validator(FailingValidator)
            .add_validator(CountingValidator(std::sync::Arc::clone(&calls)));

        let config = minimal_config(r#"{"entryPoint": "a", "rules": [{"ruleId": "a"}]}"#);
        let result = composite.validate(&config);
        assert!(result.has_errors());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn default_chain_validates_a_clean_config() {
        let config = minimal_config(
            r#"{
                "entryPoint": "start",
                "rules": [
                    {"ruleId": "start", "transitions": [{"condition": "true", "targetRule": "end"}]},
                    {"ruleId": "end", "terminal": true}
                ]
            }"#,
        );
        let result = CompositeValidator::default_chain(true).validate(&config);
        assert!(result.is_valid(), "unexpected issues: {}", result.summary());
    }

    #[test]
    fn validation_is_idempotent() {
        let config = minimal_config(
            r#"{
                "entryPoint": "start",
                "rules": [
                    {"ruleId": "start", "transitions": [{"condition": "x", "targetRule": "loop"}]},
                    {"ruleId": "loop", "transitions": [{"condition": "y", "targetRule": "start"}]},
                    {"ruleId": "island"}
                ]
            }"#,
        );
        let chain = CompositeValidator::default_chain(false);
        let first = chain.validate(&config);
        let second = chain.validate(&config);
        assert_eq!(first.issues().len(), second.issues().len());
        for (a, b) in first.issues().iter().zip(second.issues()) {
            assert_eq!(a.code, b.code);
            assert_eq!(a.severity, b.severity);
        }
    }
}
