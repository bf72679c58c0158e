//! Reference integrity: every rule id mentioned anywhere must exist.

use std::collections::HashSet;

use tracing::debug;

use super::{ConfigValidator, ValidationResult};
use crate::model::{ActionDefinition, RuleDefinition, RuleEngineConfig, TransitionDefinition};

/// Checks entry point, transition targets, action error handlers, and the
/// default error rule against the set of defined rules. Also warns about
/// non-terminal rules with no way out.
///
/// Codes: `REF-002`..`REF-010`.
pub struct ReferenceValidator;

impl ConfigValidator for ReferenceValidator {
    fn validate(&self, config: &RuleEngineConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        let defined: HashSet<&str> = config.rule_ids().into_iter().collect();
        if defined.is_empty() {
            result.add_error("REF-002", "No rules defined in configuration");
            return result;
        }
        debug!(rules = defined.len(), "checking references");

        self.check_entry_point(config, &defined, &mut result);
        for rule in &config.rules {
            self.check_rule(rule, &defined, &mut result);
        }
        self.check_default_error_rule(config, &defined, &mut result);

        result
    }

    fn name(&self) -> &'static str {
        "ReferenceValidator"
    }
}

impl ReferenceValidator {
    fn check_entry_point(
        &self,
        config: &RuleEngineConfig,
        defined: &HashSet<&str>,
        result: &mut ValidationResult,
    ) {
        let entry_point = config.entry_point.trim();
        if entry_point.is_empty() {
            result.add_error("REF-003", "Entry point is not specified");
            return;
        }
        if !defined.contains(entry_point) {
            result.add_error_with_context(
                "REF-004",
                format!("Entry point rule does not exist: {}", entry_point),
                format!("entryPoint={}", entry_point),
            );
        }
    }

    fn check_rule(
        &self,
        rule: &RuleDefinition,
        defined: &HashSet<&str>,
        result: &mut ValidationResult,
    ) {
        for transition in &rule.transitions {
            self.check_transition(&rule.rule_id, transition, defined, result);
        }
        for action in &rule.actions {
            self.check_action_error_handler(&rule.rule_id, action, defined, result);
        }

        if !rule.terminal && !rule.has_transitions() {
            result.add_warning_with_context(
                "REF-005",
                "Non-terminal rule has no transitions, may cause execution to stop",
                format!("ruleId={}", rule.rule_id),
            );
        }
    }

    fn check_transition(
        &self,
        source_rule: &str,
        transition: &TransitionDefinition,
        defined: &HashSet<&str>,
        result: &mut ValidationResult,
    ) {
        if transition.condition.trim().is_empty() {
            result.add_error_with_context(
                "REF-006",
                "Transition has empty condition",
                format!(
                    "sourceRule={}, targetRule={}",
                    source_rule, transition.target_rule
                ),
            );
        }

        let target = transition.target_rule.trim();
        if target.is_empty() {
            result.add_error_with_context(
                "REF-006",
                "Transition has empty target rule",
                format!("sourceRule={}, condition={}", source_rule, transition.condition),
            );
            return;
        }
        if !defined.contains(target) {
            result.add_error_with_context(
                "REF-007",
                format!("Transition references non-existent rule: {}", target),
                format!("sourceRule={}, targetRule={}", source_rule, target),
            );
        }
    }

    fn check_action_error_handler(
        &self,
        rule_id: &str,
        action: &ActionDefinition,
        defined: &HashSet<&str>,
        result: &mut ValidationResult,
    ) {
        let Some(handler) = &action.on_error else {
            return;
        };

        let target = handler.target_rule.trim();
        if target.is_empty() {
            result.add_error_with_context(
                "REF-008",
                "Action error handler has empty target rule",
                format!("ruleId={}, actionId={}", rule_id, action.action_id),
            );
            return;
        }
        if !defined.contains(target) {
            result.add_error_with_context(
                "REF-009",
                format!("Action error handler references non-existent rule: {}", target),
                format!(
                    "ruleId={}, actionId={}, errorHandlerTarget={}",
                    rule_id, action.action_id, target
                ),
            );
        }
    }

    fn check_default_error_rule(
        &self,
        config: &RuleEngineConfig,
        defined: &HashSet<&str>,
        result: &mut ValidationResult,
    ) {
        if !config.global_settings.has_default_error_rule() {
            return;
        }
        let default_error_rule = config
            .global_settings
            .default_error_rule
            .as_deref()
            .unwrap_or_default();
        if !defined.contains(default_error_rule) {
            result.add_error_with_context(
                "REF-010",
                format!("Default error rule does not exist: {}", default_error_rule),
                format!("defaultErrorRule={}", default_error_rule),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(json: &str) -> ValidationResult {
        let config: RuleEngineConfig = serde_json::from_str(json).unwrap();
        ReferenceValidator.validate(&config)
    }

    fn codes(result: &ValidationResult) -> Vec<&str> {
        result.issues().iter().map(|issue| issue.code.as_str()).collect()
    }

    #[test]
    fn clean_config_passes() {
        let result = validate(
            r#"{
                "entryPoint": "a",
                "rules": [
                    {"ruleId": "a", "transitions": [{"condition": "x > 1", "targetRule": "b"}]},
                    {"ruleId": "b", "terminal": true}
                ]
            }"#,
        );
        assert!(result.is_valid(), "{}", result.summary());
    }

    #[test]
    fn no_rules_is_ref_002() {
        let result = validate(r#"{"entryPoint": "a", "rules": []}"#);
        assert!(codes(&result).contains(&"REF-002"));
    }

    #[test]
    fn missing_entry_point_is_ref_003() {
        let result = validate(r#"{"rules": [{"ruleId": "a", "terminal": true}]}"#);
        assert!(codes(&result).contains(&"REF-003"));
    }

    #[test]
    fn unknown_entry_point_is_ref_004() {
        let result = validate(
            r#"{"entryPoint": "ghost", "rules": [{"ruleId": "a", "terminal": true}]}"#,
        );
        assert!(codes(&result).contains(&"REF-004"));
    }

    #[test]
    fn dangling_transition_is_ref_007() {
        let result = validate(
            r#"{
                "entryPoint": "a",
                "rules": [
                    {"ruleId": "a", "transitions": [{"condition": "true", "targetRule": "ghost"}]}
                ]
            }"#,
        );
        assert!(codes(&result).contains(&"REF-007"));
    }

    #[test]
    fn empty_transition_condition_is_ref_006() {
        let result = validate(
            r#"{
                "entryPoint": "a",
                "rules": [
                    {"ruleId": "a", "transitions": [{"condition": "  ", "targetRule": "a"}]}
                ]
            }"#,
        );
        assert!(codes(&result).contains(&"REF-006"));
    }

    #[test]
    fn dangling_error_handler_is_ref_009() {
        let result = validate(
            r#"{
                "entryPoint": "a",
                "rules": [{
                    "ruleId": "a",
                    "terminal": true,
                    "actions": [{
                        "actionId": "x",
                        "type": "SCRIPT",
                        "onError": {"targetRule": "ghost"}
                    }]
                }]
            }"#,
        );
        assert!(codes(&result).contains(&"REF-009"));
    }

    #[test]
    fn dangling_default_error_rule_is_ref_010() {
        let result = validate(
            r#"{
                "entryPoint": "a",
                "globalSettings": {"defaultErrorRule": "ghost"},
                "rules": [{"ruleId": "a", "terminal": true}]
            }"#,
        );
        assert!(codes(&result).contains(&"REF-010"));
    }

    #[test]
    fn dead_end_rule_is_ref_005_warning() {
        let result = validate(
            r#"{"entryPoint": "a", "rules": [{"ruleId": "a"}]}"#,
        );
        assert!(result.is_valid());
        assert!(codes(&result).contains(&"REF-005"));
    }

    #[test]
    fn terminal_rule_without_transitions_is_fine() {
        let result = validate(
            r#"{"entryPoint": "a", "rules": [{"ruleId": "a", "terminal": true}]}"#,
        );
        assert!(result.issues().is_empty(), "{}", result.summary());
    }
}
