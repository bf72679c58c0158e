//! Duplicate action ids within a rule.

use std::collections::HashMap;

use super::{ConfigValidator, ValidationResult};
use crate::model::RuleEngineConfig;

/// Two actions with the same id inside one rule make output binding and
/// error routing ambiguous, so duplicates are errors.
///
/// Code: `DUP-001`.
pub struct DuplicateActionValidator;

impl ConfigValidator for DuplicateActionValidator {
    fn validate(&self, config: &RuleEngineConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        for rule in &config.rules {
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for action in &rule.actions {
                *counts.entry(action.action_id.as_str()).or_default() += 1;
            }

            let mut duplicates: Vec<(&str, usize)> = counts
                .into_iter()
                .filter(|(_, count)| *count > 1)
                .collect();
            duplicates.sort_unstable();

            for (action_id, count) in duplicates {
                result.add_error_with_context(
                    "DUP-001",
                    format!(
                        "Duplicate action ID '{}' found {} times in rule: {}",
                        action_id, count, rule.rule_id
                    ),
                    format!("ruleId={}, actionId={}", rule.rule_id, action_id),
                );
            }
        }

        result
    }

    fn name(&self) -> &'static str {
        "DuplicateActionValidator"
    }
}
