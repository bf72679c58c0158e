//! Lint-style checks over action guard conditions.

use super::{ConfigValidator, ValidationResult};
use crate::model::RuleEngineConfig;

/// Flags conditions that parse but almost certainly do not mean what the
/// author intended: empty strings, a single `=` where `==` was meant, mixed
/// `&&`/`||` without parentheses. Unbalanced parentheses are outright
/// errors.
///
/// Codes: `COND-001`..`COND-004`.
pub struct ConditionalActionValidator;

impl ConfigValidator for ConditionalActionValidator {
    fn validate(&self, config: &RuleEngineConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        for rule in &config.rules {
            for action in &rule.actions {
                let Some(condition) = &action.condition else {
                    continue;
                };
                let condition = condition.trim();
                let context = format!("ruleId={}, actionId={}", rule.rule_id, action.action_id);

                if condition.is_empty() {
                    result.add_warning_with_context(
                        "COND-001",
                        "Action has empty condition string",
                        context,
                    );
                    continue;
                }

                if has_single_equals(condition) {
                    result.add_warning_with_context(
                        "COND-002",
                        format!(
                            "Action condition may contain assignment (=) instead of \
                             comparison (==). Check: {}",
                            condition
                        ),
                        context.clone(),
                    );
                }

                if has_unbalanced_parentheses(condition) {
                    result.add_error_with_context(
                        "COND-003",
                        "Action condition has unbalanced parentheses",
                        context.clone(),
                    );
                }

                if condition.contains("&&")
                    && condition.contains("||")
                    && !condition.contains('(')
                {
                    result.add_warning_with_context(
                        "COND-004",
                        "Condition mixes && and || without parentheses. \
                         Consider adding parentheses for clarity.",
                        context,
                    );
                }
            }
        }

        result
    }

    fn name(&self) -> &'static str {
        "ConditionalActionValidator"
    }
}

/// A `=` left over after stripping the two-character comparison operators is
/// almost certainly a typo for `==`.
fn has_single_equals(condition: &str) -> bool {
    condition
        .replace("==", "")
        .replace("!=", "")
        .replace("<=", "")
        .replace(">=", "")
        .contains('=')
}

fn has_unbalanced_parentheses(condition: &str) -> bool {
    let mut open = 0i32;
    for ch in condition.chars() {
        match ch {
            '(' => open += 1,
            ')' => {
                open -= 1;
                if open < 0 {
                    return true;
                }
            }
            _ => {}
        }
    }
    open != 0
}
