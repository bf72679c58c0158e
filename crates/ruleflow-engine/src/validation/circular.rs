//! Circular variable dependencies among a rule's action outputs.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use ruleflow_value::Value;

use super::{ConfigValidator, ValidationResult};
use crate::model::{ActionDefinition, RuleDefinition, RuleEngineConfig};

/// Per rule, each action's output variable depends on the variables its
/// `${var}` config placeholders and its output expression reference. A cycle
/// among variables produced in the same rule can never be satisfied by any
/// execution order, so it is an error.
///
/// Code: `CIRC-001`.
pub struct CircularDependencyValidator;

impl ConfigValidator for CircularDependencyValidator {
    fn validate(&self, config: &RuleEngineConfig) -> ValidationResult {
        let mut result = ValidationResult::new();
        for rule in &config.rules {
            check_rule(rule, &mut result);
        }
        result
    }

    fn name(&self) -> &'static str {
        "CircularDependencyValidator"
    }
}

fn check_rule(rule: &RuleDefinition, result: &mut ValidationResult) {
    let mut graph: HashMap<&str, HashSet<String>> = HashMap::new();
    for action in &rule.actions {
        let Some(output) = action.output_variable.as_deref() else {
            continue;
        };
        graph.insert(output, dependencies_of(action));
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut outputs: Vec<&str> = graph.keys().copied().collect();
    outputs.sort_unstable();

    for variable in outputs {
        if !visited.contains(variable) {
            find_cycle(variable, &graph, &mut visited, &mut Vec::new(), rule, result);
        }
    }
}

/// Variables an action reads: `${var}` placeholders anywhere in its config
/// (recursively through nested maps and string values) plus those in its
/// output expression.
fn dependencies_of(action: &ActionDefinition) -> HashSet<String> {
    let mut dependencies = HashSet::new();
    for value in action.config.values() {
        collect_from_value(value, &mut dependencies);
    }
    if let Some(expression) = &action.output_expression {
        collect_placeholders(expression, &mut dependencies);
    }
    dependencies
}

fn collect_from_value(value: &Value, dependencies: &mut HashSet<String>) {
    match value {
        Value::Text(text) => collect_placeholders(text, dependencies),
        Value::Object(entries) => {
            for nested in entries.values() {
                collect_from_value(nested, dependencies);
            }
        }
        _ => {}
    }
}

fn collect_placeholders(text: &str, dependencies: &mut HashSet<String>) {
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        dependencies.insert(after[..end].to_owned());
        rest = &after[end + 1..];
    }
}

fn find_cycle<'r>(
    variable: &'r str,
    graph: &HashMap<&'r str, HashSet<String>>,
    visited: &mut HashSet<&'r str>,
    path: &mut Vec<&'r str>,
    rule: &RuleDefinition,
    result: &mut ValidationResult,
) -> bool {
    if let Some(position) = path.iter().position(|node| *node == variable) {
        let mut cycle: Vec<&str> = path[position..].to_vec();
        cycle.push(variable);
        let rendered = cycle.join(" -> ");
        debug!(rule = %rule.rule_id, cycle = %rendered, "circular variable dependency");
        result.add_error_with_context(
            "CIRC-001",
            format!(
                "Circular variable dependency detected in rule {}: {}",
                rule.rule_id, rendered
            ),
            format!("ruleId={}, cycle={}", rule.rule_id, cycle.join(",")),
        );
        return true;
    }

    if visited.contains(variable) {
        return false;
    }
    visited.insert(variable);
    path.push(variable);

    let mut found = false;
    if let Some(dependencies) = graph.get(variable) {
        let mut sorted: Vec<&String> = dependencies.iter().collect();
        sorted.sort_unstable();
        for dependency in sorted {
            // Only variables produced inside this rule participate.
            if let Some((&key, _)) = graph.get_key_value(dependency.as_str()) {
                if find_cycle(key, graph, visited, path, rule, result) {
                    found = true;
                    break;
                }
            }
        }
    }

    path.pop();
    found
}
