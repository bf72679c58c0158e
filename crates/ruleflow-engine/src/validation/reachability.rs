//! Reachability analysis: rules no execution can ever reach.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use super::{ConfigValidator, ValidationResult};
use crate::model::RuleEngineConfig;

/// BFS from the entry point over transition and error-handler edges.
/// Unreachable rules are warnings: they are dead weight, not a hazard.
///
/// Codes: `REACH-002`..`REACH-005`.
pub struct ReachabilityValidator;

impl ConfigValidator for ReachabilityValidator {
    fn validate(&self, config: &RuleEngineConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        let entry_point = config.entry_point.trim();
        if entry_point.is_empty() {
            result.add_warning(
                "REACH-002",
                "Cannot check reachability: entry point is not specified",
            );
            return result;
        }
        if !config.has_rule(entry_point) {
            result.add_error(
                "REACH-003",
                format!(
                    "Cannot check reachability: entry point rule does not exist: {}",
                    entry_point
                ),
            );
            return result;
        }

        let graph = build_rule_graph(config);
        let reachable = reachable_from(entry_point, &graph);
        debug!(
            reachable = reachable.len(),
            total = config.rule_count(),
            "reachability analysis complete"
        );

        let mut unreachable: Vec<&str> = config
            .rule_ids()
            .into_iter()
            .filter(|rule_id| !reachable.contains(*rule_id))
            .collect();
        unreachable.sort_unstable();

        if unreachable.is_empty() {
            result.add_info("REACH-005", "All rules are reachable from entry point");
        } else {
            result.add_warning_with_context(
                "REACH-004",
                format!(
                    "Found {} unreachable rule(s): {}",
                    unreachable.len(),
                    unreachable.join(", ")
                ),
                format!("unreachableRules={}", unreachable.join(",")),
            );
        }

        result
    }

    fn name(&self) -> &'static str {
        "ReachabilityValidator"
    }
}

/// Directed rule graph: transition targets plus action error-handler
/// targets. A configured default error rule is reachable from anywhere an
/// action can fail, which the analysis models as a virtual edge from the
/// entry point.
pub(crate) fn build_rule_graph(config: &RuleEngineConfig) -> HashMap<String, HashSet<String>> {
    let mut graph: HashMap<String, HashSet<String>> = HashMap::new();

    for rule in &config.rules {
        let targets = graph.entry(rule.rule_id.clone()).or_default();
        for transition in &rule.transitions {
            if !transition.target_rule.is_empty() {
                targets.insert(transition.target_rule.clone());
            }
        }
        for action in &rule.actions {
            if let Some(handler) = &action.on_error {
                if !handler.target_rule.is_empty() {
                    targets.insert(handler.target_rule.clone());
                }
            }
        }
    }

    if config.global_settings.has_default_error_rule() {
        if let Some(default_error_rule) = &config.global_settings.default_error_rule {
            graph
                .entry(config.entry_point.clone())
                .or_default()
                .insert(default_error_rule.clone());
        }
    }

    graph
}

fn reachable_from(start: &str, graph: &HashMap<String, HashSet<String>>) -> HashSet<String> {
    let mut reachable = HashSet::new();
    let mut queue = VecDeque::new();

    reachable.insert(start.to_owned());
    queue.push_back(start.to_owned());

    while let Some(current) = queue.pop_front() {
        if let Some(neighbors) = graph.get(&current) {
            for neighbor in neighbors {
                if reachable.insert(neighbor.clone()) {
                    queue.push_back(neighbor.clone());
                }
            }
        }
    }

    reachable
}
