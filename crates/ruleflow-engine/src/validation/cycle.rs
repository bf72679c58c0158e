//! Cycle detection over the rule graph.

use std::collections::HashMap;

use tracing::debug;

use super::reachability::build_rule_graph;
use super::{ConfigValidator, ValidationResult};
use crate::model::RuleEngineConfig;

/// Three-color DFS over the rule graph; every gray-to-gray back edge yields
/// one cycle slice. Cycles are warnings, not errors: loops are a legitimate
/// pattern as long as a guard eventually breaks them.
///
/// The traversal keeps an explicit work list, so pathological configurations
/// cannot overflow the stack.
///
/// Codes: `CYCLE-002`..`CYCLE-005`.
pub struct CycleDetector;

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Gray,
    Black,
}

struct Frame {
    node: String,
    neighbors: Vec<String>,
    next: usize,
}

impl ConfigValidator for CycleDetector {
    fn validate(&self, config: &RuleEngineConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if config.rule_count() == 0 {
            result.add_warning("CYCLE-002", "No rules to validate");
            return result;
        }

        let graph = build_rule_graph(config);
        let mut colors: HashMap<String, Color> = config
            .rule_ids()
            .into_iter()
            .map(|rule_id| (rule_id.to_owned(), Color::White))
            .collect();

        let mut cycles: Vec<Vec<String>> = Vec::new();
        for rule in &config.rules {
            if colors.get(rule.rule_id.as_str()).copied() == Some(Color::White) {
                collect_cycles(&rule.rule_id, &graph, &mut colors, &mut cycles);
            }
        }

        if cycles.is_empty() {
            result.add_info("CYCLE-003", "No cycles detected in rule graph");
            debug!("no cycles found");
        } else {
            result.add_warning_with_context(
                "CYCLE-004",
                format!(
                    "Found {} cycle(s) in rule graph. This may lead to infinite loops \
                     if conditions are not properly designed.",
                    cycles.len()
                ),
                format!("cycles={}", format_cycles(&cycles)),
            );
            for (index, cycle) in cycles.iter().enumerate() {
                result.add_warning_with_context(
                    "CYCLE-005",
                    format!("Cycle {}: {}", index + 1, cycle.join(" -> ")),
                    format!("cycleRules={}", cycle.join(",")),
                );
            }
        }

        result
    }

    fn name(&self) -> &'static str {
        "CycleDetector"
    }
}

fn collect_cycles(
    start: &str,
    graph: &HashMap<String, std::collections::HashSet<String>>,
    colors: &mut HashMap<String, Color>,
    cycles: &mut Vec<Vec<String>>,
) {
    let mut stack = vec![frame(start, graph)];
    let mut path = vec![start.to_owned()];
    set_color(colors, start, Color::Gray);

    while let Some(top) = stack.last_mut() {
        if top.next < top.neighbors.len() {
            let neighbor = top.neighbors[top.next].clone();
            top.next += 1;

            match colors.get(neighbor.as_str()).copied() {
                // Dangling target; reference validation reports it.
                None => {}
                Some(Color::Gray) => {
                    // Back edge: the cycle runs from the neighbor's position
                    // in the current path back to itself.
                    if let Some(position) = path.iter().position(|node| *node == neighbor) {
                        let mut cycle: Vec<String> = path[position..].to_vec();
                        cycle.push(neighbor);
                        debug!(cycle = cycle.join(" -> "), "cycle detected");
                        cycles.push(cycle);
                    }
                }
                Some(Color::White) => {
                    set_color(colors, &neighbor, Color::Gray);
                    path.push(neighbor.clone());
                    stack.push(frame(&neighbor, graph));
                }
                Some(Color::Black) => {}
            }
        } else {
            let finished = stack.pop().expect("non-empty stack");
            set_color(colors, &finished.node, Color::Black);
            path.pop();
        }
    }
}

fn frame(node: &str, graph: &HashMap<String, std::collections::HashSet<String>>) -> Frame {
    let mut neighbors: Vec<String> = graph
        .get(node)
        .map(|targets| targets.iter().cloned().collect())
        .unwrap_or_default();
    neighbors.sort_unstable();
    Frame {
        node: node.to_owned(),
        neighbors,
        next: 0,
    }
}

fn set_color(colors: &mut HashMap<String, Color>, node: &str, color: Color) {
    if let Some(entry) = colors.get_mut(node) {
        *entry = color;
    }
}

fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|cycle| cycle.join(" -> "))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(json: &str) -> ValidationResult {
        let config: RuleEngineConfig = serde_json::from_str(json).unwrap();
        CycleDetector.validate(&config)
    }

    fn codes(result: &ValidationResult) -> Vec<&str> {
        result.issues().iter().map(|issue| issue.code.as_str()).collect()
    }

    #[test]
    fn acyclic_graph_reports_info() {
        let result = validate(
            r#"{
                "entryPoint": "a",
                "rules": [
                    {"ruleId": "a", "transitions": [{"condition": "t", "targetRule": "b"}]},
                    {"ruleId": "b", "terminal": true}
                ]
            }"#,
        );
        assert!(codes(&result).contains(&"CYCLE-003"));
        assert!(result.is_valid());
    }

    #[test]
    fn self_loop_is_reported() {
        let result = validate(
            r#"{
                "entryPoint": "a",
                "rules": [
                    {"ruleId": "a", "transitions": [{"condition": "t", "targetRule": "a"}]}
                ]
            }"#,
        );
        assert!(codes(&result).contains(&"CYCLE-004"));
        let issue = result
            .issues()
            .iter()
            .find(|issue| issue.code == "CYCLE-005")
            .unwrap();
        assert!(issue.message.contains("a -> a"));
        // Cycles are warnings only.
        assert!(result.is_valid());
    }

    #[test]
    fn two_node_cycle_is_reported() {
        let result = validate(
            r#"{
                "entryPoint": "a",
                "rules": [
                    {"ruleId": "a", "transitions": [{"condition": "t", "targetRule": "b"}]},
                    {"ruleId": "b", "transitions": [{"condition": "t", "targetRule": "a"}]}
                ]
            }"#,
        );
        assert!(codes(&result).contains(&"CYCLE-005"));
    }

    #[test]
    fn cycle_through_error_handler_edge_is_found() {
        let result = validate(
            r#"{
                "entryPoint": "a",
                "rules": [
                    {
                        "ruleId": "a",
                        "actions": [{"actionId": "x", "type": "SCRIPT", "onError": {"targetRule": "b"}}],
                        "transitions": [{"condition": "t", "targetRule": "end"}]
                    },
                    {"ruleId": "b", "transitions": [{"condition": "t", "targetRule": "a"}]},
                    {"ruleId": "end", "terminal": true}
                ]
            }"#,
        );
        assert!(codes(&result).contains(&"CYCLE-004"));
    }

    #[test]
    fn branching_without_cycles_is_clean() {
        let result = validate(
            r#"{
                "entryPoint": "a",
                "rules": [
                    {"ruleId": "a", "transitions": [
                        {"condition": "x", "targetRule": "b"},
                        {"condition": "y", "targetRule": "c"}
                    ]},
                    {"ruleId": "b", "transitions": [{"condition": "t", "targetRule": "d"}]},
                    {"ruleId": "c", "transitions": [{"condition": "t", "targetRule": "d"}]},
                    {"ruleId": "d", "terminal": true}
                ]
            }"#,
        );
        assert!(codes(&result).contains(&"CYCLE-003"));
    }

    #[test]
    fn no_rules_warns() {
        let result = validate(r#"{"entryPoint": "a", "rules": []}"#);
        assert!(codes(&result).contains(&"CYCLE-002"));
    }
}
