//! Execution tracing: an append-only event log with derived summaries.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use ruleflow_value::Value;

use crate::context::{ExecutionStep, StepType};

/// Complete record of one traced execution.
///
/// The trace accrues every step the executor emits plus variable snapshots
/// at the start and end of the run. Everything else — metrics, the text
/// summary, the Mermaid diagram — is a pure fold over the step vector.
pub struct ExecutionTrace {
    entry_point: Option<String>,
    started: Instant,
    finished: Option<Instant>,
    steps: Vec<ExecutionStep>,
    snapshots: BTreeMap<String, HashMap<String, Value>>,
    rules_executed: Vec<String>,
    actions_executed: Vec<String>,
    success: bool,
    error_message: Option<String>,
}

impl ExecutionTrace {
    /// Start a trace at the current instant.
    pub fn new() -> Self {
        Self {
            entry_point: None,
            started: Instant::now(),
            finished: None,
            steps: Vec::new(),
            snapshots: BTreeMap::new(),
            rules_executed: Vec::new(),
            actions_executed: Vec::new(),
            success: true,
            error_message: None,
        }
    }

    /// Label the trace with the entry-point rule.
    pub fn set_entry_point(&mut self, entry_point: impl Into<String>) {
        self.entry_point = Some(entry_point.into());
    }

    /// Append a step, tracking first-occurrence rule and action order.
    pub fn record_step(&mut self, step: ExecutionStep) {
        if let Some(rule_id) = &step.rule_id {
            if !self.rules_executed.contains(rule_id) {
                self.rules_executed.push(rule_id.clone());
            }
        }
        if let Some(action_id) = &step.action_id {
            if !self.actions_executed.contains(action_id) {
                self.actions_executed.push(action_id.clone());
            }
        }
        self.steps.push(step);
    }

    /// Store a named variable snapshot (e.g. `initial-state`).
    pub fn snapshot_variables(
        &mut self,
        label: impl Into<String>,
        variables: HashMap<String, Value>,
    ) {
        self.snapshots.insert(label.into(), variables);
    }

    /// Close the trace with the final outcome.
    pub fn complete(&mut self, success: bool, error_message: Option<String>) {
        self.finished = Some(Instant::now());
        self.success = success;
        self.error_message = error_message;
    }

    /// Wall-clock duration so far (or total once completed).
    pub fn duration_ms(&self) -> u64 {
        let end = self.finished.unwrap_or_else(Instant::now);
        end.duration_since(self.started).as_millis() as u64
    }

    /// All recorded steps.
    pub fn steps(&self) -> &[ExecutionStep] {
        &self.steps
    }

    /// Rules in first-execution order.
    pub fn rules_executed(&self) -> &[String] {
        &self.rules_executed
    }

    /// Actions in first-execution order.
    pub fn actions_executed(&self) -> &[String] {
        &self.actions_executed
    }

    /// Named variable snapshots.
    pub fn variable_snapshots(&self) -> &BTreeMap<String, HashMap<String, Value>> {
        &self.snapshots
    }

    /// Whether the traced execution succeeded.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Aggregate counters: total duration, rules/actions/steps executed,
    /// accumulated per-action durations, total action time, failure count.
    pub fn metrics(&self) -> BTreeMap<String, Value> {
        let mut action_durations: BTreeMap<String, Value> = BTreeMap::new();
        let mut total_action_time: i64 = 0;
        for step in &self.steps {
            if step.step_type != StepType::ActionCompleted {
                continue;
            }
            let (Some(action_id), Some(duration)) = (&step.action_id, step.duration_ms) else {
                continue;
            };
            total_action_time += duration as i64;
            let entry = action_durations
                .entry(action_id.clone())
                .or_insert(Value::integer(0));
            if let Some(current) = entry.as_integer() {
                *entry = Value::integer(current + duration as i64);
            }
        }

        let failed_actions = self
            .steps
            .iter()
            .filter(|step| step.step_type == StepType::ActionFailed)
            .count();

        let mut metrics = BTreeMap::new();
        metrics.insert(
            "totalDurationMs".to_owned(),
            Value::integer(self.duration_ms() as i64),
        );
        metrics.insert(
            "rulesExecuted".to_owned(),
            Value::integer(self.rules_executed.len() as i64),
        );
        metrics.insert(
            "actionsExecuted".to_owned(),
            Value::integer(self.actions_executed.len() as i64),
        );
        metrics.insert(
            "stepsExecuted".to_owned(),
            Value::integer(self.steps.len() as i64),
        );
        metrics.insert(
            "actionDurations".to_owned(),
            Value::Object(action_durations),
        );
        metrics.insert(
            "totalActionTimeMs".to_owned(),
            Value::integer(total_action_time),
        );
        metrics.insert(
            "failedActions".to_owned(),
            Value::integer(failed_actions as i64),
        );
        metrics
    }

    /// Multi-line human-readable rendering of the whole trace.
    pub fn detailed_summary(&self) -> String {
        let mut out = String::new();
        out.push_str("=== Execution Trace ===\n");
        out.push_str(&format!(
            "Entry Point: {}\n",
            self.entry_point.as_deref().unwrap_or("<unset>")
        ));
        out.push_str(&format!("Duration: {}ms\n", self.duration_ms()));
        out.push_str(&format!(
            "Status: {}\n",
            if self.success { "SUCCESS" } else { "FAILED" }
        ));
        if let Some(error) = &self.error_message {
            if !self.success {
                out.push_str(&format!("Error: {}\n", error));
            }
        }

        out.push_str(&format!("\nRules Executed: {}\n", self.rules_executed.len()));
        for rule in &self.rules_executed {
            out.push_str(&format!("  - {}\n", rule));
        }

        out.push_str(&format!(
            "\nActions Executed: {}\n",
            self.actions_executed.len()
        ));
        for action in &self.actions_executed {
            out.push_str(&format!("  - {}\n", action));
        }

        out.push_str(&format!("\nExecution Steps: {}\n", self.steps.len()));
        for (index, step) in self.steps.iter().enumerate() {
            out.push_str(&format!("{:3}. [{}] ", index + 1, step.step_type));
            if let Some(rule_id) = &step.rule_id {
                out.push_str(&format!("Rule: {}", rule_id));
            }
            if let Some(action_id) = &step.action_id {
                out.push_str(&format!(", Action: {}", action_id));
            }
            if let Some(duration) = step.duration_ms {
                out.push_str(&format!(" ({}ms)", duration));
            }
            out.push('\n');
            for (key, value) in &step.metadata {
                out.push_str(&format!("     {}: {}\n", key, value));
            }
        }

        if !self.snapshots.is_empty() {
            out.push_str("\nVariable Snapshots:\n");
            for (label, variables) in &self.snapshots {
                out.push_str(&format!("  {}:\n", label));
                let mut keys: Vec<&String> = variables.keys().collect();
                keys.sort();
                for key in keys {
                    out.push_str(&format!("    {} = {}\n", key, variables[key]));
                }
            }
        }

        out
    }

    /// Render the executed path as a Mermaid flow diagram.
    pub fn to_mermaid_diagram(&self) -> String {
        let mut out = String::new();
        out.push_str("```mermaid\ngraph TD\n");
        out.push_str(&format!(
            "    Start[\"Entry: {}\"]\n",
            self.entry_point.as_deref().unwrap_or("?")
        ));

        let mut last_node = String::from("Start");
        let mut node_id = 0usize;
        let mut pending_edge_label: Option<String> = None;

        for step in &self.steps {
            match step.step_type {
                StepType::RuleEntered => {
                    node_id += 1;
                    let node = format!("N{}", node_id);
                    out.push_str(&format!(
                        "    {}[\"Rule: {}\"]\n",
                        node,
                        step.rule_id.as_deref().unwrap_or("?")
                    ));
                    match pending_edge_label.take() {
                        Some(label) => out.push_str(&format!(
                            "    {} -->|\"{}\"| {}\n",
                            last_node, label, node
                        )),
                        None => out.push_str(&format!("    {} --> {}\n", last_node, node)),
                    }
                    last_node = node;
                }
                StepType::ActionCompleted => {
                    node_id += 1;
                    let node = format!("N{}", node_id);
                    out.push_str(&format!(
                        "    {}{{{{\"Action: {} ({}ms)\"}}}}\n",
                        node,
                        step.action_id.as_deref().unwrap_or("?"),
                        step.duration_ms.unwrap_or(0)
                    ));
                    out.push_str(&format!("    {} --> {}\n", last_node, node));
                    last_node = node;
                }
                StepType::ActionFailed => {
                    node_id += 1;
                    let node = format!("N{}", node_id);
                    out.push_str(&format!(
                        "    {}[\"Action Failed: {}\"]\n",
                        node,
                        step.action_id.as_deref().unwrap_or("?")
                    ));
                    out.push_str(&format!("    {} -->|Error| {}\n", last_node, node));
                    out.push_str(&format!("    style {} fill:#f99\n", node));
                    last_node = node;
                }
                StepType::TransitionEvaluated => {
                    let truthy = step
                        .metadata
                        .get("result")
                        .and_then(Value::as_bool)
                        .unwrap_or(false);
                    if truthy {
                        if let Some(condition) = step.metadata.get("condition") {
                            pending_edge_label = Some(format!("{} = true", condition));
                        }
                    }
                }
                _ => {}
            }
        }

        out.push_str(&format!(
            "    End[\"{}\"]\n",
            if self.success { "Success" } else { "Failed" }
        ));
        out.push_str(&format!("    {} --> End\n", last_node));
        out.push_str(&format!(
            "    style End fill:{}\n",
            if self.success { "#9f9" } else { "#f99" }
        ));
        out.push_str("```\n");
        out
    }
}

impl Default for ExecutionTrace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(step_type: StepType) -> crate::context::ExecutionStepBuilder {
        ExecutionStep::builder(step_type)
    }

    fn sample_trace() -> ExecutionTrace {
        let mut trace = ExecutionTrace::new();
        trace.set_entry_point("validate");
        trace.record_step(step(StepType::RuleEntered).rule_id("validate").build());
        trace.record_step(
            step(StepType::ActionCompleted)
                .rule_id("validate")
                .action_id("check")
                .duration_ms(4)
                .metadata("success", true)
                .build(),
        );
        trace.record_step(
            step(StepType::ActionCompleted)
                .rule_id("validate")
                .action_id("check")
                .duration_ms(6)
                .build(),
        );
        trace.record_step(step(StepType::RuleExited).rule_id("validate").build());
        trace.record_step(
            step(StepType::TransitionEvaluated)
                .rule_id("validate")
                .metadata("condition", "age >= 18")
                .metadata("result", true)
                .metadata("targetRule", "approve")
                .build(),
        );
        trace.record_step(step(StepType::RuleEntered).rule_id("approve").build());
        trace.record_step(
            step(StepType::ActionFailed)
                .rule_id("approve")
                .action_id("notify")
                .duration_ms(2)
                .build(),
        );
        trace.complete(true, None);
        trace
    }

    #[test]
    fn first_occurrence_orders() {
        let trace = sample_trace();
        assert_eq!(trace.rules_executed(), &["validate", "approve"]);
        assert_eq!(trace.actions_executed(), &["check", "notify"]);
    }

    #[test]
    fn metrics_fold_over_steps() {
        let trace = sample_trace();
        let metrics = trace.metrics();
        assert_eq!(metrics["rulesExecuted"], Value::integer(2));
        assert_eq!(metrics["actionsExecuted"], Value::integer(2));
        assert_eq!(metrics["stepsExecuted"], Value::integer(7));
        assert_eq!(metrics["totalActionTimeMs"], Value::integer(10));
        assert_eq!(metrics["failedActions"], Value::integer(1));

        let durations = metrics["actionDurations"].as_object().unwrap();
        // Both completions of "check" accumulate.
        assert_eq!(durations["check"], Value::integer(10));
    }

    #[test]
    fn summary_contains_sections() {
        let mut trace = sample_trace();
        trace.snapshot_variables(
            "initial-state",
            HashMap::from([("age".to_owned(), Value::integer(25))]),
        );
        let summary = trace.detailed_summary();
        assert!(summary.contains("=== Execution Trace ==="));
        assert!(summary.contains("Entry Point: validate"));
        assert!(summary.contains("Status: SUCCESS"));
        assert!(summary.contains("RULE_ENTERED"));
        assert!(summary.contains("age = 25"));
    }

    #[test]
    fn mermaid_shape() {
        let diagram = sample_trace().to_mermaid_diagram();
        assert!(diagram.starts_with("```mermaid\ngraph TD\n"));
        assert!(diagram.contains("Start[\"Entry: validate\"]"));
        assert!(diagram.contains("Rule: validate"));
        assert!(diagram.contains("Action: check (4ms)"));
        assert!(diagram.contains("age >= 18 = true"));
        assert!(diagram.contains("Action Failed: notify"));
        assert!(diagram.contains("End[\"Success\"]"));
        assert!(diagram.trim_end().ends_with("```"));
    }

    #[test]
    fn failed_trace_renders_failure() {
        let mut trace = ExecutionTrace::new();
        trace.set_entry_point("a");
        trace.complete(false, Some("boom".into()));
        assert!(!trace.is_success());
        assert!(trace.detailed_summary().contains("Error: boom"));
        assert!(trace.to_mermaid_diagram().contains("End[\"Failed\"]"));
    }
}
