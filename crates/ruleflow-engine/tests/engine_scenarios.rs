//! End-to-end engine scenarios: full configurations executed through the
//! public builder API.

use std::sync::Arc;
use std::time::Duration;

use ruleflow_engine::{
    Action, ActionProvider, ActionResult, ActionCreationError, ActionDefinition, ActionError,
    ExecutionContext, RuleEngineBuilder, RuleExecutor, StepType, Value,
};

fn build(config: &str) -> RuleExecutor {
    RuleEngineBuilder::new()
        .with_config_str(config)
        .expect("config parses")
        .build()
        .expect("config builds")
}

fn ctx_with(vars: &[(&str, Value)]) -> ExecutionContext {
    let mut ctx = ExecutionContext::new();
    for (name, value) in vars {
        ctx.set_variable(*name, value.clone());
    }
    ctx
}

const VALIDATE_APPROVE_REJECT: &str = r#"{
    "entryPoint": "validate",
    "rules": [
        {
            "ruleId": "validate",
            "transitions": [
                {"condition": "age >= 18", "targetRule": "approve", "priority": 1},
                {"condition": "!(age >= 18)", "targetRule": "reject", "priority": 2}
            ]
        },
        {
            "ruleId": "approve",
            "terminal": true,
            "actions": [{
                "actionId": "set-approved",
                "type": "SCRIPT",
                "config": {"expression": "'APPROVED'"},
                "outputVariable": "status"
            }]
        },
        {
            "ruleId": "reject",
            "terminal": true,
            "actions": [{
                "actionId": "set-rejected",
                "type": "SCRIPT",
                "config": {"expression": "'REJECTED'"},
                "outputVariable": "status"
            }]
        }
    ]
}"#;

#[test]
fn adult_is_approved() {
    let executor = build(VALIDATE_APPROVE_REJECT);
    let mut ctx = ctx_with(&[("age", Value::integer(25))]);

    let result = executor.execute(&mut ctx);
    assert!(result.is_success(), "{:?}", result.error_message());
    assert_eq!(result.final_rule_id(), Some("approve"));
    assert_eq!(ctx.variable("status"), Some(&Value::text("APPROVED")));
}

#[test]
fn minor_is_rejected() {
    let executor = build(VALIDATE_APPROVE_REJECT);
    let mut ctx = ctx_with(&[("age", Value::integer(15))]);

    let result = executor.execute(&mut ctx);
    assert!(result.is_success());
    assert_eq!(result.final_rule_id(), Some("reject"));
    assert_eq!(ctx.variable("status"), Some(&Value::text("REJECTED")));
}

#[test]
fn higher_priority_transition_masks_lower_even_when_both_match() {
    // The minor guard (priority 2) is evaluated before the adult guard and
    // both would match for age >= 18 written loosely; here both guards are
    // literally true and the priority-5 one must win.
    let executor = build(
        r#"{
            "entryPoint": "pick",
            "rules": [
                {
                    "ruleId": "pick",
                    "transitions": [
                        {"condition": "true", "targetRule": "low", "priority": 1},
                        {"condition": "true", "targetRule": "high", "priority": 5}
                    ]
                },
                {"ruleId": "low", "terminal": true},
                {"ruleId": "high", "terminal": true}
            ]
        }"#,
    );
    let mut ctx = ExecutionContext::new();
    let result = executor.execute(&mut ctx);
    assert_eq!(result.final_rule_id(), Some("high"));

    // Lower-priority guards after the match are never evaluated.
    let evaluated: Vec<&str> = ctx
        .execution_history()
        .iter()
        .filter(|step| step.step_type == StepType::TransitionEvaluated)
        .filter_map(|step| step.metadata.get("targetRule"))
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(evaluated, vec!["high"]);
}

#[test]
fn equal_priorities_resolve_in_definition_order() {
    let executor = build(
        r#"{
            "entryPoint": "pick",
            "rules": [
                {
                    "ruleId": "pick",
                    "transitions": [
                        {"condition": "true", "targetRule": "first", "priority": 3},
                        {"condition": "true", "targetRule": "second", "priority": 3}
                    ]
                },
                {"ruleId": "first", "terminal": true},
                {"ruleId": "second", "terminal": true}
            ]
        }"#,
    );
    let mut ctx = ExecutionContext::new();
    assert_eq!(executor.execute(&mut ctx).final_rule_id(), Some("first"));
}

const CONDITIONAL_DISCOUNT: &str = r#"{
    "entryPoint": "price",
    "rules": [{
        "ruleId": "price",
        "terminal": true,
        "actions": [
            {
                "actionId": "discount",
                "type": "SCRIPT",
                "condition": "amount > 100",
                "config": {"expression": "amount * 0.9"},
                "outputVariable": "discountedAmount"
            },
            {
                "actionId": "total",
                "type": "SCRIPT",
                "config": {
                    "expression": "util.roundTo((discountedAmount != null ? discountedAmount : amount) * 1.1, 2)"
                },
                "outputVariable": "total"
            }
        ]
    }]
}"#;

#[test]
fn conditional_action_skipped_below_threshold() {
    let executor = build(CONDITIONAL_DISCOUNT);
    let mut ctx = ctx_with(&[("amount", Value::integer(50))]);

    let result = executor.execute(&mut ctx);
    assert!(result.is_success(), "{:?}", result.error_message());
    assert_eq!(ctx.variable("discountedAmount"), None);
    assert_eq!(ctx.variable("total"), Some(&Value::float(55.0)));

    // The skipped action never starts.
    let started: Vec<&str> = ctx
        .execution_history()
        .iter()
        .filter(|step| step.step_type == StepType::ActionStarted)
        .filter_map(|step| step.action_id.as_deref())
        .collect();
    assert_eq!(started, vec!["total"]);
}

#[test]
fn conditional_action_runs_above_threshold() {
    let executor = build(CONDITIONAL_DISCOUNT);
    let mut ctx = ctx_with(&[("amount", Value::integer(150))]);

    let result = executor.execute(&mut ctx);
    assert!(result.is_success());
    assert_eq!(ctx.variable("discountedAmount"), Some(&Value::float(135.0)));
    assert_eq!(ctx.variable("total"), Some(&Value::float(148.5)));
}

#[test]
fn depth_limit_stops_infinite_cycle() {
    let executor = RuleEngineBuilder::new()
        .with_config_str(
            r#"{
                "entryPoint": "spin",
                "globalSettings": {"maxExecutionDepth": 5},
                "rules": [{
                    "ruleId": "spin",
                    "transitions": [{"condition": "true", "targetRule": "spin"}]
                }]
            }"#,
        )
        .unwrap()
        .build()
        .unwrap();

    let mut ctx = ExecutionContext::new();
    let result = executor.execute(&mut ctx);

    assert!(!result.is_success());
    assert!(result
        .error_message()
        .unwrap()
        .contains("Maximum execution depth exceeded"));
    assert_eq!(result.final_rule_id(), Some("spin"));

    let entries = ctx
        .execution_history()
        .iter()
        .filter(|step| step.step_type == StepType::RuleEntered)
        .count();
    assert_eq!(entries, 5);
}

#[test]
fn output_expression_extracts_without_leaking_result() {
    let executor = build(
        r#"{
            "entryPoint": "fetch",
            "rules": [{
                "ruleId": "fetch",
                "terminal": true,
                "actions": [{
                    "actionId": "load-user",
                    "type": "SCRIPT",
                    "config": {
                        "expression": "util.fromJson('{\"data\": {\"user\": {\"id\": \"U1\"}}}')"
                    },
                    "outputVariable": "userId",
                    "outputExpression": "result.data.user.id"
                }]
            }]
        }"#,
    );

    let mut ctx = ExecutionContext::new();
    let result = executor.execute(&mut ctx);

    assert!(result.is_success(), "{:?}", result.error_message());
    assert_eq!(ctx.variable("userId"), Some(&Value::text("U1")));
    // The extraction helper binding never reaches the context.
    assert!(!ctx.has_variable("result"));
}

/// Test action that busy-waits until the execution is cancelled, to prove
/// the wall-clock timeout interrupts a running rule.
#[derive(Debug)]
struct SleepUntilCancelled {
    action_id: String,
}

impl Action for SleepUntilCancelled {
    fn execute(&self, ctx: &mut ExecutionContext) -> Result<ActionResult, ActionError> {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !ctx.is_cancelled() {
            if std::time::Instant::now() >= deadline {
                return Err(ActionError::new(&self.action_id, "never cancelled"));
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(ActionResult::success_empty())
    }

    fn action_type(&self) -> &str {
        "SLEEP"
    }

    fn action_id(&self) -> &str {
        &self.action_id
    }
}

struct SleepProvider;

impl ActionProvider for SleepProvider {
    fn supports(&self, action_type: &str) -> bool {
        action_type.eq_ignore_ascii_case("SLEEP")
    }

    fn create_action(
        &self,
        definition: &ActionDefinition,
    ) -> Result<Box<dyn Action>, ActionCreationError> {
        Ok(Box::new(SleepUntilCancelled {
            action_id: definition.action_id.clone(),
        }))
    }

    fn provider_name(&self) -> &str {
        "SleepProvider"
    }
}

#[test]
fn timeout_interrupts_a_stuck_rule() {
    let executor = RuleEngineBuilder::new()
        .with_config_str(
            r#"{
                "entryPoint": "stuck",
                "globalSettings": {"timeout": 50},
                "rules": [{
                    "ruleId": "stuck",
                    "actions": [{"actionId": "wait", "type": "SLEEP"}],
                    "transitions": [{"condition": "true", "targetRule": "stuck"}]
                }]
            }"#,
        )
        .unwrap()
        .register_provider(Arc::new(SleepProvider))
        .build()
        .unwrap();

    let mut ctx = ExecutionContext::new();
    let result = executor.execute(&mut ctx);

    assert!(!result.is_success());
    assert_eq!(
        result.error_message(),
        Some("Execution timed out after 50ms")
    );
    assert_eq!(result.final_rule_id(), Some("stuck"));
}

const ERROR_ROUTING_ACTION_LEVEL: &str = r#"{
    "entryPoint": "risky",
    "rules": [
        {
            "ruleId": "risky",
            "actions": [{
                "actionId": "explode",
                "type": "SCRIPT",
                "config": {"expression": "missing * 2"},
                "onError": {"targetRule": "recover"}
            }],
            "transitions": [{"condition": "true", "targetRule": "never"}]
        },
        {
            "ruleId": "recover",
            "terminal": true,
            "actions": [{
                "actionId": "mark",
                "type": "SCRIPT",
                "config": {"expression": "'RECOVERED'"},
                "outputVariable": "status"
            }]
        },
        {"ruleId": "never", "terminal": true}
    ]
}"#;

#[test]
fn action_error_routes_to_action_level_handler() {
    let executor = build(ERROR_ROUTING_ACTION_LEVEL);
    let mut ctx = ExecutionContext::new();

    let result = executor.execute(&mut ctx);
    assert!(result.is_success(), "{:?}", result.error_message());
    assert_eq!(result.final_rule_id(), Some("recover"));
    assert_eq!(ctx.variable("status"), Some(&Value::text("RECOVERED")));

    let error = ctx.error().expect("error info recorded");
    assert_eq!(error.rule_id, "risky");
    assert_eq!(error.action_id.as_deref(), Some("explode"));
    assert_eq!(error.error_type, "ACTION_ERROR");
}

#[test]
fn action_error_falls_back_to_default_error_rule() {
    let executor = build(
        r#"{
            "entryPoint": "risky",
            "globalSettings": {"defaultErrorRule": "recover"},
            "rules": [
                {
                    "ruleId": "risky",
                    "actions": [{
                        "actionId": "explode",
                        "type": "SCRIPT",
                        "config": {"expression": "missing * 2"}
                    }],
                    "transitions": [{"condition": "true", "targetRule": "never"}]
                },
                {
                    "ruleId": "recover",
                    "terminal": true,
                    "actions": [{
                        "actionId": "mark",
                        "type": "SCRIPT",
                        "config": {"expression": "'RECOVERED'"},
                        "outputVariable": "status"
                    }]
                },
                {"ruleId": "never", "terminal": true}
            ]
        }"#,
    );
    let mut ctx = ExecutionContext::new();

    let result = executor.execute(&mut ctx);
    assert!(result.is_success());
    assert_eq!(result.final_rule_id(), Some("recover"));
    assert_eq!(ctx.variable("status"), Some(&Value::text("RECOVERED")));
}

#[test]
fn unhandled_action_error_fails_the_run() {
    let executor = build(
        r#"{
            "entryPoint": "risky",
            "rules": [{
                "ruleId": "risky",
                "terminal": true,
                "actions": [{
                    "actionId": "explode",
                    "type": "SCRIPT",
                    "config": {"expression": "missing * 2"}
                }]
            }]
        }"#,
    );
    let mut ctx = ExecutionContext::new();

    let result = executor.execute(&mut ctx);
    assert!(!result.is_success());
    assert!(result
        .error_message()
        .unwrap()
        .contains("Action execution failed"));
    assert_eq!(result.final_rule_id(), Some("risky"));
}

#[test]
fn continue_on_error_keeps_going() {
    let executor = build(
        r#"{
            "entryPoint": "tolerant",
            "rules": [{
                "ruleId": "tolerant",
                "terminal": true,
                "actions": [
                    {
                        "actionId": "explode",
                        "type": "SCRIPT",
                        "config": {"expression": "missing * 2"},
                        "continueOnError": true
                    },
                    {
                        "actionId": "after",
                        "type": "SCRIPT",
                        "config": {"expression": "'ran'"},
                        "outputVariable": "after"
                    }
                ]
            }]
        }"#,
    );
    let mut ctx = ExecutionContext::new();

    let result = executor.execute(&mut ctx);
    assert!(result.is_success());
    assert_eq!(ctx.variable("after"), Some(&Value::text("ran")));

    let failed = ctx
        .execution_history()
        .iter()
        .filter(|step| step.step_type == StepType::ActionFailed)
        .count();
    assert_eq!(failed, 1);
}

#[test]
fn malformed_action_condition_defaults_to_running() {
    let executor = RuleEngineBuilder::new()
        .with_config_str(
            r#"{
                "entryPoint": "odd",
                "rules": [{
                    "ruleId": "odd",
                    "terminal": true,
                    "actions": [{
                        "actionId": "still-runs",
                        "type": "SCRIPT",
                        "condition": "amount >",
                        "config": {"expression": "'executed'"},
                        "outputVariable": "marker"
                    }]
                }]
            }"#,
        )
        .unwrap()
        .build()
        .unwrap();

    let mut ctx = ExecutionContext::new();
    let result = executor.execute(&mut ctx);
    assert!(result.is_success());
    assert_eq!(ctx.variable("marker"), Some(&Value::text("executed")));
}

#[test]
fn script_chain_across_rules() {
    let executor = build(
        r#"{
            "entryPoint": "compute",
            "rules": [
                {
                    "ruleId": "compute",
                    "actions": [{
                        "actionId": "subtotal",
                        "type": "SCRIPT",
                        "config": {"expression": "util.sumItems(cart)"},
                        "outputVariable": "subtotal"
                    }],
                    "transitions": [
                        {"condition": "subtotal >= 100", "targetRule": "discount", "priority": 1},
                        {"condition": "true", "targetRule": "finish", "priority": 0}
                    ]
                },
                {
                    "ruleId": "discount",
                    "actions": [{
                        "actionId": "apply",
                        "type": "SCRIPT",
                        "config": {"expression": "util.roundTo(subtotal * 0.85, 2)"},
                        "outputVariable": "subtotal"
                    }],
                    "transitions": [{"condition": "true", "targetRule": "finish"}]
                },
                {"ruleId": "finish", "terminal": true}
            ]
        }"#,
    );

    let cart: Value = serde_json::from_str(
        r#"[
            {"price": 60.0, "quantity": 1},
            {"price": 25.0, "quantity": 2}
        ]"#,
    )
    .unwrap();
    let mut ctx = ctx_with(&[("cart", cart)]);

    let result = executor.execute(&mut ctx);
    assert!(result.is_success(), "{:?}", result.error_message());
    assert_eq!(result.final_rule_id(), Some("finish"));
    // 60 + 50 = 110, over the threshold, 15% off => 93.5
    assert_eq!(ctx.variable("subtotal"), Some(&Value::float(93.5)));
}

#[test]
fn tracing_captures_steps_and_snapshots() {
    let executor = build(VALIDATE_APPROVE_REJECT);
    let mut ctx = ctx_with(&[("age", Value::integer(25))]);
    ctx.enable_tracing();

    let result = executor.execute(&mut ctx);
    assert!(result.is_success());

    let trace = ctx.trace().expect("trace recorded");
    assert!(trace.is_success());
    assert_eq!(trace.rules_executed(), &["validate", "approve"]);
    assert_eq!(trace.actions_executed(), &["set-approved"]);

    let snapshots = trace.variable_snapshots();
    assert!(snapshots["initial-state"].contains_key("age"));
    assert_eq!(
        snapshots["final-state"].get("status"),
        Some(&Value::text("APPROVED"))
    );

    let summary = trace.detailed_summary();
    assert!(summary.contains("Entry Point: validate"));
    assert!(summary.contains("Status: SUCCESS"));
    assert!(summary.contains("RULE_ENTERED"));

    let diagram = trace.to_mermaid_diagram();
    assert!(diagram.contains("Entry: validate"));
    assert!(diagram.contains("End[\"Success\"]"));

    let metrics = trace.metrics();
    assert_eq!(metrics["rulesExecuted"], Value::integer(2));
    assert_eq!(metrics["failedActions"], Value::integer(0));
}

#[test]
fn executor_serves_concurrent_contexts() {
    let executor = Arc::new(build(VALIDATE_APPROVE_REJECT));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let executor = Arc::clone(&executor);
            std::thread::spawn(move || {
                let age = if i % 2 == 0 { 30 } else { 12 };
                let mut ctx = ctx_with(&[("age", Value::integer(age))]);
                let result = executor.execute(&mut ctx);
                assert!(result.is_success());
                let expected = if age >= 18 { "APPROVED" } else { "REJECTED" };
                assert_eq!(ctx.variable("status"), Some(&Value::text(expected)));
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}
