//! Typed configuration model for rule workflows.
//!
//! The JSON shape is camelCase with every field optional except the ones a
//! workflow cannot exist without. Unknown keys are ignored for forward
//! compatibility, and a single object is accepted anywhere an array is
//! expected.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer, Serialize};

use ruleflow_value::Value;

/// Root configuration: entry point, global limits, and the rule set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleEngineConfig {
    /// Informational schema/config version.
    pub version: Option<String>,
    /// Rule id every execution starts from.
    pub entry_point: String,
    /// Global limits and defaults.
    pub global_settings: GlobalSettings,
    /// Rule definitions, in configuration order.
    #[serde(deserialize_with = "one_or_many")]
    pub rules: Vec<RuleDefinition>,
}

impl RuleEngineConfig {
    /// Find a rule by id.
    pub fn rule(&self, rule_id: &str) -> Option<&RuleDefinition> {
        self.rules.iter().find(|rule| rule.rule_id == rule_id)
    }

    /// Whether a rule with the given id exists.
    pub fn has_rule(&self, rule_id: &str) -> bool {
        self.rule(rule_id).is_some()
    }

    /// All rule ids, in configuration order.
    pub fn rule_ids(&self) -> Vec<&str> {
        self.rules.iter().map(|rule| rule.rule_id.as_str()).collect()
    }

    /// Number of rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// All rules flagged terminal.
    pub fn terminal_rules(&self) -> Vec<&RuleDefinition> {
        self.rules.iter().filter(|rule| rule.terminal).collect()
    }

    /// Build an id-indexed map of the rules for O(1) traversal lookups.
    pub fn build_rule_map(&self) -> HashMap<String, RuleDefinition> {
        self.rules
            .iter()
            .map(|rule| (rule.rule_id.clone(), rule.clone()))
            .collect()
    }
}

/// Engine-wide limits and the optional fallback error rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalSettings {
    /// Maximum number of rule entries in one execution.
    pub max_execution_depth: u32,
    /// Wall-clock bound for one execution, in milliseconds.
    pub timeout: u64,
    /// Rule to route otherwise-unhandled action errors to.
    pub default_error_rule: Option<String>,
}

impl GlobalSettings {
    /// Whether a default error rule is configured.
    pub fn has_default_error_rule(&self) -> bool {
        self.default_error_rule
            .as_deref()
            .is_some_and(|rule| !rule.is_empty())
    }
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            max_execution_depth: 50,
            timeout: 30_000,
            default_error_rule: None,
        }
    }
}

/// A named node: a sequence of actions plus guarded transitions out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleDefinition {
    /// Unique rule id.
    pub rule_id: String,
    /// Optional human-readable description.
    pub description: Option<String>,
    /// Actions, executed in definition order.
    #[serde(deserialize_with = "one_or_many")]
    pub actions: Vec<ActionDefinition>,
    /// Outgoing transitions.
    #[serde(deserialize_with = "one_or_many")]
    pub transitions: Vec<TransitionDefinition>,
    /// Terminal rules end execution; their transitions are ignored.
    pub terminal: bool,
}

impl RuleDefinition {
    /// Whether this rule has any actions.
    pub fn has_actions(&self) -> bool {
        !self.actions.is_empty()
    }

    /// Whether this rule has any transitions.
    pub fn has_transitions(&self) -> bool {
        !self.transitions.is_empty()
    }

    /// Number of actions.
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Number of transitions.
    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    /// Transitions in evaluation order: descending priority, definition
    /// order breaking ties.
    pub fn sorted_transitions(&self) -> Vec<&TransitionDefinition> {
        let mut sorted: Vec<&TransitionDefinition> = self.transitions.iter().collect();
        sorted.sort_by_key(|transition| std::cmp::Reverse(transition.priority));
        sorted
    }
}

/// One unit of work inside a rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionDefinition {
    /// Action id, unique within its rule.
    pub action_id: String,
    /// Type tag resolved against the provider registry, case-insensitively.
    #[serde(rename = "type")]
    pub action_type: String,
    /// Opaque provider-specific configuration.
    pub config: BTreeMap<String, Value>,
    /// Optional guard; a falsy result skips the action.
    pub condition: Option<String>,
    /// Context variable to bind the action result to.
    pub output_variable: Option<String>,
    /// Extraction expression over the raw result, bound as `result`.
    pub output_expression: Option<String>,
    /// Keep executing subsequent actions when this one fails.
    pub continue_on_error: bool,
    /// Action-level error routing.
    pub on_error: Option<ErrorHandlerDefinition>,
}

impl ActionDefinition {
    /// Whether a non-empty guard condition is set.
    pub fn has_condition(&self) -> bool {
        self.condition.is_some()
    }

    /// Whether an output extraction expression is set.
    pub fn has_output_expression(&self) -> bool {
        self.output_expression
            .as_deref()
            .is_some_and(|expr| !expr.trim().is_empty())
    }

    /// Whether an action-level error handler is set.
    pub fn has_error_handler(&self) -> bool {
        self.on_error.is_some()
    }

    /// Typed lookup into the opaque config map.
    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    /// String lookup into the opaque config map.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }
}

/// Where to route execution when an action fails.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ErrorHandlerDefinition {
    /// Rule to continue from.
    pub target_rule: String,
}

/// A guarded directed edge between rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransitionDefinition {
    /// Boolean guard expression; the first truthy guard wins.
    pub condition: String,
    /// Rule to move to when the guard holds.
    pub target_rule: String,
    /// Evaluation priority; higher evaluates first.
    pub priority: i32,
    /// Variable renames applied on traversal: target name -> source name.
    pub context_transform: Option<BTreeMap<String, String>>,
    /// Informational only; terminality is a property of the target rule.
    pub terminal: bool,
}

impl TransitionDefinition {
    /// Whether a context transform is attached.
    pub fn has_context_transform(&self) -> bool {
        self.context_transform
            .as_ref()
            .is_some_and(|transform| !transform.is_empty())
    }
}

/// Accept either a JSON array or a single object where an array is expected.
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(items) => items,
        OneOrMany::One(item) => vec![item],
    })
}
