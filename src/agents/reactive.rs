//! Reactive agent: an ordered rule list matched against perceived stimuli,
//! no LLM involved (§4.5).

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::models::agent::Agent;
use crate::domain::models::message::Message;
use crate::domain::models::task::Task;
use crate::domain::ports::tool::ToolRegistry;
use crate::environment::Environment;

use super::core::{AgentStrategy, TaskOutcome};

#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub priority: i32,
    pub condition: Value,
    pub action_template: Value,
    /// If true, a match does not stop lower-priority rules from also firing.
    pub continue_matching: bool,
}

/// Seed rules implied by an agent's declared capabilities (e.g.
/// `monitoring` gets a threshold-alert rule).
pub fn default_rules_from_capabilities(capabilities: &HashSet<String>) -> Vec<Rule> {
    let mut rules = Vec::new();
    if capabilities.contains("monitoring") {
        rules.push(Rule {
            name: "threshold_alert".to_string(),
            priority: 10,
            condition: serde_json::json!({ "type": "metric", "value": { "$gt": 100 } }),
            action_template: serde_json::json!({ "type": "alert", "level": "warning" }),
            continue_matching: false,
        });
    }
    rules
}

/// A condition is either `{field: value}` or `{field: {op: value}}` with
/// `op ∈ {$gt, $lt, $eq, $in}`; every field in the condition must match.
pub fn condition_matches(condition: &Value, stimulus: &Value) -> bool {
    let Value::Object(fields) = condition else {
        return false;
    };
    fields.iter().all(|(field, expected)| {
        let actual = stimulus.get(field);
        match expected {
            Value::Object(ops) if ops.keys().any(|k| k.starts_with('$')) => {
                ops.iter().all(|(op, operand)| apply_operator(op, actual, operand))
            }
            other => actual == Some(other),
        }
    })
}

fn apply_operator(op: &str, actual: Option<&Value>, operand: &Value) -> bool {
    match op {
        "$gt" => match (actual.and_then(Value::as_f64), operand.as_f64()) {
            (Some(a), Some(b)) => a > b,
            _ => false,
        },
        "$lt" => match (actual.and_then(Value::as_f64), operand.as_f64()) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        },
        "$eq" => actual == Some(operand),
        "$in" => operand.as_array().map(|arr| actual.map(|a| arr.contains(a)).unwrap_or(false)).unwrap_or(false),
        _ => false,
    }
}

pub struct ReactiveAgentStrategy {
    rules: Vec<Rule>,
    last_stimuli: Vec<Value>,
}

impl ReactiveAgentStrategy {
    pub fn new(mut rules: Vec<Rule>) -> Self {
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { rules, last_stimuli: Vec::new() }
    }

    pub fn from_capabilities(capabilities: &HashSet<String>) -> Self {
        Self::new(default_rules_from_capabilities(capabilities))
    }

    fn firing_rules(&self) -> Vec<&Rule> {
        let mut fired = Vec::new();
        for rule in &self.rules {
            let matched = self.last_stimuli.iter().any(|s| condition_matches(&rule.condition, s));
            if matched {
                let stop = !rule.continue_matching;
                fired.push(rule);
                if stop {
                    break;
                }
            }
        }
        fired
    }
}

#[async_trait]
impl AgentStrategy for ReactiveAgentStrategy {
    async fn perceive(&mut self, _agent: &Agent, _env: &Environment, stimuli: &[Value]) -> Value {
        self.last_stimuli = stimuli.to_vec();
        serde_json::json!({ "last_stimuli_count": stimuli.len() })
    }

    async fn deliberate(&mut self, _agent: &Agent) -> Vec<String> {
        self.firing_rules().into_iter().map(|r| format!("execute_rule_{}", r.name)).collect()
    }

    async fn act(&mut self, _agent: &Agent, _intentions: &[String]) -> Value {
        let actions: Vec<Value> = self.firing_rules().into_iter().map(|r| r.action_template.clone()).collect();
        Value::Array(actions)
    }

    async fn handle_task(&mut self, _agent: &Agent, _env: &Environment, _tools: &ToolRegistry, task: &Task) -> TaskOutcome {
        // Reactive agents treat an assigned task as a stimulus for the next
        // cycle rather than handling it synchronously.
        self.last_stimuli.push(serde_json::json!({ "type": "task", "task_id": task.id, "description": task.description }));
        TaskOutcome { task_id: task.id, result: Ok(serde_json::json!({ "queued_as_stimulus": true })) }
    }

    async fn handle_message(&mut self, _agent: &Agent, msg: &Message) -> Option<Message> {
        self.last_stimuli.push(serde_json::json!({ "type": "message", "content": msg.content }));
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn threshold_rule_fires_exactly_once_above_limit() {
        let rules = vec![Rule {
            name: "alert".to_string(),
            priority: 1,
            condition: serde_json::json!({ "type": "metric", "value": { "$gt": 100 } }),
            action_template: serde_json::json!({ "type": "alert", "level": "warning" }),
            continue_matching: false,
        }];
        let mut strategy = ReactiveAgentStrategy::new(rules);
        let agent = Agent::new("watcher", "monitor", crate::domain::models::agent::AgentMode::Reactive);
        let env = Environment::new();

        strategy.perceive(&agent, &env, &[serde_json::json!({ "type": "metric", "value": 150 })]).await;
        let intentions = strategy.deliberate(&agent).await;
        assert_eq!(intentions, vec!["execute_rule_alert".to_string()]);

        let actions = strategy.act(&agent, &intentions).await;
        let actions = super::super::core::normalize_actions(actions);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action_type, "alert");
    }

    #[test]
    fn condition_matches_operators() {
        assert!(condition_matches(&serde_json::json!({"v": {"$gt": 10}}), &serde_json::json!({"v": 11})));
        assert!(!condition_matches(&serde_json::json!({"v": {"$gt": 10}}), &serde_json::json!({"v": 9})));
        assert!(condition_matches(&serde_json::json!({"v": {"$in": [1,2,3]}}), &serde_json::json!({"v": 2})));
    }
}
