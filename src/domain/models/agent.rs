//! Agent domain model.
//!
//! An agent is identity + role + capability set + mode-specific BDI state.
//! The runtime owns agent lifetime; the swarm coordinator only ever sees an
//! `AgentHandle`'s metadata through the registry.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Reasoning mode an agent uses to go from perception to action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    Reactive,
    Cognitive,
    Hybrid,
}

/// Lifecycle state of an agent as seen by the runtime and the coordinator's
/// agent-selection scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Idle,
    Busy,
    Offline,
}

impl Default for AgentState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Beliefs-desires-intentions state owned by an agent.
///
/// `beliefs` is always a mapping from string keys to JSON-compatible
/// values: any update whose value is not itself a JSON object is wrapped as
/// `{"value": <update>}` so belief access never fails on type. Desires and
/// intentions are de-duplicated ordered lists of strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BdiState {
    pub beliefs: HashMap<String, Value>,
    pub desires: Vec<String>,
    pub intentions: Vec<String>,
}

impl BdiState {
    /// Merge a raw update into beliefs, coercing non-mapping values.
    ///
    /// A string update is first attempted as JSON (so an agent perceiving a
    /// serialized JSON blob as a single string still lands in beliefs as a
    /// mapping); anything else that isn't already an object is wrapped.
    pub fn update_beliefs(&mut self, update: Value) {
        let coerced = match update {
            Value::Object(map) => Value::Object(map),
            Value::String(ref s) => match serde_json::from_str::<Value>(s) {
                Ok(Value::Object(map)) => Value::Object(map),
                _ => serde_json::json!({ "value": update }),
            },
            other => serde_json::json!({ "value": other }),
        };
        if let Value::Object(map) = coerced {
            for (k, v) in map {
                self.beliefs.insert(k, v);
            }
        }
    }

    pub fn add_desire(&mut self, desire: impl Into<String>) {
        let desire = desire.into();
        if !self.desires.contains(&desire) {
            self.desires.push(desire);
        }
    }

    pub fn commit_intention(&mut self, intention: impl Into<String>) {
        let intention = intention.into();
        if !self.intentions.contains(&intention) {
            self.intentions.push(intention);
        }
    }
}

/// Rolling performance counters used by agent-selection scoring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub completed: u64,
    pub failed: u64,
    pub active_tasks: u32,
    pub validation_score_sum: u64,
    pub validation_count: u64,
    pub errors: u64,
}

impl AgentMetrics {
    pub fn success_rate(&self) -> f64 {
        let total = self.completed + self.failed;
        if total == 0 {
            return 1.0;
        }
        1.0 - (self.failed as f64 / total as f64)
    }

    pub fn avg_validation_score(&self) -> f64 {
        if self.validation_count == 0 {
            return 0.0;
        }
        self.validation_score_sum as f64 / self.validation_count as f64
    }

    pub fn record_validation(&mut self, score: u8) {
        self.validation_score_sum += score as u64;
        self.validation_count += 1;
    }
}

/// Identity, role, capabilities, and BDI/runtime state for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub capabilities: HashSet<String>,
    pub mode: AgentMode,
    pub bdi: BdiState,
    pub state: AgentState,
    pub metrics: AgentMetrics,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(name: impl Into<String>, role: impl Into<String>, mode: AgentMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            role: role.into(),
            capabilities: HashSet::new(),
            mode,
            bdi: BdiState::default(),
            state: AgentState::default(),
            metrics: AgentMetrics::default(),
            created_at: Utc::now(),
        }
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities.extend(capabilities.into_iter().map(Into::into));
        self
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn is_idle(&self) -> bool {
        self.state == AgentState::Idle
    }

    pub fn is_overloaded(&self, max_concurrent: u32) -> bool {
        self.metrics.active_tasks >= max_concurrent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn belief_update_from_object_merges() {
        let mut bdi = BdiState::default();
        bdi.update_beliefs(serde_json::json!({"ping": 1}));
        assert_eq!(bdi.beliefs.get("ping"), Some(&Value::from(1)));
    }

    #[test]
    fn belief_update_from_scalar_is_wrapped() {
        let mut bdi = BdiState::default();
        bdi.update_beliefs(Value::from(42));
        assert_eq!(bdi.beliefs.get("value"), Some(&Value::from(42)));
    }

    #[test]
    fn belief_update_from_json_string_is_parsed() {
        let mut bdi = BdiState::default();
        bdi.update_beliefs(Value::String(r#"{"status":"ok"}"#.to_string()));
        assert_eq!(bdi.beliefs.get("status"), Some(&Value::from("ok")));
    }

    #[test]
    fn desires_and_intentions_deduplicate() {
        let mut bdi = BdiState::default();
        bdi.add_desire("explore");
        bdi.add_desire("explore");
        assert_eq!(bdi.desires.len(), 1);
        bdi.commit_intention("explore");
        bdi.commit_intention("explore");
        assert_eq!(bdi.intentions.len(), 1);
    }

    #[test]
    fn success_rate_is_one_with_no_history() {
        let metrics = AgentMetrics::default();
        assert_eq!(metrics.success_rate(), 1.0);
    }

    #[test]
    fn success_rate_reflects_failures() {
        let mut metrics = AgentMetrics::default();
        metrics.completed = 3;
        metrics.failed = 1;
        assert_eq!(metrics.success_rate(), 0.75);
    }
}
