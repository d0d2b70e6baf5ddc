//! Hybrid agent: scores incoming stimuli for complexity and routes each
//! cycle to a reactive or cognitive strategy it owns internally, rather
//! than inheriting from either (§4.7, Design Notes).

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::models::agent::Agent;
use crate::domain::models::message::Message;
use crate::domain::models::task::Task;
use crate::domain::ports::tool::ToolRegistry;
use crate::environment::Environment;

use super::cognitive::CognitiveAgentStrategy;
use super::core::{AgentStrategy, TaskOutcome};
use super::reactive::ReactiveAgentStrategy;

const MAX_HYBRID_ACTIONS_PER_CYCLE: usize = 5;
const LEARNING_WINDOW: usize = 100;
const MIN_THRESHOLD: f64 = 0.5;
const MAX_THRESHOLD: f64 = 4.0;
const MIN_FACTOR_ADJUSTMENT: f64 = 0.5;
const MAX_FACTOR_ADJUSTMENT: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Reactive,
    Cognitive,
    Hybrid,
}

/// Raw complexity indicators for one scoring pass, kept alongside the
/// weighted score so `adjust_threshold` can later correlate a factor's
/// magnitude with which mode actually performed better.
#[derive(Debug, Clone, Copy, Default)]
struct Indicators {
    stimuli_count: f64,
    unique_types: f64,
    max_priority: f64,
    interdependencies: f64,
    requires_reasoning: f64,
}

/// Per-factor learned multiplier applied to the weighted sum, distinct from
/// `threshold` (which only moves the reactive/cognitive/hybrid cutoff).
#[derive(Debug, Clone, Copy)]
struct FactorAdjustments {
    stimuli_count: f64,
    unique_types: f64,
    max_priority: f64,
    interdependencies: f64,
    requires_reasoning: f64,
}

impl Default for FactorAdjustments {
    fn default() -> Self {
        Self { stimuli_count: 1.0, unique_types: 1.0, max_priority: 1.0, interdependencies: 1.0, requires_reasoning: 1.0 }
    }
}

#[derive(Debug, Clone, Copy)]
struct Experience {
    indicators: Indicators,
    mode: Mode,
    succeeded: bool,
}

pub struct HybridAgentStrategy {
    reactive: ReactiveAgentStrategy,
    cognitive: CognitiveAgentStrategy,
    threshold: f64,
    learning_rate: f64,
    factor_adjustments: FactorAdjustments,
    experiences: Vec<Experience>,
    last_mode: Mode,
}

impl HybridAgentStrategy {
    pub fn new(reactive: ReactiveAgentStrategy, cognitive: CognitiveAgentStrategy) -> Self {
        Self {
            reactive,
            cognitive,
            threshold: 1.0,
            learning_rate: 0.1,
            factor_adjustments: FactorAdjustments::default(),
            experiences: Vec::new(),
            last_mode: Mode::Hybrid,
        }
    }

    /// Raw indicators per spec.md §4.7: stimuli count, distinct `type`s, the
    /// highest `priority`, an interdependency count, and whether any
    /// stimulus requests reasoning. Interdependencies sum each stimulus's
    /// `depends_on` length plus cross-referenced `id`/`reference` pairs,
    /// not merely a count of stimuli that happen to carry a `depends_on`.
    fn indicators_for(&self, stimuli: &[Value]) -> Indicators {
        let stimuli_count = stimuli.len() as f64;
        let unique_types: std::collections::HashSet<&str> =
            stimuli.iter().filter_map(|s| s.get("type").and_then(Value::as_str)).collect();
        let max_priority = stimuli
            .iter()
            .filter_map(|s| s.get("priority").and_then(Value::as_f64))
            .fold(0.0_f64, f64::max);
        let requires_reasoning = stimuli.iter().any(|s| s.get("requires_reasoning").and_then(Value::as_bool).unwrap_or(false));

        let mut dependency_total = 0usize;
        let mut ids = std::collections::HashSet::new();
        let mut references = std::collections::HashSet::new();
        for stimulus in stimuli {
            if let Some(id) = stimulus.get("id") {
                ids.insert(id.to_string());
            }
            if let Some(reference) = stimulus.get("reference") {
                references.insert(reference.to_string());
            }
            if let Some(depends_on) = stimulus.get("depends_on").and_then(Value::as_array) {
                dependency_total += depends_on.len();
            }
        }
        let interdependencies = (dependency_total + ids.intersection(&references).count()) as f64;

        Indicators {
            stimuli_count,
            unique_types: unique_types.len() as f64,
            max_priority,
            interdependencies,
            requires_reasoning: if requires_reasoning { 1.0 } else { 0.0 },
        }
    }

    /// score = 0.1*stimuli_count + 0.2*unique_types + 0.1*max_priority
    ///       + 0.3*interdependencies + (1.0 if requires_reasoning else 0),
    /// each term scaled by its own learned `factor_adjustments` multiplier.
    fn score_from_indicators(&self, indicators: &Indicators) -> f64 {
        let adj = &self.factor_adjustments;
        0.1 * indicators.stimuli_count * adj.stimuli_count
            + 0.2 * indicators.unique_types * adj.unique_types
            + 0.1 * indicators.max_priority * adj.max_priority
            + 0.3 * indicators.interdependencies * adj.interdependencies
            + indicators.requires_reasoning * adj.requires_reasoning
    }

    fn complexity_score(&self, stimuli: &[Value]) -> f64 {
        self.score_from_indicators(&self.indicators_for(stimuli))
    }

    fn mode_for_score(&self, score: f64) -> Mode {
        if score < 0.5 * self.threshold {
            Mode::Reactive
        } else if score > 1.5 * self.threshold {
            Mode::Cognitive
        } else {
            Mode::Hybrid
        }
    }

    fn record_experience(&mut self, indicators: Indicators, mode: Mode, succeeded: bool) {
        self.experiences.push(Experience { indicators, mode, succeeded });
        if self.experiences.len() >= LEARNING_WINDOW {
            self.adjust_threshold();
            self.experiences.clear();
        }
    }

    /// Every `LEARNING_WINDOW` experiences, compare reactive vs cognitive
    /// success rates; if one mode dominates by more than 20 points, nudge
    /// the threshold toward it by `learning_rate * 0.1`, clamped. Also walk
    /// each complexity factor independently: a factor that ran higher on
    /// average among the *worse*-performing mode's experiences is
    /// over-pushing tasks toward that mode, so its multiplier is dialled
    /// down (and the mirror factor dialled up), rather than moving every
    /// factor by the same amount as a disguised second threshold.
    fn adjust_threshold(&mut self) {
        let success_rate = |mode: Mode| -> Option<f64> {
            let (succeeded, total) = self
                .experiences
                .iter()
                .filter(|e| e.mode == mode)
                .fold((0u32, 0u32), |(s, t), e| (s + e.succeeded as u32, t + 1));
            if total == 0 {
                None
            } else {
                Some(succeeded as f64 / total as f64 * 100.0)
            }
        };

        let reactive_rate = success_rate(Mode::Reactive);
        let cognitive_rate = success_rate(Mode::Cognitive);

        let (Some(r), Some(c)) = (reactive_rate, cognitive_rate) else { return };
        let delta = self.learning_rate * 0.1;
        if r - c > 20.0 {
            self.threshold += delta;
        } else if c - r > 20.0 {
            self.threshold -= delta;
        } else {
            self.threshold = self.threshold.clamp(MIN_THRESHOLD, MAX_THRESHOLD);
            return;
        }
        self.threshold = self.threshold.clamp(MIN_THRESHOLD, MAX_THRESHOLD);

        let reactive_dominant = r - c > 20.0;
        let mean_for = |mode: Mode, pick: fn(&Indicators) -> f64| -> Option<f64> {
            let values: Vec<f64> = self.experiences.iter().filter(|e| e.mode == mode).map(|e| pick(&e.indicators)).collect();
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        };

        let factors: [(fn(&Indicators) -> f64, fn(&mut FactorAdjustments) -> &mut f64); 5] = [
            (|i| i.stimuli_count, |a| &mut a.stimuli_count),
            (|i| i.unique_types, |a| &mut a.unique_types),
            (|i| i.max_priority, |a| &mut a.max_priority),
            (|i| i.interdependencies, |a| &mut a.interdependencies),
            (|i| i.requires_reasoning, |a| &mut a.requires_reasoning),
        ];
        for (pick, field) in factors {
            let (Some(reactive_avg), Some(cognitive_avg)) = (mean_for(Mode::Reactive, pick), mean_for(Mode::Cognitive, pick))
            else {
                continue;
            };
            let cognitive_leaning = cognitive_avg > reactive_avg;
            let adjustment = field(&mut self.factor_adjustments);
            if reactive_dominant == cognitive_leaning {
                // This factor runs high specifically among the worse mode's
                // experiences: it's misleading the score toward that mode.
                *adjustment -= delta;
            } else {
                *adjustment += delta;
            }
            *adjustment = adjustment.clamp(MIN_FACTOR_ADJUSTMENT, MAX_FACTOR_ADJUSTMENT);
        }
    }
}

#[async_trait]
impl AgentStrategy for HybridAgentStrategy {
    async fn perceive(&mut self, agent: &Agent, env: &Environment, stimuli: &[Value]) -> Value {
        let score = self.complexity_score(stimuli);
        self.last_mode = self.mode_for_score(score);
        match self.last_mode {
            Mode::Reactive | Mode::Hybrid => self.reactive.perceive(agent, env, stimuli).await,
            Mode::Cognitive => self.cognitive.perceive(agent, env, stimuli).await,
        }
    }

    async fn deliberate(&mut self, agent: &Agent) -> Vec<String> {
        match self.last_mode {
            Mode::Reactive | Mode::Hybrid => self.reactive.deliberate(agent).await,
            Mode::Cognitive => self.cognitive.deliberate(agent).await,
        }
    }

    async fn act(&mut self, agent: &Agent, intentions: &[String]) -> Value {
        let actions = match self.last_mode {
            Mode::Reactive | Mode::Hybrid => self.reactive.act(agent, intentions).await,
            Mode::Cognitive => self.cognitive.act(agent, intentions).await,
        };
        if self.last_mode == Mode::Hybrid {
            if let Value::Array(mut items) = actions {
                items.truncate(MAX_HYBRID_ACTIONS_PER_CYCLE);
                return Value::Array(items);
            }
        }
        actions
    }

    async fn handle_message(&mut self, agent: &Agent, msg: &Message) -> Option<Message> {
        match self.last_mode {
            Mode::Cognitive => self.cognitive.handle_message(agent, msg).await,
            _ => self.reactive.handle_message(agent, msg).await,
        }
    }

    async fn handle_task(&mut self, agent: &Agent, env: &Environment, tools: &ToolRegistry, task: &Task) -> TaskOutcome {
        let indicators = self.indicators_for(&[serde_json::json!({
            "type": "task",
            "priority": task.priority as i32 as f64,
            "requires_reasoning": matches!(task.task_type, crate::domain::models::task::TaskType::Analysis | crate::domain::models::task::TaskType::Design),
        })]);
        let score = self.score_from_indicators(&indicators);
        let mode = self.mode_for_score(score);

        let outcome = match mode {
            Mode::Cognitive | Mode::Hybrid => self.cognitive.handle_task(agent, env, tools, task).await,
            Mode::Reactive => self.reactive.handle_task(agent, env, tools, task).await,
        };
        self.record_experience(indicators, mode, outcome.result.is_ok());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn strategy() -> HybridAgentStrategy {
        let reactive = ReactiveAgentStrategy::from_capabilities(&HashSet::new());
        let cognitive = CognitiveAgentStrategy::new(std::sync::Arc::new(NullLlm));
        HybridAgentStrategy::new(reactive, cognitive)
    }

    struct NullLlm;

    #[async_trait]
    impl crate::domain::ports::llm_substrate::LlmSubstrate for NullLlm {
        fn substrate_id(&self) -> &str {
            "null"
        }
        async fn generate(
            &self,
            _task_id: uuid::Uuid,
            _prompt: &str,
            _params: &crate::domain::ports::llm_substrate::GenerateParams,
        ) -> Result<crate::domain::ports::llm_substrate::GenerateOutcome, crate::domain::ports::llm_substrate::SubstrateError> {
            Ok(crate::domain::ports::llm_substrate::GenerateOutcome::Ok {
                response: serde_json::json!({}),
                raw_text: "{}".to_string(),
            })
        }
        async fn health_check(&self) -> Result<crate::domain::ports::llm_substrate::HealthStatus, crate::domain::ports::llm_substrate::SubstrateError> {
            Ok(crate::domain::ports::llm_substrate::HealthStatus::Healthy)
        }
    }

    #[test]
    fn low_complexity_routes_to_reactive() {
        let strategy = strategy();
        let score = strategy.complexity_score(&[serde_json::json!({"type": "ping"})]);
        assert_eq!(strategy.mode_for_score(score), Mode::Reactive);
    }

    #[test]
    fn reasoning_stimulus_routes_to_cognitive() {
        let strategy = strategy();
        let stimuli = vec![serde_json::json!({"type": "complex_task", "requires_reasoning": true, "priority": 4})];
        let score = strategy.complexity_score(&stimuli);
        assert_eq!(strategy.mode_for_score(score), Mode::Cognitive);
    }

    #[test]
    fn threshold_nudges_toward_dominant_mode() {
        let mut strategy = strategy();
        for _ in 0..LEARNING_WINDOW {
            strategy.record_experience(Indicators::default(), Mode::Reactive, true);
        }
        // All reactive successes with no cognitive experiences this window
        // shouldn't move the threshold (no comparison basis).
        assert_eq!(strategy.threshold, 1.0);
    }

    #[test]
    fn interdependencies_sum_depends_on_lengths_and_cross_references() {
        let strategy = strategy();
        let stimuli = vec![
            serde_json::json!({"id": "x", "depends_on": ["a", "b"]}),
            serde_json::json!({"reference": "x", "depends_on": ["c"]}),
        ];
        let indicators = strategy.indicators_for(&stimuli);
        // 2 + 1 from depends_on, plus 1 for the "x" id/reference cross-link.
        assert_eq!(indicators.interdependencies, 4.0);
    }
}
