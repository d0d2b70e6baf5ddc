//! Agent-selection scoring (§4.9): picks the best idle agent for a task
//! from additive weighted factors, in the teacher's `PriorityCalculator`
//! style (a small struct of weights plus a pure `score` function).

use crate::domain::models::agent::Agent;
use crate::domain::models::task::Task;

const REQUIRED_TYPE_MATCH_POINTS: f64 = 20.0;
const KEYWORD_OVERLAP_POINTS: f64 = 10.0;
const IDLE_BONUS_POINTS: f64 = 5.0;
const SUCCESS_RATE_WEIGHT: f64 = 5.0;
const VALIDATION_WEIGHT: f64 = 5.0;
const WORKLOAD_PENALTY_POINTS: f64 = 2.0;

#[derive(Debug, Clone, Copy)]
pub struct AgentSelector {
    required_type_match_points: f64,
    keyword_overlap_points: f64,
    idle_bonus_points: f64,
    success_rate_weight: f64,
    validation_weight: f64,
    workload_penalty_points: f64,
}

impl Default for AgentSelector {
    fn default() -> Self {
        Self {
            required_type_match_points: REQUIRED_TYPE_MATCH_POINTS,
            keyword_overlap_points: KEYWORD_OVERLAP_POINTS,
            idle_bonus_points: IDLE_BONUS_POINTS,
            success_rate_weight: SUCCESS_RATE_WEIGHT,
            validation_weight: VALIDATION_WEIGHT,
            workload_penalty_points: WORKLOAD_PENALTY_POINTS,
        }
    }
}

impl AgentSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score one candidate agent against a task:
    /// +20 if `required_agent_type` matches the agent's role, +10 per
    /// keyword of the task type found as a substring of a capability, +5 if
    /// idle, +(1 - failed/completed)*5 success-rate bonus,
    /// +(avg_validation/100)*5 validation bonus, -2 per active task
    /// (workload penalty).
    pub fn score(&self, agent: &Agent, task: &Task) -> f64 {
        let mut score = 0.0;

        if let Some(required) = &task.required_agent_type {
            if required == &agent.role {
                score += self.required_type_match_points;
            }
        }

        let task_keywords: Vec<String> = task.task_type.as_str().split('_').map(str::to_lowercase).collect();
        let keyword_hits = agent
            .capabilities
            .iter()
            .map(|cap| cap.to_lowercase())
            .filter(|cap| task_keywords.iter().any(|keyword| cap.contains(keyword.as_str())))
            .count();
        score += keyword_hits as f64 * self.keyword_overlap_points;

        if agent.is_idle() {
            score += self.idle_bonus_points;
        }

        score += agent.metrics.success_rate() * self.success_rate_weight;
        score += (agent.metrics.avg_validation_score() / 100.0) * self.validation_weight;
        score -= agent.metrics.active_tasks as f64 * self.workload_penalty_points;

        score
    }

    /// Pick the highest-scoring agent, preferring the first in iteration
    /// order on ties so selection stays deterministic for a fixed registry.
    pub fn select_best<'a>(&self, candidates: &'a [Agent], task: &Task) -> Option<&'a Agent> {
        candidates
            .iter()
            .map(|agent| (agent, self.score(agent, task)))
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(agent, _)| agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::agent::AgentMode;

    fn agent_with(role: &str, capabilities: &[&str]) -> Agent {
        Agent::new("worker", role, AgentMode::Reactive).with_capabilities(capabilities.iter().copied())
    }

    #[test]
    fn required_type_match_dominates_score() {
        let selector = AgentSelector::new();
        let task = Task { required_agent_type: Some("coder".to_string()), ..Task::new("t", "build a parser") };
        let matching = agent_with("coder", &[]);
        let other = agent_with("reviewer", &[]);
        assert!(selector.score(&matching, &task) > selector.score(&other, &task));
    }

    #[test]
    fn busy_agent_is_penalised_by_workload() {
        let selector = AgentSelector::new();
        let task = Task::new("t", "general task");
        let mut busy = agent_with("worker", &[]);
        busy.metrics.active_tasks = 3;
        let idle = agent_with("worker", &[]);
        assert!(selector.score(&idle, &task) > selector.score(&busy, &task));
    }

    #[test]
    fn select_best_returns_highest_scorer() {
        let selector = AgentSelector::new();
        let task = Task { required_agent_type: Some("coder".to_string()), ..Task::new("t", "implement feature") };
        let candidates = vec![agent_with("reviewer", &[]), agent_with("coder", &[])];
        let best = selector.select_best(&candidates, &task).unwrap();
        assert_eq!(best.role, "coder");
    }
}
