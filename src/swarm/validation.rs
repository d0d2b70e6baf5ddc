//! Result validation and retry policy (§4.9 "Result handling"). A
//! completed task's output is scored 0-100; below the pass threshold it is
//! requeued while `retry_count < max_retries`, otherwise failed terminally.

use crate::domain::models::task::{Task, TaskStatus};
use crate::domain::ports::llm_substrate::{GenerateOutcome, GenerateParams, LlmSubstrate, TaskTier};

pub const DEFAULT_PASS_THRESHOLD: u8 = 70;

#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub score: u8,
    pub feedback: String,
}

impl ValidationOutcome {
    pub fn passed(&self, threshold: u8) -> bool {
        self.score >= threshold
    }
}

/// LLM-validate a completed task's result against its own description
/// (§4.9 "Result handling": "LLM-validate result against the task
/// description"). Driven by the coordinator itself rather than the
/// reporting agent (§4.6 point 4: "the coordinator, not the agent, drives
/// validation") — grounded on `CognitiveAgentStrategy::validate_solution`'s
/// prompt shape, but standalone so the coordinator can call it directly
/// through its own `LlmSubstrate` handle regardless of which strategy
/// produced the result.
pub async fn validate_with_llm(llm: &dyn LlmSubstrate, task: &Task, result: &serde_json::Value) -> ValidationOutcome {
    let prompt = format!(
        "Validate this result against the task description and respond with JSON {{\"score\": integer 0-100, \"feedback\": string}}.\n\nTask: {}\nResult: {}",
        task.description, result
    );
    let params = GenerateParams { json_response: true, task_tier: TaskTier::Normal, ..Default::default() };
    match llm.generate(task.id, &prompt, &params).await {
        Ok(GenerateOutcome::Ok { response, .. }) => {
            let score = response.get("score").and_then(serde_json::Value::as_u64).map(|s| s.min(100) as u8).unwrap_or(0);
            let feedback = response.get("feedback").and_then(serde_json::Value::as_str).unwrap_or("").to_string();
            ValidationOutcome { score, feedback }
        }
        Ok(GenerateOutcome::Fallback { fallback, .. }) => ValidationOutcome { score: 0, feedback: fallback.message },
        Err(err) => ValidationOutcome { score: 0, feedback: err.to_string() },
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ValidationPolicy {
    pub pass_threshold: u8,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self { pass_threshold: DEFAULT_PASS_THRESHOLD }
    }
}

/// What the coordinator should do next for a task given a validation
/// outcome: apply it, mutating the task's status/retry_count/result in
/// place, and report whether it's now terminal.
impl ValidationPolicy {
    pub fn apply(&self, task: &mut Task, outcome: ValidationOutcome) {
        task.validation_score = Some(outcome.score);
        if outcome.passed(self.pass_threshold) {
            let _ = task.transition_to(TaskStatus::Completed);
            task.error = None;
            return;
        }
        let _ = task.transition_to(TaskStatus::Failed);
        task.error = Some(outcome.feedback);
        if task.can_retry() {
            let _ = task.retry();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_progress_task() -> Task {
        let mut task = Task::new("t", "d");
        let _ = task.transition_to(TaskStatus::Assigned);
        let _ = task.transition_to(TaskStatus::InProgress);
        let _ = task.transition_to(TaskStatus::Validating);
        task
    }

    #[test]
    fn passing_score_completes_the_task() {
        let policy = ValidationPolicy::default();
        let mut task = in_progress_task();
        policy.apply(&mut task, ValidationOutcome { score: 90, feedback: "good".to_string() });
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.error.is_none());
    }

    #[test]
    fn failing_score_retries_while_budget_remains() {
        let policy = ValidationPolicy::default();
        let mut task = in_progress_task();
        task.max_retries = 2;
        policy.apply(&mut task, ValidationOutcome { score: 10, feedback: "bad".to_string() });
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry_count, 1);
    }

    #[test]
    fn failing_score_past_retry_budget_fails_terminally() {
        let policy = ValidationPolicy::default();
        let mut task = in_progress_task();
        task.max_retries = 0;
        policy.apply(&mut task, ValidationOutcome { score: 10, feedback: "bad".to_string() });
        assert_eq!(task.status, TaskStatus::Failed);
    }

    struct StubLlm {
        response: serde_json::Value,
    }

    #[async_trait::async_trait]
    impl LlmSubstrate for StubLlm {
        fn substrate_id(&self) -> &str {
            "stub"
        }
        async fn generate(
            &self,
            _task_id: uuid::Uuid,
            _prompt: &str,
            _params: &GenerateParams,
        ) -> Result<GenerateOutcome, crate::domain::ports::llm_substrate::SubstrateError> {
            Ok(GenerateOutcome::Ok { response: self.response.clone(), raw_text: self.response.to_string() })
        }
        async fn health_check(&self) -> Result<crate::domain::ports::llm_substrate::HealthStatus, crate::domain::ports::llm_substrate::SubstrateError> {
            Ok(crate::domain::ports::llm_substrate::HealthStatus::Healthy)
        }
    }

    #[tokio::test]
    async fn validate_with_llm_reads_score_and_feedback_from_the_response() {
        let llm = StubLlm { response: serde_json::json!({"score": 42, "feedback": "missing edge case"}) };
        let task = Task::new("t", "build a parser");
        let outcome = validate_with_llm(&llm, &task, &serde_json::json!({"summary": "done"})).await;
        assert_eq!(outcome.score, 42);
        assert_eq!(outcome.feedback, "missing edge case");
    }
}
