//! Task decomposition (§4.9 "Decomposition loop"): the coordinator asks the
//! LLM substrate to split a root task into a dependency-respecting subtask
//! list. Leaf cognitive agents never decompose — only this module does.

use serde_json::Value;
use uuid::Uuid;

use crate::domain::models::task::{Task, TaskPriority, TaskType};
use crate::domain::ports::llm_substrate::{GenerateOutcome, GenerateParams, LlmSubstrate, TaskTier};

const DECOMPOSITION_PROMPT_TEMPLATE: &str = r#"Decompose this task into an ordered list of subtasks. Respond with JSON: {"subtasks": [{"name": string, "description": string, "task_type": "analysis"|"design"|"implementation"|"testing"|"deployment"|"general"|"validation", "priority": "low"|"medium"|"high"|"critical", "depends_on_indices": [integer], "required_agent_type": string|null}]}.

Task: {name}
Description: {description}"#;

pub struct Decomposer<'a> {
    llm: &'a dyn LlmSubstrate,
}

impl<'a> Decomposer<'a> {
    pub fn new(llm: &'a dyn LlmSubstrate) -> Self {
        Self { llm }
    }

    /// Decompose `root`, returning subtasks wired as children of `root` via
    /// `parent_id`/`depends_on` (indices in the LLM's response map to the
    /// returned `Vec`'s positions). Caller is responsible for cycle
    /// detection over the resulting set before scheduling.
    pub async fn decompose(&self, root: &Task) -> Result<Vec<Task>, String> {
        let prompt = DECOMPOSITION_PROMPT_TEMPLATE.replace("{name}", &root.name).replace("{description}", &root.description);
        let params = GenerateParams { json_response: true, task_tier: TaskTier::Complex, ..Default::default() };

        let response = match self.llm.generate(root.id, &prompt, &params).await {
            Ok(GenerateOutcome::Ok { response, .. }) => response,
            Ok(GenerateOutcome::Fallback { fallback, .. }) => return Err(fallback.message),
            Err(err) => return Err(err.to_string()),
        };

        let subtasks = response.get("subtasks").and_then(Value::as_array).ok_or("decomposition response missing 'subtasks' array")?;
        if subtasks.is_empty() {
            return Err("decomposition produced zero subtasks".to_string());
        }

        let ids: Vec<Uuid> = subtasks.iter().map(|_| Uuid::new_v4()).collect();
        let mut tasks = Vec::with_capacity(subtasks.len());

        for (index, raw) in subtasks.iter().enumerate() {
            let name = raw.get("name").and_then(Value::as_str).unwrap_or("subtask").to_string();
            let description = raw.get("description").and_then(Value::as_str).unwrap_or("").to_string();
            let task_type = raw.get("task_type").and_then(Value::as_str).and_then(TaskType::from_str).unwrap_or_default();
            let priority = raw.get("priority").and_then(Value::as_str).and_then(TaskPriority::from_str).unwrap_or_default();
            let required_agent_type = raw.get("required_agent_type").and_then(Value::as_str).map(str::to_string);

            let depends_on: Vec<Uuid> = raw
                .get("depends_on_indices")
                .and_then(Value::as_array)
                .map(|arr| arr.iter().filter_map(Value::as_u64).filter_map(|i| ids.get(i as usize).copied()).collect())
                .unwrap_or_default();

            let mut task = Task::new(name, description).with_parent(root.id).with_task_type(task_type).with_priority(priority);
            task.id = ids[index];
            task.depends_on = depends_on;
            task.required_agent_type = required_agent_type;
            task.source = crate::domain::models::task::TaskSource::SubtaskOf(root.id);
            tasks.push(task);
        }

        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::domain::ports::llm_substrate::{HealthStatus, SubstrateError};

    struct StubLlm {
        response: Value,
    }

    #[async_trait]
    impl LlmSubstrate for StubLlm {
        fn substrate_id(&self) -> &str {
            "stub"
        }
        async fn generate(&self, _task_id: Uuid, _prompt: &str, _params: &GenerateParams) -> Result<GenerateOutcome, SubstrateError> {
            Ok(GenerateOutcome::Ok { response: self.response.clone(), raw_text: self.response.to_string() })
        }
        async fn health_check(&self) -> Result<HealthStatus, SubstrateError> {
            Ok(HealthStatus::Healthy)
        }
    }

    #[tokio::test]
    async fn decompose_wires_dependencies_by_index() {
        let llm = StubLlm {
            response: serde_json::json!({
                "subtasks": [
                    {"name": "design", "description": "design it", "task_type": "design", "priority": "high", "depends_on_indices": []},
                    {"name": "implement", "description": "build it", "task_type": "implementation", "priority": "medium", "depends_on_indices": [0]}
                ]
            }),
        };
        let decomposer = Decomposer::new(&llm);
        let root = Task::new("root", "root task");
        let subtasks = decomposer.decompose(&root).await.unwrap();

        assert_eq!(subtasks.len(), 2);
        assert_eq!(subtasks[1].depends_on, vec![subtasks[0].id]);
        assert_eq!(subtasks[0].parent_id, Some(root.id));
    }

    #[tokio::test]
    async fn empty_subtask_list_is_an_error() {
        let llm = StubLlm { response: serde_json::json!({"subtasks": []}) };
        let decomposer = Decomposer::new(&llm);
        let root = Task::new("root", "root task");
        assert!(decomposer.decompose(&root).await.is_err());
    }
}
