//! Cognitive agent: analyse -> solve -> validate, backed by an LLM
//! substrate (§4.6). Decomposition is deliberately absent here — only the
//! swarm coordinator decomposes root tasks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::models::agent::Agent;
use crate::domain::models::message::{Message, Performative};
use crate::domain::models::task::Task;
use crate::domain::ports::llm_substrate::{GenerateOutcome, GenerateParams, LlmSubstrate, TaskTier};
use crate::domain::ports::tool::ToolRegistry;
use crate::environment::Environment;

use super::core::TaskOutcome;
use super::core::AgentStrategy;

pub struct CognitiveAgentStrategy {
    llm: Arc<dyn LlmSubstrate>,
}

impl CognitiveAgentStrategy {
    pub fn new(llm: Arc<dyn LlmSubstrate>) -> Self {
        Self { llm }
    }

    async fn analyse(&self, task: &Task) -> Result<Value, String> {
        let prompt = format!(
            "Analyse this task and respond with JSON {{\"approach\": string, \"risks\": [string], \"requires_reasoning\": bool}}.\n\nTask: {}\nDescription: {}",
            task.name, task.description
        );
        self.generate_json(task.id, &prompt, TaskTier::Normal).await
    }

    async fn solve(&self, task: &Task, analysis: &Value) -> Result<Value, String> {
        let prompt = format!(
            "Produce a solution for this task as JSON {{\"summary\": string, \"files_to_create\": [{{\"path\": string, \"content\": string}}]}}.\n\nTask: {}\nAnalysis: {}",
            task.description, analysis
        );
        self.generate_json(task.id, &prompt, TaskTier::Complex).await
    }

    async fn validate_solution(&self, task: &Task, solution: &Value) -> Result<Value, String> {
        let prompt = format!(
            "Validate this solution against the task and respond with JSON {{\"score\": integer 0-100, \"passed\": bool, \"feedback\": string}}.\n\nTask: {}\nSolution: {}",
            task.description, solution
        );
        self.generate_json(task.id, &prompt, TaskTier::Normal).await
    }

    async fn generate_json(&self, task_id: Uuid, prompt: &str, tier: TaskTier) -> Result<Value, String> {
        let params = GenerateParams { json_response: true, task_tier: tier, stream: tier == TaskTier::Complex, ..Default::default() };
        match self.llm.generate(task_id, prompt, &params).await {
            Ok(GenerateOutcome::Ok { response, .. }) => Ok(response),
            Ok(GenerateOutcome::Fallback { fallback, .. }) => Err(fallback.message),
            Err(err) => Err(err.to_string()),
        }
    }
}

#[async_trait]
impl AgentStrategy for CognitiveAgentStrategy {
    async fn perceive(&mut self, _agent: &Agent, _env: &Environment, stimuli: &[Value]) -> Value {
        serde_json::json!({ "perceived_stimuli": stimuli })
    }

    async fn deliberate(&mut self, _agent: &Agent) -> Vec<String> {
        Vec::new()
    }

    async fn act(&mut self, _agent: &Agent, _intentions: &[String]) -> Value {
        Value::Array(Vec::new())
    }

    async fn handle_message(&mut self, agent: &Agent, msg: &Message) -> Option<Message> {
        let prompt = format!(
            "Interpret this incoming message and respond with JSON {{\"sender_intent\": string, \"relevance_to_goals\": number, \"belief_updates\": object, \"suggested_response\": string, \"priority\": string}}.\n\nFrom: {}\nContent: {}",
            msg.sender_id, msg.content
        );
        let interpretation = self.generate_json(Uuid::new_v4(), &prompt, TaskTier::Simple).await.ok()?;

        let suggested_response = interpretation.get("suggested_response").and_then(Value::as_str).unwrap_or("acknowledged").to_string();
        Some(Message::reply(msg, Performative::Inform, serde_json::json!({ "text": suggested_response, "agent": agent.id })))
    }

    async fn handle_task(&mut self, _agent: &Agent, _env: &Environment, tools: &ToolRegistry, task: &Task) -> TaskOutcome {
        let result = self.run_task(tools, task).await;
        TaskOutcome { task_id: task.id, result }
    }
}

impl CognitiveAgentStrategy {
    async fn run_task(&self, tools: &ToolRegistry, task: &Task) -> Result<Value, String> {
        let analysis = self.analyse(task).await?;
        let solution = self.solve(task, &analysis).await?;
        let validation = self.validate_solution(task, &solution).await?;

        if let Some(files) = solution.get("files_to_create").and_then(Value::as_array) {
            if let Some(fs_tool) = tools.get_by_name("filesystem") {
                for file in files {
                    let Some(path) = file.get("path").and_then(Value::as_str) else { continue };
                    let content = file.get("content").cloned().unwrap_or(Value::String(String::new()));
                    let canonical_path = crate::swarm::layout::canonicalize_path(path);
                    let mut params: HashMap<String, Value> = HashMap::new();
                    params.insert("path".to_string(), Value::String(canonical_path));
                    params.insert("content".to_string(), content);
                    let result = fs_tool.execute("write", params).await;
                    if !result.success {
                        return Err(result.error.unwrap_or_else(|| "filesystem write failed".to_string()));
                    }
                }
            }
        }

        let passed = validation.get("passed").and_then(Value::as_bool).unwrap_or(false);
        if !passed {
            return Err(validation.get("feedback").and_then(Value::as_str).unwrap_or("validation failed").to_string());
        }

        Ok(serde_json::json!({ "analysis": analysis, "solution": solution, "validation": validation }))
    }
}

