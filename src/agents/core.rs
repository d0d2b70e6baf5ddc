//! Agent control loop (§4.4): drains the mailbox, drains the task queue,
//! and runs one BDI cycle every `bdi_interval`. An exception in any step
//! increments the agent's error counter rather than tearing down the loop;
//! only `stop()` terminates it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::domain::models::agent::Agent;
use crate::domain::models::message::{Message, Performative};
use crate::domain::models::task::Task;
use crate::domain::ports::tool::ToolRegistry;
use crate::environment::Environment;

/// A normalised action object, as produced by an `act()` step.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AgentAction {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub params: HashMap<String, Value>,
}

/// `act()` may return a single action, a list, or a JSON-string list; this
/// normalises all three shapes to a flat `Vec<AgentAction>`.
pub fn normalize_actions(raw: Value) -> Vec<AgentAction> {
    let raw = match raw {
        Value::String(s) => serde_json::from_str::<Value>(&s).unwrap_or(Value::Null),
        other => other,
    };
    match raw {
        Value::Array(items) => items.into_iter().filter_map(|v| serde_json::from_value(v).ok()).collect(),
        Value::Object(_) => serde_json::from_value(raw).map(|a| vec![a]).unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Outcome of a strategy's `handle_task`, reported back to the swarm
/// coordinator's result channel.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task_id: Uuid,
    pub result: Result<Value, String>,
}

/// Mode-specific reasoning strategy. `AgentCore` owns the `Agent` and
/// `Environment`; strategies receive references rather than owning them, so
/// the same core drives reactive, cognitive, and hybrid agents uniformly.
#[async_trait]
pub trait AgentStrategy: Send + Sync {
    async fn perceive(&mut self, agent: &Agent, env: &Environment, stimuli: &[Value]) -> Value;
    async fn deliberate(&mut self, agent: &Agent) -> Vec<String>;
    async fn act(&mut self, agent: &Agent, intentions: &[String]) -> Value;

    /// Default: no reply, caller still records `last_message` in beliefs.
    async fn handle_message(&mut self, _agent: &Agent, _msg: &Message) -> Option<Message> {
        None
    }

    async fn handle_task(&mut self, agent: &Agent, env: &Environment, tools: &ToolRegistry, task: &Task) -> TaskOutcome;
}

/// Commands the core can ask the runtime's router to perform on its behalf.
pub enum RouterCommand {
    Send(Message),
}

pub struct AgentCore {
    pub agent: Agent,
    strategy: Box<dyn AgentStrategy>,
    mailbox_rx: mpsc::UnboundedReceiver<Message>,
    task_rx: mpsc::UnboundedReceiver<Task>,
    router_tx: mpsc::UnboundedSender<RouterCommand>,
    result_tx: mpsc::UnboundedSender<TaskOutcome>,
    tools: Arc<ToolRegistry>,
    env: Environment,
    bdi_interval: Duration,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
    snapshot_tx: Option<watch::Sender<Agent>>,
}

impl AgentCore {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent: Agent,
        strategy: Box<dyn AgentStrategy>,
        mailbox_rx: mpsc::UnboundedReceiver<Message>,
        task_rx: mpsc::UnboundedReceiver<Task>,
        router_tx: mpsc::UnboundedSender<RouterCommand>,
        result_tx: mpsc::UnboundedSender<TaskOutcome>,
        tools: Arc<ToolRegistry>,
        env: Environment,
    ) -> Self {
        Self {
            agent,
            strategy,
            mailbox_rx,
            task_rx,
            router_tx,
            result_tx,
            tools,
            env,
            bdi_interval: Duration::from_secs(5),
            poll_interval: Duration::from_millis(50),
            running: Arc::new(AtomicBool::new(true)),
            snapshot_tx: None,
        }
    }

    /// Publish the agent's state after every loop iteration, so the runtime
    /// can answer `get_metrics`/`list_agents` without owning the agent.
    pub fn with_snapshot_channel(mut self, snapshot_tx: watch::Sender<Agent>) -> Self {
        self.snapshot_tx = Some(snapshot_tx);
        self
    }

    pub fn with_bdi_interval(mut self, interval: Duration) -> Self {
        self.bdi_interval = interval;
        self
    }

    /// A handle the runtime can use to request a graceful stop.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub async fn run(mut self) {
        let mut since_last_cycle = Duration::ZERO;
        while self.running.load(Ordering::SeqCst) {
            while let Ok(msg) = self.mailbox_rx.try_recv() {
                self.handle_message(msg).await;
            }
            while let Ok(task) = self.task_rx.try_recv() {
                self.handle_task(task).await;
            }

            if since_last_cycle >= self.bdi_interval {
                self.run_bdi_cycle().await;
                since_last_cycle = Duration::ZERO;
            }

            if let Some(tx) = &self.snapshot_tx {
                let _ = tx.send(self.agent.clone());
            }

            tokio::time::sleep(self.poll_interval).await;
            since_last_cycle += self.poll_interval;
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    async fn handle_message(&mut self, msg: Message) {
        self.agent.bdi.update_beliefs(serde_json::json!({ "last_message": msg.content.clone() }));
        let reply = self.strategy.handle_message(&self.agent, &msg).await;
        if let Some(reply) = reply {
            let _ = self.router_tx.send(RouterCommand::Send(reply));
        }
    }

    async fn handle_task(&mut self, task: Task) {
        self.agent.metrics.active_tasks += 1;
        let task_id = task.id;
        let outcome = self.strategy.handle_task(&self.agent, &self.env, &self.tools, &task).await;
        self.agent.metrics.active_tasks = self.agent.metrics.active_tasks.saturating_sub(1);
        match &outcome.result {
            Ok(_) => self.agent.metrics.completed += 1,
            Err(_) => self.agent.metrics.failed += 1,
        }
        let _ = self.result_tx.send(TaskOutcome { task_id, result: outcome.result });
    }

    /// perceive(env) -> update_beliefs(p) -> intentions := deliberate() -> for
    /// each intention commit -> if any committed, actions := act() -> for
    /// each action execute.
    async fn run_bdi_cycle(&mut self) {
        let stimuli = self.build_stimuli().await;
        let perception = self.strategy.perceive(&self.agent, &self.env, &stimuli).await;
        self.agent.bdi.update_beliefs(perception);

        let intentions = self.strategy.deliberate(&self.agent).await;
        if intentions.is_empty() {
            return;
        }
        for intention in &intentions {
            self.agent.bdi.commit_intention(intention.clone());
        }

        let raw_actions = self.strategy.act(&self.agent, &intentions).await;
        for action in normalize_actions(raw_actions) {
            if let Err(err) = self.execute_action(action).await {
                tracing::warn!(agent_id = %self.agent.id, error = %err, "bdi action execution failed");
                self.agent.metrics.errors += 1;
            }
        }
    }

    async fn build_stimuli(&self) -> Vec<Value> {
        let location = crate::domain::models::environment::SoftwareLocation::new("localhost", std::process::id(), "/");
        self.env
            .events_visible_to(self.agent.id, &location)
            .await
            .into_iter()
            .map(|e| serde_json::json!({ "type": e.event_type, "source_id": e.source_id, "data": e.data }))
            .collect()
    }

    async fn execute_action(&mut self, action: AgentAction) -> Result<(), String> {
        match action.action_type.as_str() {
            "tool_call" => {
                let tool_name = action
                    .params
                    .get("tool")
                    .and_then(Value::as_str)
                    .ok_or_else(|| "tool_call missing 'tool' param".to_string())?;
                let tool_params: HashMap<String, Value> = action
                    .params
                    .get("params")
                    .and_then(|v| v.as_object())
                    .map(|m| m.clone().into_iter().collect())
                    .unwrap_or_default();
                let action_name = action.params.get("action").and_then(Value::as_str).unwrap_or("execute");

                let Some(tool) = self.tools.get_by_name(tool_name) else {
                    return Err(format!("unknown tool: {tool_name}"));
                };
                let result = tool.execute(action_name, tool_params).await;
                self.agent.bdi.update_beliefs(serde_json::json!({
                    (format!("last_{tool_name}_result")): result.data,
                    (format!("last_{tool_name}_success")): result.success,
                    (format!("last_{tool_name}_error")): result.error,
                }));
                Ok(())
            }
            "send_message" => {
                let receiver_id = action
                    .params
                    .get("to")
                    .and_then(Value::as_str)
                    .and_then(|s| Uuid::parse_str(s).ok())
                    .ok_or_else(|| "send_message missing valid 'to' param".to_string())?;
                let performative = action
                    .params
                    .get("performative")
                    .and_then(Value::as_str)
                    .and_then(parse_performative)
                    .unwrap_or(Performative::Inform);
                let content = action.params.get("content").cloned().unwrap_or(Value::Null);
                let message = Message::new(self.agent.id, receiver_id, performative, content);
                self.router_tx
                    .send(RouterCommand::Send(message))
                    .map_err(|e| e.to_string())
            }
            "update_belief" => {
                let update = action.params.get("beliefs").cloned().unwrap_or(Value::Object(action.params.clone().into_iter().collect()));
                self.agent.bdi.update_beliefs(update);
                Ok(())
            }
            other => {
                tracing::debug!(action_type = other, "ignoring unknown action type");
                Ok(())
            }
        }
    }
}

fn parse_performative(s: &str) -> Option<Performative> {
    match s {
        "inform" => Some(Performative::Inform),
        "request" => Some(Performative::Request),
        "propose" => Some(Performative::Propose),
        "accept" => Some(Performative::Accept),
        "reject" => Some(Performative::Reject),
        "query" => Some(Performative::Query),
        "subscribe" => Some(Performative::Subscribe),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_actions_handles_object_array_and_json_string() {
        let single = serde_json::json!({"type": "update_belief", "params": {}});
        assert_eq!(normalize_actions(single).len(), 1);

        let list = serde_json::json!([{"type": "a"}, {"type": "b"}]);
        assert_eq!(normalize_actions(list).len(), 2);

        let string_list = Value::String(r#"[{"type": "a"}]"#.to_string());
        assert_eq!(normalize_actions(string_list).len(), 1);
    }
}
