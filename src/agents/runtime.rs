//! Agent runtime (§4.8): registers agents, spawns their control loops, and
//! routes messages between them with at-most-once local delivery. A missing
//! recipient is logged and the message dropped rather than erroring the
//! sender.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::domain::models::agent::{Agent, AgentMetrics};
use crate::domain::models::message::{Message, Performative};
use crate::domain::models::task::Task;
use crate::domain::ports::tool::ToolRegistry;
use crate::environment::Environment;

use super::core::{AgentCore, AgentStrategy, RouterCommand, TaskOutcome};

struct AgentHandle {
    mailbox_tx: mpsc::UnboundedSender<Message>,
    task_tx: mpsc::UnboundedSender<Task>,
    snapshot_rx: watch::Receiver<Agent>,
    running: Arc<AtomicBool>,
}

/// Owns every running agent's channels and fans messages between them.
pub struct AgentRuntime {
    handles: HashMap<Uuid, AgentHandle>,
    tools: Arc<ToolRegistry>,
    env: Environment,
    router_tx: mpsc::UnboundedSender<RouterCommand>,
    router_rx: Option<mpsc::UnboundedReceiver<RouterCommand>>,
    result_tx: mpsc::UnboundedSender<TaskOutcome>,
    result_rx: Option<mpsc::UnboundedReceiver<TaskOutcome>>,
}

impl AgentRuntime {
    pub fn new(tools: Arc<ToolRegistry>, env: Environment) -> Self {
        let (router_tx, router_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        Self {
            handles: HashMap::new(),
            tools,
            env,
            router_tx,
            router_rx: Some(router_rx),
            result_tx,
            result_rx: Some(result_rx),
        }
    }

    /// Register an agent with its strategy and spawn its control loop.
    /// Returns the agent's id and a receiver for task outcomes it produces
    /// (the caller typically forwards these to the swarm's result-handling
    /// loop instead of polling here directly).
    pub fn register_agent(&mut self, agent: Agent, strategy: Box<dyn AgentStrategy>) -> Uuid {
        let id = agent.id;
        let (mailbox_tx, mailbox_rx) = mpsc::unbounded_channel();
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(agent.clone());

        let core = AgentCore::new(
            agent,
            strategy,
            mailbox_rx,
            task_rx,
            self.router_tx.clone(),
            self.result_tx.clone(),
            Arc::clone(&self.tools),
            self.env.clone(),
        )
        .with_snapshot_channel(snapshot_tx);

        let running = core.stop_handle();
        tokio::spawn(core.run());

        self.handles.insert(id, AgentHandle { mailbox_tx, task_tx, snapshot_rx, running });
        id
    }

    pub fn stop_agent(&self, id: Uuid) {
        if let Some(handle) = self.handles.get(&id) {
            handle.running.store(false, std::sync::atomic::Ordering::SeqCst);
        }
    }

    pub fn assign_task(&self, agent_id: Uuid, task: Task) -> Result<(), String> {
        let handle = self.handles.get(&agent_id).ok_or_else(|| format!("unknown agent {agent_id}"))?;
        handle.task_tx.send(task).map_err(|e| e.to_string())
    }

    /// Deliver a message to its recipient's mailbox if it's registered
    /// locally; otherwise log and drop (at-most-once local delivery).
    pub async fn send_message(&self, sender_id: Uuid, receiver_id: Uuid, performative: Performative, content: serde_json::Value) {
        let message = Message::new(sender_id, receiver_id, performative, content);
        self.deliver(message).await;
    }

    /// Deliver a message already addressed by the caller (e.g. one drained
    /// from a [`RouterCommand::Send`]) without constructing a new one.
    pub async fn deliver_message(&self, message: Message) {
        self.deliver(message).await;
    }

    async fn deliver(&self, message: Message) {
        match self.handles.get(&message.receiver_id) {
            Some(handle) => {
                if handle.mailbox_tx.send(message).is_err() {
                    tracing::warn!("agent mailbox closed, message dropped");
                }
                self.env
                    .push_event(crate::domain::models::environment::EnvironmentEvent::new(
                        "message_sent",
                        Uuid::nil(),
                        serde_json::json!({}),
                    ))
                    .await;
            }
            None => {
                tracing::warn!(receiver_id = %message.receiver_id, "message recipient not registered locally, dropping");
            }
        }
    }

    pub fn list_agents(&self) -> Vec<Agent> {
        self.handles.values().map(|h| h.snapshot_rx.borrow().clone()).collect()
    }

    pub fn get_metrics(&self, agent_id: Uuid) -> Option<AgentMetrics> {
        self.handles.get(&agent_id).map(|h| h.snapshot_rx.borrow().metrics.clone())
    }

    /// Take ownership of the router receiver to drive the runtime's own
    /// message-forwarding loop; call once at startup.
    pub fn take_router_rx(&mut self) -> Option<mpsc::UnboundedReceiver<RouterCommand>> {
        self.router_rx.take()
    }

    pub fn take_result_rx(&mut self) -> Option<mpsc::UnboundedReceiver<TaskOutcome>> {
        self.result_rx.take()
    }

    /// Drain one router command, delivering the message it carries. The
    /// coordinator's main loop calls this (or loops over it) after taking
    /// the receiver via `take_router_rx`.
    pub async fn drive_router(&self, mut router_rx: mpsc::UnboundedReceiver<RouterCommand>) {
        while let Some(RouterCommand::Send(message)) = router_rx.recv().await {
            self.deliver(message).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::reactive::ReactiveAgentStrategy;
    use crate::domain::models::agent::AgentMode;

    #[tokio::test]
    async fn unregistered_recipient_is_dropped_not_errored() {
        let runtime = AgentRuntime::new(Arc::new(ToolRegistry::default()), Environment::new());
        runtime.send_message(Uuid::new_v4(), Uuid::new_v4(), Performative::Inform, serde_json::json!({})).await;
    }

    #[tokio::test]
    async fn registering_an_agent_makes_it_listable() {
        let mut runtime = AgentRuntime::new(Arc::new(ToolRegistry::default()), Environment::new());
        let agent = Agent::new("watcher", "monitor", AgentMode::Reactive);
        let id = runtime.register_agent(agent, Box::new(ReactiveAgentStrategy::new(Vec::new())));
        tokio::task::yield_now().await;
        let agents = runtime.list_agents();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].id, id);
        runtime.stop_agent(id);
    }
}
