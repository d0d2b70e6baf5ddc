//! Swarm coordinator (§4.9): the hardest subsystem. Ties together intake,
//! decomposition, scheduling, dispatch, task monitoring, result handling,
//! and checkpointing. Grounded on the teacher's `SwarmOrchestrator`
//! `SwarmConfig`/`run()`/`tick()` shape; the decomposition/DAG/validation
//! logic itself is original to this crate's task-swarm domain.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::agents::core::{AgentStrategy, TaskOutcome};
use crate::agents::reactive::ReactiveAgentStrategy;
use crate::agents::runtime::AgentRuntime;
use crate::domain::models::agent::{Agent, AgentMode, AgentState};
use crate::domain::models::config::SwarmSettings;
use crate::domain::models::task::{Task, TaskStatus};
use crate::domain::ports::llm_substrate::LlmSubstrate;
use crate::domain::ports::tool::ToolRegistry;
use crate::environment::Environment;

use super::checkpoint::Checkpoint;
use super::decomposition::Decomposer;
use super::scheduler::TaskScheduler;
use super::selection::AgentSelector;
use super::validation::{self, ValidationOutcome, ValidationPolicy};

type ShutdownHook = Box<dyn Fn() + Send + Sync>;

pub struct SwarmCoordinator {
    settings: SwarmSettings,
    tasks: Arc<RwLock<HashMap<Uuid, Task>>>,
    runtime: Arc<Mutex<AgentRuntime>>,
    scheduler: TaskScheduler,
    selector: AgentSelector,
    validation_policy: ValidationPolicy,
    llm: Arc<dyn LlmSubstrate>,
    env: Environment,
    running: Arc<AtomicBool>,
    accepting_tasks: AtomicBool,
    auto_scale_events: AtomicU64,
    recovery_count: AtomicU64,
    shutdown_hooks: Mutex<Vec<ShutdownHook>>,
}

impl SwarmCoordinator {
    pub fn new(settings: SwarmSettings, tools: Arc<ToolRegistry>, llm: Arc<dyn LlmSubstrate>, env: Environment) -> Self {
        Self {
            runtime: Arc::new(Mutex::new(AgentRuntime::new(tools, env.clone()))),
            tasks: Arc::new(RwLock::new(HashMap::new())),
            scheduler: TaskScheduler::new(),
            selector: AgentSelector::new(),
            validation_policy: ValidationPolicy::default(),
            llm,
            env,
            settings,
            running: Arc::new(AtomicBool::new(true)),
            accepting_tasks: AtomicBool::new(true),
            auto_scale_events: AtomicU64::new(0),
            recovery_count: AtomicU64::new(0),
            shutdown_hooks: Mutex::new(Vec::new()),
        }
    }

    /// Register a callback run when [`Self::stop`] is called (spec.md §9
    /// Open Question 2: no implicit global signal handler — the embedding
    /// binary wires OS signals to this itself).
    pub async fn register_shutdown_hook(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.shutdown_hooks.lock().await.push(Box::new(hook));
    }

    pub async fn register_agent(&self, agent: Agent, strategy: Box<dyn AgentStrategy>) -> Uuid {
        if self.runtime.lock().await.list_agents().len() >= self.settings.max_agents {
            tracing::warn!("registering agent beyond configured max_agents");
        }
        self.runtime.lock().await.register_agent(agent, strategy)
    }

    /// Intake loop entry point: a new task arrives from outside the swarm.
    /// Rejected silently (but still given an id) once [`Self::stop`] has
    /// begun draining — the caller should stop submitting once `stop()` is
    /// in flight, this is a last-line guard against a race with it.
    pub async fn submit_task(&self, task: Task) -> Uuid {
        let id = task.id;
        if !self.accepting_tasks.load(Ordering::SeqCst) {
            tracing::warn!(task_id = %id, "rejecting task submission: coordinator is shutting down");
            return id;
        }
        self.tasks.write().await.insert(id, task);
        id
    }

    /// Intake entry point (§4.9 "Intake"): turn a free-form natural-language
    /// request into a root task, mark it for decomposition, and enqueue it.
    /// Distinct from `submit_task`, which accepts an already-built `Task`
    /// and dispatches it directly without ever going through decomposition.
    pub async fn process_request(&self, request: impl Into<String>) -> Uuid {
        let request = request.into();
        let task = Task::new(request.clone(), request).with_awaiting_decomposition(true);
        self.submit_task(task).await
    }

    pub fn auto_scale_events(&self) -> u64 {
        self.auto_scale_events.load(Ordering::SeqCst)
    }

    pub fn recovery_count(&self) -> u64 {
        self.recovery_count.load(Ordering::SeqCst)
    }

    /// Decomposition loop: split a root task into subtasks via the LLM,
    /// reject the whole batch if it would introduce a dependency cycle.
    pub async fn decompose_root(&self, root_id: Uuid) -> Result<Vec<Uuid>, String> {
        if !self.settings.features.enable_task_decomposition {
            return Err("task decomposition is disabled".to_string());
        }

        let root = {
            let tasks = self.tasks.read().await;
            tasks.get(&root_id).cloned().ok_or_else(|| format!("root task {root_id} not found"))?
        };

        let decomposer = Decomposer::new(self.llm.as_ref());
        let subtasks = decomposer.decompose(&root).await?;

        let mut tasks = self.tasks.write().await;
        let mut combined = tasks.clone();
        for subtask in &subtasks {
            combined.insert(subtask.id, subtask.clone());
        }
        self.scheduler.check_for_cycles(&combined).map_err(|e| e.to_string())?;

        let ids: Vec<Uuid> = subtasks.iter().map(|t| t.id).collect();
        for subtask in subtasks {
            tasks.insert(subtask.id, subtask);
        }
        if let Some(root_task) = tasks.get_mut(&root_id) {
            let _ = root_task.transition_to(TaskStatus::Planning);
        }
        Ok(ids)
    }

    /// Scheduler loop's decomposition step (spec.md §4.9 "Scheduler loop":
    /// "if the task is a decomposable root that has not been decomposed,
    /// enters decomposition; otherwise checks dependencies"). Runs before
    /// `schedulable_tasks` ever sees a task, so a root marked by
    /// [`Self::process_request`] is never handed to a worker agent whole.
    ///
    /// A decomposition that yields no subtasks, or that finds decomposition
    /// disabled, is not a failure — line 162: "If decomposition yields no
    /// subtasks, the root task is scheduled directly". A genuine dependency
    /// cycle (or any other decomposer error) fails the root outright.
    async fn decompose_pending_roots(&self) {
        let pending_roots: Vec<Uuid> = {
            let tasks = self.tasks.read().await;
            tasks.values().filter(|t| t.is_undecomposed_root()).map(|t| t.id).collect()
        };

        for root_id in pending_roots {
            match self.decompose_root(root_id).await {
                Ok(_) => {
                    if let Some(task) = self.tasks.write().await.get_mut(&root_id) {
                        task.awaiting_decomposition = false;
                    }
                }
                Err(message) if message.contains("zero subtasks") || message.contains("disabled") => {
                    if let Some(task) = self.tasks.write().await.get_mut(&root_id) {
                        task.awaiting_decomposition = false;
                    }
                }
                Err(message) => {
                    tracing::warn!(task_id = %root_id, error = %message, "root task decomposition failed");
                    if let Some(task) = self.tasks.write().await.get_mut(&root_id) {
                        task.awaiting_decomposition = false;
                        task.force_status(TaskStatus::Failed, "root task decomposition failed");
                        task.error = Some(message);
                    }
                }
            }
        }
    }

    /// Scheduler + dispatch loop: assign every currently-schedulable task
    /// to the best-scoring idle agent.
    pub async fn dispatch_ready_tasks(&self) {
        self.decompose_pending_roots().await;

        let runtime = self.runtime.lock().await;
        let idle: Vec<Agent> = runtime.list_agents().into_iter().filter(Agent::is_idle).collect();
        if idle.is_empty() {
            return;
        }

        let mut tasks = self.tasks.write().await;
        let ready_ids: Vec<Uuid> = self.scheduler.schedulable_tasks(&tasks).into_iter().map(|t| t.id).collect();

        for task_id in ready_ids {
            let Some(task_snapshot) = tasks.get(&task_id).cloned() else { continue };
            let Some(agent) = self.selector.select_best(&idle, &task_snapshot) else { continue };

            if let Some(task) = tasks.get_mut(&task_id) {
                if task.transition_to(TaskStatus::Assigned).is_err() {
                    continue;
                }
                task.assigned_agent_id = Some(agent.id);
                let _ = task.transition_to(TaskStatus::InProgress);
            }

            if let Some(assigned) = tasks.get(&task_id).cloned() {
                if let Err(err) = runtime.assign_task(agent.id, assigned) {
                    tracing::warn!(task_id = %task_id, error = %err, "failed to dispatch task to agent");
                }
            }
        }
    }

    /// Result-handling loop: LLM-validate a reported success against the
    /// task description (spec.md §4.9 "Result handling"), then apply the
    /// validation/retry policy. The coordinator drives this, not the
    /// reporting agent (§4.6 point 4) — an agent-reported error fails
    /// validation outright, no LLM call needed to confirm a failure.
    pub async fn handle_task_outcome(&self, outcome: TaskOutcome) {
        let TaskOutcome { task_id, result } = outcome;

        let task_snapshot = {
            let mut tasks = self.tasks.write().await;
            let Some(task) = tasks.get_mut(&task_id) else {
                tracing::warn!(task_id = %task_id, "outcome for unknown task");
                return;
            };
            let _ = task.transition_to(TaskStatus::Validating);
            task.clone()
        };

        let validation = match &result {
            Err(message) => ValidationOutcome { score: 0, feedback: message.clone() },
            Ok(value) if self.settings.features.enable_validation => {
                validation::validate_with_llm(self.llm.as_ref(), &task_snapshot, value).await
            }
            Ok(_) => ValidationOutcome { score: 100, feedback: "agent reported success".to_string() },
        };

        let mut tasks = self.tasks.write().await;
        let Some(task) = tasks.get_mut(&task_id) else { return };
        self.validation_policy.apply(task, validation);

        if let Ok(value) = result {
            task.result = Some(value);
        }
        let parent_id = task.parent_id;

        if let Some(parent_id) = parent_id {
            Self::propagate_parent_completion(&mut tasks, parent_id);
        }
    }

    /// When every sibling under `parent_id` has reached a terminal status,
    /// roll the parent itself to completed/failed and aggregate the
    /// children's results into it (spec.md §4.9 "Result handling").
    fn propagate_parent_completion(tasks: &mut HashMap<Uuid, Task>, parent_id: Uuid) {
        let mut children = tasks.values().filter(|t| t.parent_id == Some(parent_id));
        if !children.all(Task::is_terminal) {
            return;
        }
        let any_failed = tasks.values().any(|t| t.parent_id == Some(parent_id) && t.status == TaskStatus::Failed);
        let child_results: Vec<serde_json::Value> =
            tasks.values().filter(|t| t.parent_id == Some(parent_id)).filter_map(|t| t.result.clone()).collect();

        let Some(parent) = tasks.get_mut(&parent_id) else { return };
        if parent.is_terminal() {
            return;
        }
        if any_failed {
            parent.force_status(TaskStatus::Failed, "one or more subtasks failed");
        } else {
            parent.force_status(TaskStatus::Completed, "all subtasks completed");
            parent.result = Some(serde_json::Value::Array(child_results));
        }
    }

    /// Task-monitor loop: fail any task that has exceeded
    /// `task_timeout_secs` in `InProgress` and let the validation policy
    /// decide whether it's retried.
    pub async fn monitor_timed_out_tasks(&self) {
        let timeout = chrono::Duration::seconds(self.settings.task_timeout_secs as i64);
        let mut tasks = self.tasks.write().await;
        let now = Utc::now();

        let timed_out: Vec<Uuid> = tasks
            .values()
            .filter(|t| t.status == TaskStatus::InProgress)
            .filter(|t| t.started_at.map(|s| now - s > timeout).unwrap_or(false))
            .map(|t| t.id)
            .collect();

        for id in timed_out {
            if let Some(task) = tasks.get_mut(&id) {
                task.force_status(TaskStatus::Failed, "task exceeded task_timeout_secs");
                task.error = Some("timed out".to_string());
                if task.can_retry() {
                    let _ = task.retry();
                }
            }
        }
    }

    /// Auto-scaling loop (spec.md §4.9 "Auto-scaling"). Scale up when the
    /// ready queue dwarfs idle capacity and there's still room under
    /// `max_agents`; scale down an idle agent when the host is under CPU
    /// pressure and idle capacity exceeds the configured floor.
    pub async fn autoscale(&self) {
        if !self.settings.features.enable_auto_scaling {
            return;
        }
        let mut runtime = self.runtime.lock().await;
        let agents = runtime.list_agents();
        let total_agents = agents.len();
        let idle_agents = agents.iter().filter(|a| a.is_idle()).count();

        let queue_size = {
            let tasks = self.tasks.read().await;
            self.scheduler.schedulable_tasks(&tasks).len()
        };

        if queue_size > idle_agents.max(1) * 5 && total_agents < self.settings.max_agents {
            let worker = Agent::new(format!("autoscaled-worker-{total_agents}"), "worker", AgentMode::Reactive);
            runtime.register_agent(worker, Box::new(ReactiveAgentStrategy::new(Vec::new())));
            self.auto_scale_events.fetch_add(1, Ordering::SeqCst);
            tracing::info!(queue_size, total_agents, "auto-scaled up: spawned worker agent");
            return;
        }

        let cpu_percent = self.env.host_metrics().await.cpu_percent;
        if cpu_percent > self.settings.max_cpu_percent && idle_agents > self.settings.min_idle_agents {
            if let Some(victim) = agents.iter().find(|a| a.is_idle()) {
                runtime.stop_agent(victim.id);
                self.auto_scale_events.fetch_add(1, Ordering::SeqCst);
                tracing::info!(agent_id = %victim.id, cpu_percent, "auto-scaled down: stopped idle agent");
            }
        }
    }

    /// Load-balancing loop (spec.md §4.9 "Load balancing"). Move an
    /// assigned-but-not-yet-started task off the most loaded agent onto the
    /// least loaded idle one, once the spread between them is material.
    pub async fn rebalance_load(&self) {
        if !self.settings.features.enable_load_balancing {
            return;
        }
        let agents = self.runtime.lock().await.list_agents();
        if agents.len() < 2 {
            return;
        }
        let max_load = agents.iter().map(|a| a.metrics.active_tasks).max().unwrap_or(0);
        let min_load = agents.iter().map(|a| a.metrics.active_tasks).min().unwrap_or(0);
        if max_load.saturating_sub(min_load) < 2 {
            return;
        }
        let Some(underloaded) = agents.iter().find(|a| a.metrics.active_tasks == min_load && a.is_idle()) else { return };
        let overloaded: Vec<Uuid> = agents.iter().filter(|a| a.metrics.active_tasks == max_load).map(|a| a.id).collect();

        let mut tasks = self.tasks.write().await;
        let reassignable = tasks.values_mut().find(|t| {
            t.status == TaskStatus::Assigned && t.assigned_agent_id.map(|id| overloaded.contains(&id)).unwrap_or(false)
        });
        if let Some(task) = reassignable {
            tracing::info!(task_id = %task.id, to = %underloaded.id, "load-balancing: reassigning queued task");
            task.assigned_agent_id = Some(underloaded.id);
        }
    }

    /// Fault-recovery loop (spec.md §4.9 "Fault recovery"): a task still
    /// `InProgress` whose assigned agent has gone offline (or vanished from
    /// the registry) is a crash, not a slow task — distinct from
    /// [`Self::monitor_timed_out_tasks`]'s duration-based sweep.
    pub async fn recover_faulted_agents(&self) {
        if !self.settings.features.enable_fault_recovery {
            return;
        }
        let agents: HashMap<Uuid, Agent> =
            self.runtime.lock().await.list_agents().into_iter().map(|a| (a.id, a)).collect();

        let mut tasks = self.tasks.write().await;
        let crashed: Vec<Uuid> = tasks
            .values()
            .filter(|t| t.status == TaskStatus::InProgress)
            .filter(|t| {
                t.assigned_agent_id
                    .map(|id| agents.get(&id).map(|a| a.state == AgentState::Offline).unwrap_or(true))
                    .unwrap_or(false)
            })
            .map(|t| t.id)
            .collect();

        for id in crashed {
            if let Some(task) = tasks.get_mut(&id) {
                task.force_status(TaskStatus::Failed, "assigned agent went offline");
                task.error = Some("agent crash detected".to_string());
                task.assigned_agent_id = None;
                if task.can_retry() {
                    let _ = task.retry();
                }
                self.recovery_count.fetch_add(1, Ordering::SeqCst);
                tracing::warn!(task_id = %id, "fault recovery: requeued task after agent crash");
            }
        }
    }

    /// Checkpointing loop: snapshot every agent + the task registry.
    pub async fn checkpoint(&self, swarm_name: &str) -> std::io::Result<std::path::PathBuf> {
        let agents = self.runtime.lock().await.list_agents();
        let tasks = self.tasks.read().await.clone();
        let project_path = std::path::PathBuf::from(&self.settings.project_root);
        let checkpoint = Checkpoint::new(swarm_name, agents, tasks, project_path);
        let checkpoint_dir = std::path::PathBuf::from(&self.settings.workspace_root).join("checkpoints");
        checkpoint.write(&checkpoint_dir).await
    }

    pub async fn task_snapshot(&self) -> HashMap<Uuid, Task> {
        self.tasks.read().await.clone()
    }

    pub async fn list_agents(&self) -> Vec<Agent> {
        self.runtime.lock().await.list_agents()
    }

    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Drive every concurrent loop (dispatch, task-monitor, checkpointing)
    /// on their configured intervals until `stop()` is called. Message
    /// routing and result-handling are driven separately by
    /// [`Self::spawn_message_router`] / consuming `take_result_rx`, since
    /// those are push-driven rather than interval-driven.
    pub async fn run(self: Arc<Self>, swarm_name: String) {
        let mut dispatch_tick = tokio::time::interval(std::time::Duration::from_secs(self.settings.coordination_interval_secs.max(1)));
        let mut monitor_tick = tokio::time::interval(std::time::Duration::from_secs(self.settings.monitoring_interval_secs.max(1)));
        let mut checkpoint_tick = tokio::time::interval(std::time::Duration::from_secs(self.settings.checkpoint_interval_secs.max(1)));

        while self.running.load(Ordering::SeqCst) {
            tokio::select! {
                _ = dispatch_tick.tick() => {
                    self.rebalance_load().await;
                    self.dispatch_ready_tasks().await;
                }
                _ = monitor_tick.tick() => {
                    self.monitor_timed_out_tasks().await;
                    self.recover_faulted_agents().await;
                    self.autoscale().await;
                }
                _ = checkpoint_tick.tick() => {
                    if let Err(err) = self.checkpoint(&swarm_name).await {
                        tracing::warn!(error = %err, "checkpoint write failed");
                    }
                }
            }
        }
    }

    /// Shutdown (spec.md §4.9 "Shutdown"): stop accepting new tasks, wait
    /// for in-flight tasks to reach a terminal status up to
    /// `task_timeout_secs`, stop every registered agent, flush one final
    /// checkpoint, then run any registered hooks.
    pub async fn stop(&self) {
        self.accepting_tasks.store(false, Ordering::SeqCst);

        let drain_budget = std::time::Duration::from_secs(self.settings.task_timeout_secs.max(1));
        let deadline = tokio::time::Instant::now() + drain_budget;
        let drained = loop {
            let drained = !self.tasks.read().await.values().any(|t| !t.is_terminal());
            if drained || tokio::time::Instant::now() >= deadline {
                break drained;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        };
        if !drained {
            let mut tasks = self.tasks.write().await;
            for task in tasks.values_mut().filter(|t| !t.is_terminal()) {
                task.force_status(TaskStatus::Failed, "shutdown: task did not complete within drain window");
            }
        }

        {
            let runtime = self.runtime.lock().await;
            for agent in runtime.list_agents() {
                runtime.stop_agent(agent.id);
            }
        }

        self.running.store(false, Ordering::SeqCst);

        if let Err(err) = self.checkpoint("final").await {
            tracing::warn!(error = %err, "final checkpoint write failed during shutdown");
        }

        for hook in self.shutdown_hooks.lock().await.iter() {
            hook();
        }
    }

    /// Take ownership of the runtime's result channel to drive the
    /// result-handling loop; spawn a task that forwards each outcome into
    /// `handle_task_outcome`.
    pub fn spawn_result_handler(self: &Arc<Self>) {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let result_rx = coordinator.runtime.lock().await.take_result_rx();
            if let Some(mut result_rx) = result_rx {
                while let Some(outcome) = result_rx.recv().await {
                    coordinator.handle_task_outcome(outcome).await;
                }
            }
        });
    }

    /// Spawn the message-routing loop that delivers `send_message` actions
    /// agents emit during their BDI cycle. Locks the runtime only for the
    /// duration of each delivery, not for the loop's lifetime, so dispatch
    /// and agent registration are never blocked behind it.
    pub fn spawn_message_router(self: &Arc<Self>) {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let router_rx = coordinator.runtime.lock().await.take_router_rx();
            if let Some(mut router_rx) = router_rx {
                while let Some(crate::agents::RouterCommand::Send(message)) = router_rx.recv().await {
                    coordinator.runtime.lock().await.deliver_message(message).await;
                }
            }
        });
    }
}
