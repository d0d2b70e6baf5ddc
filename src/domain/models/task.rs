//! Task domain model.
//!
//! Tasks are the unit of work the swarm coordinator schedules. They form a
//! DAG via `depends_on` and carry enough state to drive the coordinator's
//! decomposition/scheduling/validation pipeline end to end.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a task in the execution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Analysing,
    Planning,
    Assigned,
    InProgress,
    Validating,
    Completed,
    Failed,
    Cancelled,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Analysing => "analysing",
            Self::Planning => "planning",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Validating => "validating",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "analysing" | "analyzing" => Some(Self::Analysing),
            "planning" => Some(Self::Planning),
            "assigned" => Some(Self::Assigned),
            "in_progress" | "running" => Some(Self::InProgress),
            "validating" => Some(Self::Validating),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Valid transitions from this status.
    ///
    /// State transitions are monotone except `Failed -> Pending`, which the
    /// coordinator uses to re-queue a task while `retry_count < max_retries`.
    pub fn valid_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Pending => &[Self::Analysing, Self::Planning, Self::Assigned, Self::Cancelled],
            Self::Analysing => &[Self::Planning, Self::Failed, Self::Cancelled],
            Self::Planning => &[Self::Assigned, Self::Pending, Self::Failed, Self::Cancelled],
            Self::Assigned => &[Self::InProgress, Self::Pending, Self::Cancelled],
            Self::InProgress => &[Self::Validating, Self::Completed, Self::Failed, Self::Cancelled],
            Self::Validating => &[Self::Completed, Self::Failed, Self::Cancelled],
            Self::Completed => &[],
            Self::Failed => &[Self::Pending],
            Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// Semantic discriminator for the class of work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Analysis,
    Design,
    Implementation,
    Testing,
    Deployment,
    General,
    Validation,
}

impl Default for TaskType {
    fn default() -> Self {
        Self::General
    }
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Design => "design",
            Self::Implementation => "implementation",
            Self::Testing => "testing",
            Self::Deployment => "deployment",
            Self::General => "general",
            Self::Validation => "validation",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "analysis" => Some(Self::Analysis),
            "design" => Some(Self::Design),
            "implementation" => Some(Self::Implementation),
            "testing" => Some(Self::Testing),
            "deployment" => Some(Self::Deployment),
            "general" => Some(Self::General),
            "validation" => Some(Self::Validation),
            _ => None,
        }
    }
}

/// Priority level for tasks. Ordered low to critical for queue pop order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "normal" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Where a task originated from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskSource {
    Root,
    SubtaskOf(Uuid),
}

impl Default for TaskSource {
    fn default() -> Self {
        Self::Root
    }
}

/// A discrete unit of work the coordinator schedules to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub task_type: TaskType,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub parent_id: Option<Uuid>,
    pub child_ids: Vec<Uuid>,
    pub depends_on: Vec<Uuid>,
    pub required_agent_type: Option<String>,
    pub assigned_agent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub validation_score: Option<u8>,
    pub source: TaskSource,
    /// Set by intake (§4.9 "Intake": "marks it for decomposition") for a
    /// root task that should be split before it is ever handed to an
    /// agent. A task built directly via [`Task::new`]/`submit_task` is a
    /// "decomposable root" only if this is set explicitly — most
    /// coordinator tests build already-leaf tasks and rely on it being
    /// `false` by default so they dispatch without a decomposition pass.
    pub awaiting_decomposition: bool,
    /// Free-form metadata consumed by decomposition/selection (e.g.
    /// `required_agent_type` echoes into here too for quick lookups).
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Task {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            task_type: TaskType::default(),
            priority: TaskPriority::default(),
            status: TaskStatus::default(),
            parent_id: None,
            child_ids: Vec::new(),
            depends_on: Vec::new(),
            required_agent_type: None,
            assigned_agent_id: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
            retry_count: 0,
            max_retries: 3,
            validation_score: None,
            source: TaskSource::default(),
            awaiting_decomposition: false,
            metadata: HashMap::new(),
        }
    }

    pub fn with_awaiting_decomposition(mut self, awaiting: bool) -> Self {
        self.awaiting_decomposition = awaiting;
        self
    }

    /// A root task eligible for the coordinator's decomposition pass: a
    /// top-level task (not someone's subtask) that intake has explicitly
    /// marked and that hasn't been through decomposition yet.
    pub fn is_undecomposed_root(&self) -> bool {
        self.awaiting_decomposition && self.source == TaskSource::Root && self.status == TaskStatus::Pending
    }

    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self.source = TaskSource::SubtaskOf(parent_id);
        self
    }

    pub fn with_dependency(mut self, task_id: Uuid) -> Self {
        if !self.depends_on.contains(&task_id) && task_id != self.id {
            self.depends_on.push(task_id);
        }
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    pub fn with_required_agent_type(mut self, agent_type: impl Into<String>) -> Self {
        self.required_agent_type = Some(agent_type.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn is_subtask(&self) -> bool {
        self.parent_id.is_some()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether every dependency id listed is present among `completed`.
    pub fn dependencies_satisfied(&self, completed: &std::collections::HashSet<Uuid>) -> bool {
        self.depends_on.iter().all(|d| completed.contains(d))
    }

    pub fn can_transition_to(&self, new_status: TaskStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    pub fn transition_to(&mut self, new_status: TaskStatus) -> Result<(), String> {
        if !self.can_transition_to(new_status) {
            return Err(format!(
                "cannot transition task {} from {} to {}",
                self.id,
                self.status.as_str(),
                new_status.as_str()
            ));
        }
        self.status = new_status;
        match new_status {
            TaskStatus::InProgress if self.started_at.is_none() => {
                self.started_at = Some(Utc::now())
            }
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => {
                self.completed_at = Some(Utc::now());
            }
            _ => {}
        }
        Ok(())
    }

    /// Force a status transition, bypassing the state machine.
    ///
    /// Reserved for checkpoint restore, where a task registry is re-seeded
    /// from disk and the prior in-memory transition history is unknown.
    pub fn force_status(&mut self, new_status: TaskStatus, reason: &str) {
        tracing::warn!(
            task_id = %self.id,
            from = self.status.as_str(),
            to = new_status.as_str(),
            reason,
            "forcing task status transition (bypassing state machine)"
        );
        self.status = new_status;
        match new_status {
            TaskStatus::InProgress if self.started_at.is_none() => {
                self.started_at = Some(Utc::now())
            }
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => {
                self.completed_at = Some(Utc::now());
            }
            _ => {}
        }
    }

    pub fn can_retry(&self) -> bool {
        self.status == TaskStatus::Failed && self.retry_count < self.max_retries
    }

    /// Increment the retry count and reset to `Pending` for re-scheduling.
    pub fn retry(&mut self) -> Result<(), String> {
        if !self.can_retry() {
            return Err("cannot retry: either not failed or max retries reached".to_string());
        }
        self.retry_count += 1;
        self.transition_to(TaskStatus::Pending)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("task name cannot be empty".to_string());
        }
        if self.description.trim().is_empty() {
            return Err("task description cannot be empty".to_string());
        }
        if self.depends_on.contains(&self.id) {
            return Err("task cannot depend on itself".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task::new("Build calculator", "Create a calculator module")
    }

    #[test]
    fn new_task_starts_pending() {
        let t = task();
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.retry_count, 0);
    }

    #[test]
    fn valid_transition_chain_to_completed() {
        let mut t = task();
        t.transition_to(TaskStatus::Analysing).unwrap();
        t.transition_to(TaskStatus::Planning).unwrap();
        t.transition_to(TaskStatus::Assigned).unwrap();
        t.transition_to(TaskStatus::InProgress).unwrap();
        assert!(t.started_at.is_some());
        t.transition_to(TaskStatus::Validating).unwrap();
        t.transition_to(TaskStatus::Completed).unwrap();
        assert!(t.is_terminal());
        assert!(t.completed_at.is_some());
    }

    #[test]
    fn invalid_transition_rejected() {
        let mut t = task();
        assert!(t.transition_to(TaskStatus::InProgress).is_err());
    }

    #[test]
    fn terminal_states_reject_all_transitions() {
        let mut t = task();
        t.force_status(TaskStatus::Completed, "test");
        assert!(t.transition_to(TaskStatus::Pending).is_err());
        assert!(t.transition_to(TaskStatus::Failed).is_err());
    }

    #[test]
    fn failed_to_pending_is_the_only_non_monotone_transition() {
        let mut t = task();
        t.force_status(TaskStatus::Failed, "test setup");
        assert!(t.can_retry());
        t.retry().unwrap();
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.retry_count, 1);
    }

    #[test]
    fn retry_respects_max_retries() {
        let mut t = task().with_max_retries(1);
        t.force_status(TaskStatus::Failed, "test setup");
        t.retry().unwrap();
        t.force_status(TaskStatus::Failed, "test setup");
        assert!(!t.can_retry());
        assert!(t.retry().is_err());
    }

    #[test]
    fn dependencies_satisfied_checks_full_set() {
        let dep_a = Uuid::new_v4();
        let dep_b = Uuid::new_v4();
        let t = task().with_dependency(dep_a).with_dependency(dep_b);
        let mut completed = std::collections::HashSet::new();
        assert!(!t.dependencies_satisfied(&completed));
        completed.insert(dep_a);
        assert!(!t.dependencies_satisfied(&completed));
        completed.insert(dep_b);
        assert!(t.dependencies_satisfied(&completed));
    }

    #[test]
    fn validate_rejects_empty_fields_and_self_dependency() {
        let mut t = task();
        t.name = String::new();
        assert!(t.validate().is_err());

        let mut t = task();
        t.description = "   ".to_string();
        assert!(t.validate().is_err());

        let mut t = task();
        let id = t.id;
        t.depends_on.push(id);
        assert!(t.validate().is_err());

        assert!(task().validate().is_ok());
    }
}
