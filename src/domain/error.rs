//! Crate-wide error taxonomy.
//!
//! Each concern gets its own `thiserror` enum with an `is_transient`
//! classification, following the teacher's per-concern error style; a
//! unified [`DomainError`] wraps all of them at the coordinator boundary,
//! mirroring the teacher's separate `DomainResult` alias.

use uuid::Uuid;

use crate::domain::models::dag::DagError;
use crate::domain::ports::llm_substrate::SubstrateError;

/// Errors raised by task/agent registry operations.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("task not found: {0}")]
    NotFound(Uuid),
    #[error("invalid task state transition: {0}")]
    InvalidTransition(String),
    #[error("dependency cycle detected while decomposing task {0}")]
    DependencyCycle(Uuid),
    #[error("task {0} exceeded its maximum retry count")]
    RetriesExhausted(Uuid),
    #[error("task validation failed: {0}")]
    ValidationFailed(String),
}

impl TaskError {
    pub const fn is_transient(&self) -> bool {
        false
    }

    pub const fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}

/// Errors raised by the environment (resource ledger, constraint engine).
#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("resource denied: {0:?}")]
    ResourceDenied(Vec<crate::domain::models::environment::ConstraintViolation>),
    #[error("unknown resource kind: {0}")]
    UnknownResource(String),
    #[error("unknown agent: {0}")]
    UnknownAgent(Uuid),
}

impl EnvironmentError {
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::ResourceDenied(_))
    }
}

/// Errors surfaced by the runtime when routing or lifecycle management
/// fails.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("agent not found: {0}")]
    AgentNotFound(Uuid),
    #[error("agent {0} is not running")]
    AgentNotRunning(Uuid),
}

/// Errors raised by configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid max_agents: must be greater than zero")]
    InvalidMaxAgents,
    #[error("invalid max_cpu_percent: must be within 0..=100")]
    InvalidCpuPercent,
    #[error("invalid logging format: {0}")]
    InvalidLogFormat(String),
    #[error("config load failed: {0}")]
    LoadFailed(String),
}

/// Crate-wide error, used at component boundaries (coordinator public API,
/// checkpoint I/O).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Dag(#[from] DagError),
    #[error(transparent)]
    Substrate(#[from] SubstrateError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl DomainError {
    /// Whether the caller should retry the operation that produced this
    /// error rather than treat it as terminal.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Task(e) => e.is_transient(),
            Self::Environment(e) => e.is_transient(),
            Self::Substrate(e) => e.is_transient(),
            Self::Runtime(_) | Self::Config(_) | Self::Dag(_) | Self::Serialization(_) | Self::Io(_) => false,
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
