pub mod agent;
pub mod config;
pub mod dag;
pub mod environment;
pub mod message;
pub mod task;

pub use agent::{Agent, AgentMetrics, AgentMode, AgentState, BdiState};
pub use config::SwarmSettings;
pub use dag::{DagError, DagNode, DagStats, TaskDag};
pub use environment::{
    ActionType, ConnectionKind, ConstraintKind, ConstraintViolation, EnvironmentEvent, EventLog,
    ProposedAction, ResourceKind, ResourceUsage, SoftwareLocation, SpatialEntity, VisibilityLevel,
};
pub use message::{Message, Performative};
pub use task::{Task, TaskPriority, TaskSource, TaskStatus, TaskType};
