//! Swarm coordination (§4.9): decomposition, dependency-aware scheduling,
//! agent selection, validation/retry, checkpointing, and the coordinator
//! that drives all of it.

pub mod checkpoint;
pub mod coordinator;
pub mod decomposition;
pub mod layout;
pub mod scheduler;
pub mod selection;
pub mod validation;

pub use checkpoint::Checkpoint;
pub use coordinator::SwarmCoordinator;
pub use decomposition::Decomposer;
pub use scheduler::TaskScheduler;
pub use selection::AgentSelector;
pub use validation::{ValidationOutcome, ValidationPolicy};
