//! Multi-agent swarm orchestrator: a BDI agent runtime (reactive, cognitive,
//! and hybrid agents), an LLM adapter with tiered timeouts and JSON repair,
//! and a constrained software environment (spatial/resource/observability/
//! constraint modules), coordinated by LLM-driven task decomposition and
//! dependency-aware scheduling.
//!
//! This crate is a library: wiring OS signals, a CLI, or a long-running
//! process lives in whatever binary embeds it.

pub mod agents;
pub mod domain;
pub mod environment;
pub mod infrastructure;
pub mod swarm;

pub use agents::{AgentCore, AgentRuntime, AgentStrategy};
pub use domain::{DomainError, DomainResult};
pub use environment::Environment;
pub use swarm::SwarmCoordinator;
