pub mod llm_substrate;
pub mod tool;

pub use llm_substrate::{GenerateOutcome, GenerateParams, HealthStatus, LlmSubstrate, SubstrateError, TaskTier};
pub use tool::{Tool, ToolRegistry, ToolResult};
