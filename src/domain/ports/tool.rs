//! Tool invocation contract and registry (§4.2, §6).
//!
//! The core never depends on a tool's internals — only this uniform
//! `execute(params) -> ToolResult` contract. Concrete tool bodies
//! (filesystem, code, http, database, web_search, git) live outside this
//! crate; only the trait, registry, and in-memory test doubles ship here.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// Uniform result shape returned by every tool invocation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub data: HashMap<String, Value>,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(data: HashMap<String, Value>) -> Self {
        Self { success: true, data, error: None }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self { success: false, data: HashMap::new(), error: Some(message.into()) }
    }
}

/// A named, schema-described capability a tool exposes.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Capability keywords this tool answers to (used by `ToolRegistry`
    /// lookups and by the agent-selection keyword-overlap score).
    fn capabilities(&self) -> &[String];

    async fn execute(&self, action: &str, params: HashMap<String, Value>) -> ToolResult;
}

/// Read-mostly capability → tool index, shared across agents.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn get_tools_for_capability(&self, capability: &str) -> Vec<Arc<dyn Tool>> {
        self.tools
            .iter()
            .filter(|t| t.capabilities().iter().any(|c| c == capability))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool {
        name: String,
        caps: Vec<String>,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            &self.name
        }

        fn capabilities(&self) -> &[String] {
            &self.caps
        }

        async fn execute(&self, _action: &str, params: HashMap<String, Value>) -> ToolResult {
            ToolResult::ok(params)
        }
    }

    #[tokio::test]
    async fn registry_resolves_by_capability() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool {
            name: "filesystem".to_string(),
            caps: vec!["write".to_string()],
        }));

        let matches = registry.get_tools_for_capability("write");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name(), "filesystem");
        assert!(registry.get_tools_for_capability("missing").is_empty());
    }
}
