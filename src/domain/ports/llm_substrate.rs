//! LLM Substrate port.
//!
//! Abstracts over whatever backend actually answers `generate` calls
//! (a hosted chat completion API, a local model server, a test double).
//! The coordinator and cognitive/hybrid agents depend only on this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Selects a timeout tier for an LLM call (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskTier {
    Simple,
    Normal,
    Complex,
    Reasoning,
}

impl TaskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Normal => "normal",
            Self::Complex => "complex",
            Self::Reasoning => "reasoning",
        }
    }
}

/// Parameters controlling one `generate` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateParams {
    pub system_prompt: Option<String>,
    pub json_response: bool,
    pub task_tier: TaskTier,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

impl Default for GenerateParams {
    fn default() -> Self {
        Self {
            system_prompt: None,
            json_response: true,
            task_tier: TaskTier::Normal,
            temperature: 0.7,
            max_tokens: None,
            stream: false,
        }
    }
}

/// A deterministic fallback envelope returned when JSON extraction/repair
/// both fail — the adapter never lets a malformed provider response cross
/// the boundary into the BDI loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackEnvelope {
    pub status: String,
    pub message: String,
    pub prompt_head: String,
}

impl FallbackEnvelope {
    pub fn for_prompt(prompt: &str, message: impl Into<String>) -> Self {
        const HEAD_LEN: usize = 200;
        let prompt_head: String = if prompt.len() > HEAD_LEN {
            format!("{}...", &prompt[..HEAD_LEN])
        } else {
            prompt.to_string()
        };
        Self {
            status: "fallback".to_string(),
            message: message.into(),
            prompt_head,
        }
    }
}

/// Outcome of a `generate` call: a discriminated sum, not nullable fields
/// (per the design notes), so callers can't observe both a response and an
/// error at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GenerateOutcome {
    Ok { response: Value, raw_text: String },
    Fallback { fallback: FallbackEnvelope, raw_text: Option<String> },
}

impl GenerateOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

/// Error types for substrate operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SubstrateError {
    #[error("substrate not configured: {0}")]
    NotConfigured(String),
    #[error("substrate unavailable: {0}")]
    Unavailable(String),
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("execution timeout after {0}s")]
    Timeout(u64),
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("authentication error: {0}")]
    AuthError(String),
}

impl SubstrateError {
    /// Transient errors are eligible for the adapter's retry policy;
    /// timeouts are explicitly classified transient per spec.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::RateLimitExceeded(_) | Self::Timeout(_) | Self::NetworkError(_)
        )
    }

    pub const fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}

/// Health status of a substrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unavailable,
}

/// Port trait implemented by every concrete LLM backend.
#[async_trait]
pub trait LlmSubstrate: Send + Sync {
    fn substrate_id(&self) -> &str;

    /// Generate a response for `prompt`, honouring `params.task_tier`'s
    /// timeout and `params.json_response`'s extraction/repair pipeline.
    /// Never raises to the caller's BDI loop: failures always resolve to a
    /// [`GenerateOutcome::Fallback`].
    async fn generate(
        &self,
        task_id: Uuid,
        prompt: &str,
        params: &GenerateParams,
    ) -> Result<GenerateOutcome, SubstrateError>;

    async fn health_check(&self) -> Result<HealthStatus, SubstrateError>;

    /// Whether this backend's model is "reasoning-class" (e.g. o1-preview),
    /// which forces the 600s tier regardless of the declared task tier.
    fn is_reasoning_class(&self) -> bool {
        false
    }
}
