//! Concrete [`LlmSubstrate`] implementation backed by an HTTP chat-completion
//! endpoint (§6 "LLM backend contract"), wrapped with the tiered-timeout,
//! retry, and JSON-repair behaviour the domain port promises.

use std::time::Duration;

use std::ops::ControlFlow;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::models::config::LlmTierTimeouts;
use crate::domain::ports::llm_substrate::{
    FallbackEnvelope, GenerateOutcome, GenerateParams, HealthStatus, LlmSubstrate, SubstrateError, TaskTier,
};

use super::json_repair::parse_with_repair;
use super::retry::RetryPolicy;

/// §4.2: streamed calls ignore the per-request timeout in favour of
/// per-chunk inactivity — a chunk must arrive within this long or the call
/// is treated as a timeout.
const DEFAULT_CHUNK_INACTIVITY_SECS: u64 = 30;

/// A chat-completion request body, matching §6's LLM backend contract.
#[derive(Debug, Clone, serde::Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
    stream: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

/// HTTP-backed LLM adapter: one operation, `generate`, with tiered
/// timeouts, JSON extraction/repair, and a deterministic fallback on
/// unrecoverable output.
pub struct HttpLlmAdapter {
    substrate_id: String,
    model: String,
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
    tier_timeouts: LlmTierTimeouts,
    retry_policy: RetryPolicy,
    reasoning_class_models: Vec<String>,
    chunk_inactivity: Duration,
}

impl HttpLlmAdapter {
    pub fn new(substrate_id: impl Into<String>, model: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            substrate_id: substrate_id.into(),
            model: model.into(),
            endpoint: endpoint.into(),
            api_key: None,
            client: reqwest::Client::new(),
            tier_timeouts: LlmTierTimeouts::default(),
            retry_policy: RetryPolicy::default(),
            reasoning_class_models: vec![
                "o1-preview".to_string(),
                "o1-mini".to_string(),
                "phi-4-mini-reasoning".to_string(),
            ],
            chunk_inactivity: Duration::from_secs(DEFAULT_CHUNK_INACTIVITY_SECS),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_tier_timeouts(mut self, timeouts: LlmTierTimeouts) -> Self {
        self.tier_timeouts = timeouts;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_chunk_inactivity(mut self, timeout: Duration) -> Self {
        self.chunk_inactivity = timeout;
        self
    }

    /// Timeout for a single call, honouring the "reasoning-class models
    /// force the 600s tier regardless" override.
    fn timeout_for(&self, tier: TaskTier) -> Duration {
        if self.reasoning_class_models.iter().any(|m| m == &self.model) {
            return Duration::from_secs(self.tier_timeouts.reasoning);
        }
        let secs = match tier {
            TaskTier::Simple => self.tier_timeouts.simple,
            TaskTier::Normal => self.tier_timeouts.normal,
            TaskTier::Complex => self.tier_timeouts.complex,
            TaskTier::Reasoning => self.tier_timeouts.reasoning,
        };
        Duration::from_secs(secs)
    }

    fn build_request(&self, prompt: &str, params: &GenerateParams, stream: bool) -> (reqwest::RequestBuilder, Duration) {
        let mut messages = Vec::new();
        messages.push(ChatMessage {
            role: "system",
            content: params
                .system_prompt
                .clone()
                .unwrap_or_else(|| "You are a helpful AI assistant. Answer concisely.".to_string()),
        });
        messages.push(ChatMessage { role: "user", content: prompt.to_string() });

        let response_format = params
            .json_response
            .then(|| serde_json::json!({ "type": "json_object" }));

        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            response_format,
            stream,
        };

        let timeout = self.timeout_for(params.task_tier);
        let mut request = self.client.post(&self.endpoint).json(&body);
        if !stream {
            request = request.timeout(timeout);
        }
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        (request, timeout)
    }

    fn check_status(status: reqwest::StatusCode) -> Result<(), SubstrateError> {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SubstrateError::RateLimitExceeded("provider rate limit hit".to_string()));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(SubstrateError::AuthError("invalid or missing api key".to_string()));
        }
        if status.is_server_error() {
            return Err(SubstrateError::Unavailable(format!("provider returned {status}")));
        }
        if !status.is_success() {
            return Err(SubstrateError::ExecutionFailed(format!("provider returned {status}")));
        }
        Ok(())
    }

    async fn call_once(&self, prompt: &str, params: &GenerateParams) -> Result<String, SubstrateError> {
        let (request, timeout) = self.build_request(prompt, params, false);

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SubstrateError::Timeout(timeout.as_secs())
            } else {
                SubstrateError::NetworkError(e.to_string())
            }
        })?;

        Self::check_status(response.status())?;

        let completion: Value = response
            .json()
            .await
            .map_err(|e| SubstrateError::ExecutionFailed(e.to_string()))?;

        completion
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SubstrateError::ExecutionFailed("response missing message content".to_string()))
    }

    /// §4.2: accumulate server-sent delta chunks into one string. Each
    /// chunk must arrive within `chunk_inactivity` — the overall call has
    /// no wall-clock timeout, only this per-chunk one.
    async fn call_streaming(&self, prompt: &str, params: &GenerateParams) -> Result<String, SubstrateError> {
        let (request, _) = self.build_request(prompt, params, true);

        let response = request
            .send()
            .await
            .map_err(|e| SubstrateError::NetworkError(e.to_string()))?;
        Self::check_status(response.status())?;

        let mut byte_stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut accumulated = String::new();

        loop {
            let next = match tokio::time::timeout(self.chunk_inactivity, byte_stream.next()).await {
                Ok(next) => next,
                Err(_) => return Err(SubstrateError::Timeout(self.chunk_inactivity.as_secs())),
            };

            let chunk = match next {
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => return Err(SubstrateError::NetworkError(e.to_string())),
                None => return Ok(accumulated),
            };

            buffer.push_str(&String::from_utf8_lossy(&chunk));
            if drain_sse_lines(&mut buffer, &mut accumulated).is_break() {
                return Ok(accumulated);
            }
        }
    }
}

/// Parse complete SSE lines out of `buffer`, appending any `delta.content`
/// found to `accumulated`. Returns `Break` on a `[DONE]` sentinel.
fn drain_sse_lines(buffer: &mut String, accumulated: &mut String) -> ControlFlow<()> {
    while let Some(line_end) = buffer.find('\n') {
        let line = buffer[..line_end].trim().to_string();
        buffer.drain(..=line_end);

        let Some(data) = line.strip_prefix("data:") else { continue };
        let data = data.trim();
        if data.is_empty() {
            continue;
        }
        if data == "[DONE]" {
            return ControlFlow::Break(());
        }
        if let Ok(event) = serde_json::from_str::<Value>(data) {
            if let Some(delta) = event.pointer("/choices/0/delta/content").and_then(Value::as_str) {
                accumulated.push_str(delta);
            }
        }
    }
    ControlFlow::Continue(())
}

#[async_trait]
impl LlmSubstrate for HttpLlmAdapter {
    fn substrate_id(&self) -> &str {
        &self.substrate_id
    }

    async fn generate(
        &self,
        _task_id: Uuid,
        prompt: &str,
        params: &GenerateParams,
    ) -> Result<GenerateOutcome, SubstrateError> {
        let call = || async {
            if params.stream {
                self.call_streaming(prompt, params).await
            } else {
                self.call_once(prompt, params).await
            }
        };
        let raw = match self.retry_policy.execute(call).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::error!(error = %err, "llm substrate call exhausted retries");
                return Ok(GenerateOutcome::Fallback {
                    fallback: FallbackEnvelope::for_prompt(prompt, err.to_string()),
                    raw_text: None,
                });
            }
        };

        if !params.json_response {
            return Ok(GenerateOutcome::Ok { response: Value::String(raw.clone()), raw_text: raw });
        }

        match parse_with_repair(&raw) {
            Ok((value, _was_repaired)) => Ok(GenerateOutcome::Ok { response: value, raw_text: raw }),
            Err(message) => {
                tracing::warn!(error = %message, "llm response failed json extraction and repair");
                Ok(GenerateOutcome::Fallback {
                    fallback: FallbackEnvelope::for_prompt(prompt, message),
                    raw_text: Some(raw),
                })
            }
        }
    }

    async fn health_check(&self) -> Result<HealthStatus, SubstrateError> {
        let params = GenerateParams {
            json_response: true,
            task_tier: TaskTier::Simple,
            max_tokens: Some(10),
            ..GenerateParams::default()
        };
        match self.call_once("Return {\"hello\":\"world\"}", &params).await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) if e.is_transient() => Ok(HealthStatus::Degraded),
            Err(_) => Ok(HealthStatus::Unavailable),
        }
    }

    fn is_reasoning_class(&self) -> bool {
        self.reasoning_class_models.iter().any(|m| m == &self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasoning_class_model_forces_reasoning_tier_timeout() {
        let adapter = HttpLlmAdapter::new("test", "o1-preview", "http://localhost");
        assert_eq!(adapter.timeout_for(TaskTier::Simple), Duration::from_secs(600));
    }

    #[test]
    fn normal_model_uses_declared_tier_timeout() {
        let adapter = HttpLlmAdapter::new("test", "gpt-4o", "http://localhost");
        assert_eq!(adapter.timeout_for(TaskTier::Complex), Duration::from_secs(300));
        assert_eq!(adapter.timeout_for(TaskTier::Reasoning), Duration::from_secs(600));
    }

    #[test]
    fn drain_sse_lines_accumulates_delta_chunks_across_calls() {
        let mut buffer = String::from("data: {\"choices\":[{\"delta\":{\"content\":\"hel\"}}]}\n");
        let mut accumulated = String::new();
        assert!(drain_sse_lines(&mut buffer, &mut accumulated).is_continue());
        assert_eq!(accumulated, "hel");

        buffer.push_str("data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n");
        assert!(drain_sse_lines(&mut buffer, &mut accumulated).is_continue());
        assert_eq!(accumulated, "hello");
    }

    #[test]
    fn drain_sse_lines_stops_on_done_sentinel() {
        let mut buffer = String::from("data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\ndata: [DONE]\n");
        let mut accumulated = String::new();
        assert!(drain_sse_lines(&mut buffer, &mut accumulated).is_break());
        assert_eq!(accumulated, "hi");
    }

    #[test]
    fn drain_sse_lines_ignores_blank_keepalive_lines() {
        let mut buffer = String::from("\ndata: \n");
        let mut accumulated = String::new();
        assert!(drain_sse_lines(&mut buffer, &mut accumulated).is_continue());
        assert!(accumulated.is_empty());
    }
}
