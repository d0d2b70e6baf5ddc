//! Configuration surface, loaded hierarchically by
//! [`crate::infrastructure::config_loader`].

use serde::{Deserialize, Serialize};

fn default_max_agents() -> usize {
    10
}
fn default_min_idle_agents() -> usize {
    1
}
fn default_max_cpu_percent() -> f64 {
    85.0
}
fn default_max_memory_mb() -> u64 {
    8192
}
fn default_coordination_interval_secs() -> u64 {
    5
}
fn default_monitoring_interval_secs() -> u64 {
    1
}
fn default_checkpoint_interval_secs() -> u64 {
    60
}
fn default_task_timeout_secs() -> u64 {
    300
}
fn default_queue_bound() -> usize {
    10_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_max_decomposition_depth() -> u32 {
    3
}
fn default_project_root() -> String {
    "./swarm-output".to_string()
}
fn default_workspace_root() -> String {
    "./swarm-workspaces".to_string()
}

/// Timeout, in seconds, per [`crate::domain::ports::llm_substrate::TaskTier`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmTierTimeouts {
    #[serde(default = "default_simple_timeout")]
    pub simple: u64,
    #[serde(default = "default_normal_timeout")]
    pub normal: u64,
    #[serde(default = "default_complex_timeout")]
    pub complex: u64,
    #[serde(default = "default_reasoning_timeout")]
    pub reasoning: u64,
    #[serde(default = "default_fallback_timeout")]
    pub default: u64,
}

fn default_simple_timeout() -> u64 {
    60
}
fn default_normal_timeout() -> u64 {
    120
}
fn default_complex_timeout() -> u64 {
    300
}
fn default_reasoning_timeout() -> u64 {
    600
}
fn default_fallback_timeout() -> u64 {
    180
}

impl Default for LlmTierTimeouts {
    fn default() -> Self {
        Self {
            simple: default_simple_timeout(),
            normal: default_normal_timeout(),
            complex: default_complex_timeout(),
            reasoning: default_reasoning_timeout(),
            default: default_fallback_timeout(),
        }
    }
}

/// Feature flags gating optional coordinator subsystems.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureFlags {
    #[serde(default = "default_true")]
    pub enable_task_decomposition: bool,
    #[serde(default = "default_true")]
    pub enable_validation: bool,
    #[serde(default = "default_true")]
    pub enable_load_balancing: bool,
    #[serde(default = "default_true")]
    pub enable_auto_scaling: bool,
    #[serde(default = "default_true")]
    pub enable_fault_recovery: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_task_decomposition: true,
            enable_validation: true,
            enable_load_balancing: true,
            enable_auto_scaling: true,
            enable_fault_recovery: true,
        }
    }
}

/// Retry policy for LLM adapter calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_retry_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_retry_max_attempts() -> u32 {
    5
}
fn default_retry_base_backoff_ms() -> u64 {
    2_000
}
fn default_retry_max_backoff_ms() -> u64 {
    60_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_max_attempts(),
            base_backoff_ms: default_retry_base_backoff_ms(),
            max_backoff_ms: default_retry_max_backoff_ms(),
        }
    }
}

/// Structured logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Top-level configuration surface for the swarm (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SwarmSettings {
    #[serde(default = "default_max_agents")]
    pub max_agents: usize,
    #[serde(default = "default_min_idle_agents")]
    pub min_idle_agents: usize,
    #[serde(default = "default_max_cpu_percent")]
    pub max_cpu_percent: f64,
    #[serde(default = "default_max_memory_mb")]
    pub max_memory_mb: u64,
    #[serde(default = "default_coordination_interval_secs")]
    pub coordination_interval_secs: u64,
    #[serde(default = "default_monitoring_interval_secs")]
    pub monitoring_interval_secs: u64,
    #[serde(default = "default_checkpoint_interval_secs")]
    pub checkpoint_interval_secs: u64,
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
    #[serde(default = "default_queue_bound")]
    pub queue_bound: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_decomposition_depth")]
    pub max_decomposition_depth: u32,
    #[serde(default)]
    pub llm_tier_timeouts: LlmTierTimeouts,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub features: FeatureFlags,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_project_root")]
    pub project_root: String,
    #[serde(default = "default_workspace_root")]
    pub workspace_root: String,
}

impl Default for SwarmSettings {
    fn default() -> Self {
        Self {
            max_agents: default_max_agents(),
            min_idle_agents: default_min_idle_agents(),
            max_cpu_percent: default_max_cpu_percent(),
            max_memory_mb: default_max_memory_mb(),
            coordination_interval_secs: default_coordination_interval_secs(),
            monitoring_interval_secs: default_monitoring_interval_secs(),
            checkpoint_interval_secs: default_checkpoint_interval_secs(),
            task_timeout_secs: default_task_timeout_secs(),
            queue_bound: default_queue_bound(),
            max_retries: default_max_retries(),
            max_decomposition_depth: default_max_decomposition_depth(),
            llm_tier_timeouts: LlmTierTimeouts::default(),
            retry: RetryConfig::default(),
            features: FeatureFlags::default(),
            logging: LoggingConfig::default(),
            project_root: default_project_root(),
            workspace_root: default_workspace_root(),
        }
    }
}

impl SwarmSettings {
    /// Validate ranges that serde's type system cannot enforce on its own.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_agents == 0 {
            return Err("max_agents must be greater than zero".to_string());
        }
        if !(0.0..=100.0).contains(&self.max_cpu_percent) {
            return Err("max_cpu_percent must be within 0..=100".to_string());
        }
        if self.max_retries == 0 {
            return Err("max_retries must be greater than zero".to_string());
        }
        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            other => return Err(format!("invalid logging format: {other}")),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        assert!(SwarmSettings::default().validate().is_ok());
    }

    #[test]
    fn zero_max_agents_is_rejected() {
        let mut cfg = SwarmSettings::default();
        cfg.max_agents = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn reasoning_tier_defaults_to_600_seconds() {
        assert_eq!(LlmTierTimeouts::default().reasoning, 600);
    }
}
