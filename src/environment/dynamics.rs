//! Environment dynamics: host metric sampling plus condition/effect rules
//! dispatched into the event log on every `update(dt)` (§4.3).
//!
//! Host sampling is grounded on the teacher's resource monitor, trimmed to a
//! synchronous snapshot call — the coordinator drives the sampling cadence
//! itself rather than this module owning a background task.

use sysinfo::System;
use uuid::Uuid;

use crate::domain::models::environment::EnvironmentEvent;

/// Host + simulated metrics sampled on each `update`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostMetrics {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub network_congestion: f64,
}

/// A configured window (in seconds-of-day, [start, end)) during which
/// simulated network congestion ramps up, for deterministic load testing
/// without needing a real network.
pub struct HighTrafficWindow {
    pub start_secs_of_day: u32,
    pub end_secs_of_day: u32,
    pub peak_congestion: f64,
}

pub struct DynamicsEngine {
    system: System,
    high_traffic_window: Option<HighTrafficWindow>,
    rules: Vec<DynamicsRule>,
    metrics: HostMetrics,
}

pub struct DynamicsRule {
    pub name: String,
    pub condition: Box<dyn Fn(&HostMetrics) -> bool + Send + Sync>,
    pub effect: Box<dyn Fn(&HostMetrics) -> EnvironmentEvent + Send + Sync>,
}

impl Default for DynamicsEngine {
    fn default() -> Self {
        Self { system: System::new_all(), high_traffic_window: None, rules: Vec::new(), metrics: HostMetrics::default() }
    }
}

impl DynamicsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_high_traffic_window(mut self, window: HighTrafficWindow) -> Self {
        self.high_traffic_window = Some(window);
        self
    }

    pub fn push_rule(&mut self, rule: DynamicsRule) {
        self.rules.push(rule);
    }

    pub fn metrics(&self) -> HostMetrics {
        self.metrics
    }

    /// Sample host metrics, apply simulated congestion for the configured
    /// window, evaluate rules whose condition fires, and return the events
    /// those rules raised (the caller pushes them onto the shared log).
    pub fn update(&mut self, seconds_of_day: u32) -> Vec<EnvironmentEvent> {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        let cpu_percent = self.system.global_cpu_usage() as f64;
        let memory_percent = if self.system.total_memory() > 0 {
            (self.system.used_memory() as f64 / self.system.total_memory() as f64) * 100.0
        } else {
            0.0
        };

        let network_congestion = match &self.high_traffic_window {
            Some(window) if seconds_of_day >= window.start_secs_of_day && seconds_of_day < window.end_secs_of_day => {
                window.peak_congestion
            }
            _ => 0.0,
        };

        self.metrics = HostMetrics { cpu_percent, memory_percent, network_congestion };

        self.rules
            .iter()
            .filter(|rule| (rule.condition)(&self.metrics))
            .map(|rule| (rule.effect)(&self.metrics))
            .collect()
    }
}

pub fn cpu_pressure_rule(threshold_pct: f64) -> DynamicsRule {
    DynamicsRule {
        name: "cpu_pressure".to_string(),
        condition: Box::new(move |m| m.cpu_percent > threshold_pct),
        effect: Box::new(move |m| {
            EnvironmentEvent::new(
                "cpu_pressure",
                Uuid::nil(),
                serde_json::json!({ "cpu_percent": m.cpu_percent, "threshold": threshold_pct }),
            )
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_traffic_window_raises_congestion_inside_window_only() {
        let mut engine = DynamicsEngine::new().with_high_traffic_window(HighTrafficWindow {
            start_secs_of_day: 1_000,
            end_secs_of_day: 2_000,
            peak_congestion: 0.9,
        });

        engine.update(1_500);
        assert_eq!(engine.metrics().network_congestion, 0.9);

        engine.update(500);
        assert_eq!(engine.metrics().network_congestion, 0.0);
    }

    #[test]
    fn rule_fires_and_produces_event_when_condition_matches() {
        let mut engine = DynamicsEngine::new();
        engine.push_rule(cpu_pressure_rule(-1.0)); // always fires
        let events = engine.update(0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "cpu_pressure");
    }
}
