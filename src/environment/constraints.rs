//! Constraint engine: evaluates a proposed action against an ordered list
//! of constraints, returning every violation rather than short-circuiting
//! on the first (§4.3).

use crate::domain::models::environment::{ActionType, ConstraintKind, ConstraintViolation, ProposedAction};

/// Snapshot of the state a constraint needs to judge an action; kept
/// separate from the full `Environment` so constraints stay pure functions.
pub struct ConstraintContext {
    pub current_cpu_usage_pct: f64,
    pub available_memory_mb: f64,
    pub available_network_bandwidth_mbps: f64,
    pub allowed_namespaces: Vec<String>,
    pub requesting_namespace: String,
}

pub trait Constraint: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(&self, action: &ProposedAction, ctx: &ConstraintContext) -> Option<ConstraintViolation>;
}

/// action's cpu demand + current usage <= 90%.
pub struct CpuHeadroomConstraint {
    pub max_pct: f64,
}

impl Default for CpuHeadroomConstraint {
    fn default() -> Self {
        Self { max_pct: 90.0 }
    }
}

impl Constraint for CpuHeadroomConstraint {
    fn name(&self) -> &'static str {
        "cpu_headroom"
    }

    fn evaluate(&self, action: &ProposedAction, ctx: &ConstraintContext) -> Option<ConstraintViolation> {
        if action.action_type != ActionType::AllocateResource {
            return None;
        }
        let demand = action.params.get("cpu").and_then(|v| v.as_f64()).unwrap_or(0.0);
        if ctx.current_cpu_usage_pct + demand > self.max_pct {
            return Some(ConstraintViolation {
                kind: ConstraintKind::Resource,
                message: format!(
                    "cpu headroom exceeded: {:.1}% current + {:.1}% demand > {:.1}% max",
                    ctx.current_cpu_usage_pct, demand, self.max_pct
                ),
            });
        }
        None
    }
}

/// memory required <= memory available.
pub struct MemoryHeadroomConstraint;

impl Constraint for MemoryHeadroomConstraint {
    fn name(&self) -> &'static str {
        "memory_headroom"
    }

    fn evaluate(&self, action: &ProposedAction, ctx: &ConstraintContext) -> Option<ConstraintViolation> {
        if action.action_type != ActionType::AllocateResource {
            return None;
        }
        let demand = action.params.get("memory_mb").and_then(|v| v.as_f64()).unwrap_or(0.0);
        if demand > ctx.available_memory_mb {
            return Some(ConstraintViolation {
                kind: ConstraintKind::Resource,
                message: format!(
                    "memory requested {demand}MB exceeds available {}MB",
                    ctx.available_memory_mb
                ),
            });
        }
        None
    }
}

pub struct NetworkBandwidthConstraint;

impl Constraint for NetworkBandwidthConstraint {
    fn name(&self) -> &'static str {
        "network_bandwidth"
    }

    fn evaluate(&self, action: &ProposedAction, ctx: &ConstraintContext) -> Option<ConstraintViolation> {
        if action.action_type != ActionType::Communicate {
            return None;
        }
        let demand = action.params.get("bandwidth_mbps").and_then(|v| v.as_f64()).unwrap_or(0.0);
        if demand > ctx.available_network_bandwidth_mbps {
            return Some(ConstraintViolation {
                kind: ConstraintKind::Network,
                message: format!(
                    "bandwidth requested {demand}Mbps exceeds available {}Mbps",
                    ctx.available_network_bandwidth_mbps
                ),
            });
        }
        None
    }
}

pub struct NamespaceAccessConstraint;

impl Constraint for NamespaceAccessConstraint {
    fn name(&self) -> &'static str {
        "namespace_access"
    }

    fn evaluate(&self, _action: &ProposedAction, ctx: &ConstraintContext) -> Option<ConstraintViolation> {
        if ctx.allowed_namespaces.is_empty() {
            return None;
        }
        if !ctx.allowed_namespaces.iter().any(|ns| ns == &ctx.requesting_namespace) {
            return Some(ConstraintViolation {
                kind: ConstraintKind::Security,
                message: format!("namespace '{}' is not in the allowed set", ctx.requesting_namespace),
            });
        }
        None
    }
}

pub struct ConstraintEngine {
    constraints: Vec<Box<dyn Constraint>>,
}

impl Default for ConstraintEngine {
    fn default() -> Self {
        Self {
            constraints: vec![
                Box::new(CpuHeadroomConstraint::default()),
                Box::new(MemoryHeadroomConstraint),
                Box::new(NetworkBandwidthConstraint),
                Box::new(NamespaceAccessConstraint),
            ],
        }
    }
}

impl ConstraintEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, constraint: Box<dyn Constraint>) {
        self.constraints.push(constraint);
    }

    /// Evaluate every constraint in order, collecting every violation.
    pub fn evaluate(&self, action: &ProposedAction, ctx: &ConstraintContext) -> Vec<ConstraintViolation> {
        self.constraints.iter().filter_map(|c| c.evaluate(action, ctx)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn ctx() -> ConstraintContext {
        ConstraintContext {
            current_cpu_usage_pct: 50.0,
            available_memory_mb: 1_024.0,
            available_network_bandwidth_mbps: 100.0,
            allowed_namespaces: vec![],
            requesting_namespace: "/".to_string(),
        }
    }

    #[test]
    fn cpu_headroom_violation_returns_full_list_not_just_first() {
        let engine = ConstraintEngine::new();
        let mut params = HashMap::new();
        params.insert("cpu".to_string(), serde_json::json!(60.0));
        params.insert("memory_mb".to_string(), serde_json::json!(2_000.0));
        let action = ProposedAction { action_type: ActionType::AllocateResource, params };

        let violations = engine.evaluate(&action, &ctx());
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().any(|v| v.message.contains("cpu headroom")));
        assert!(violations.iter().any(|v| v.message.contains("memory requested")));
    }

    #[test]
    fn within_limits_action_produces_no_violations() {
        let engine = ConstraintEngine::new();
        let mut params = HashMap::new();
        params.insert("cpu".to_string(), serde_json::json!(10.0));
        let action = ProposedAction { action_type: ActionType::AllocateResource, params };
        assert!(engine.evaluate(&action, &ctx()).is_empty());
    }
}
