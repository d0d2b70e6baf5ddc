//! Transactional multi-resource ledger (§4.3, §5, §8).
//!
//! `request` is all-or-nothing across every resource named in the request;
//! `release` is idempotent and clamps at the agent's actual allocation so a
//! double-release can never push `available` above `total`.

use std::collections::HashMap;

use uuid::Uuid;

use crate::domain::error::EnvironmentError;
use crate::domain::models::environment::{ConstraintViolation, ResourceKind, ResourceUsage};

#[derive(Debug, Clone, Copy)]
struct ResourcePool {
    total: f64,
    available: f64,
}

#[derive(Debug, Default)]
pub struct ResourceLedger {
    pools: HashMap<ResourceKind, ResourcePool>,
    allocations: HashMap<(Uuid, ResourceKind), f64>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(kind: ResourceKind, total: f64) -> Self {
        let mut ledger = Self::new();
        ledger.set_capacity(kind, total);
        ledger
    }

    pub fn set_capacity(&mut self, kind: ResourceKind, total: f64) {
        self.pools.insert(kind, ResourcePool { total, available: total });
    }

    /// Atomically grant every `(kind, amount)` pair, or none of them.
    pub fn request(
        &mut self,
        agent_id: Uuid,
        wants: &HashMap<ResourceKind, f64>,
    ) -> Result<(), EnvironmentError> {
        let mut violations = Vec::new();
        for (kind, amount) in wants {
            match self.pools.get(kind) {
                Some(pool) if pool.available >= *amount => {}
                Some(pool) => violations.push(ConstraintViolation {
                    kind: crate::domain::models::environment::ConstraintKind::Resource,
                    message: format!(
                        "{} requested {amount} but only {} available",
                        kind.as_str(),
                        pool.available
                    ),
                }),
                None => {
                    return Err(EnvironmentError::UnknownResource(kind.as_str().to_string()));
                }
            }
        }

        if !violations.is_empty() {
            return Err(EnvironmentError::ResourceDenied(violations));
        }

        for (kind, amount) in wants {
            let pool = self.pools.get_mut(kind).expect("checked above");
            pool.available -= amount;
            *self.allocations.entry((agent_id, *kind)).or_insert(0.0) += amount;
        }
        Ok(())
    }

    /// Release up to `amount` of each resource the agent actually holds.
    /// Calling this twice in a row has the same effect as calling it once.
    pub fn release(&mut self, agent_id: Uuid, gives: &HashMap<ResourceKind, f64>) {
        for (kind, amount) in gives {
            let key = (agent_id, *kind);
            let held = self.allocations.get(&key).copied().unwrap_or(0.0);
            let released = amount.min(held);
            if released <= 0.0 {
                continue;
            }
            if let Some(pool) = self.pools.get_mut(kind) {
                pool.available = (pool.available + released).min(pool.total);
            }
            let remaining = held - released;
            if remaining <= f64::EPSILON {
                self.allocations.remove(&key);
            } else {
                self.allocations.insert(key, remaining);
            }
        }
    }

    /// Release every resource currently held by `agent_id`.
    pub fn release_all(&mut self, agent_id: Uuid) {
        let held: HashMap<ResourceKind, f64> = self
            .allocations
            .iter()
            .filter(|((id, _), _)| *id == agent_id)
            .map(|((_, kind), amount)| (*kind, *amount))
            .collect();
        self.release(agent_id, &held);
    }

    pub fn usage(&self) -> HashMap<ResourceKind, ResourceUsage> {
        self.pools
            .iter()
            .map(|(kind, pool)| {
                let used = pool.total - pool.available;
                let utilisation_pct = if pool.total > 0.0 { (used / pool.total) * 100.0 } else { 0.0 };
                (
                    *kind,
                    ResourceUsage { total: pool.total, available: pool.available, used, utilisation_pct },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wants(pairs: &[(ResourceKind, f64)]) -> HashMap<ResourceKind, f64> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn request_is_all_or_nothing() {
        let mut ledger = ResourceLedger::new();
        ledger.set_capacity(ResourceKind::Cpu, 100.0);
        ledger.set_capacity(ResourceKind::Memory, 1_000.0);

        let agent = Uuid::new_v4();
        let result = ledger.request(agent, &wants(&[(ResourceKind::Cpu, 60.0), (ResourceKind::Memory, 2_000.0)]));
        assert!(result.is_err());

        // Rejected request must leave usage untouched.
        let usage = ledger.usage();
        assert_eq!(usage[&ResourceKind::Cpu].available, 100.0);
        assert_eq!(usage[&ResourceKind::Memory].available, 1_000.0);
    }

    #[test]
    fn successful_request_reduces_available() {
        let mut ledger = ResourceLedger::with_capacity(ResourceKind::Cpu, 100.0);
        let agent = Uuid::new_v4();
        ledger.request(agent, &wants(&[(ResourceKind::Cpu, 40.0)])).unwrap();
        assert_eq!(ledger.usage()[&ResourceKind::Cpu].available, 60.0);
    }

    #[test]
    fn conservation_invariant_holds_after_request_and_release() {
        let mut ledger = ResourceLedger::with_capacity(ResourceKind::Cpu, 100.0);
        let agent = Uuid::new_v4();
        ledger.request(agent, &wants(&[(ResourceKind::Cpu, 30.0)])).unwrap();
        ledger.release(agent, &wants(&[(ResourceKind::Cpu, 30.0)]));
        let usage = ledger.usage();
        assert_eq!(usage[&ResourceKind::Cpu].available, usage[&ResourceKind::Cpu].total);
    }

    #[test]
    fn double_release_is_idempotent_and_clamped() {
        let mut ledger = ResourceLedger::with_capacity(ResourceKind::Cpu, 100.0);
        let agent = Uuid::new_v4();
        ledger.request(agent, &wants(&[(ResourceKind::Cpu, 20.0)])).unwrap();
        ledger.release(agent, &wants(&[(ResourceKind::Cpu, 20.0)]));
        ledger.release(agent, &wants(&[(ResourceKind::Cpu, 20.0)]));
        assert_eq!(ledger.usage()[&ResourceKind::Cpu].available, 100.0);
    }
}
