//! The environment: a single lock-protected store shared by the swarm's
//! concurrent loops, composed from four sub-modules (§4.3).

pub mod constraints;
pub mod dynamics;
pub mod observability;
pub mod resources;
pub mod spatial;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::error::EnvironmentError;
use crate::domain::models::environment::{
    ActionType, ConnectionKind, EnvironmentEvent, ProposedAction, ResourceKind, ResourceUsage, SoftwareLocation,
    SpatialEntity, VisibilityLevel,
};

use constraints::{ConstraintContext, ConstraintEngine};
use dynamics::DynamicsEngine;
use observability::ObservabilityFilter;
use resources::ResourceLedger;
use spatial::SpatialGraph;

struct EnvironmentState {
    spatial: SpatialGraph,
    resources: ResourceLedger,
    observability: ObservabilityFilter,
    constraints: ConstraintEngine,
    dynamics: DynamicsEngine,
    event_log: crate::domain::models::environment::EventLog,
    allowed_namespaces: Vec<String>,
    available_network_bandwidth_mbps: f64,
}

impl Default for EnvironmentState {
    fn default() -> Self {
        Self {
            spatial: SpatialGraph::new(),
            resources: ResourceLedger::new(),
            observability: ObservabilityFilter::new(),
            constraints: ConstraintEngine::new(),
            dynamics: DynamicsEngine::new(),
            event_log: crate::domain::models::environment::EventLog::default(),
            allowed_namespaces: Vec::new(),
            available_network_bandwidth_mbps: 1_000.0,
        }
    }
}

/// Cloneable handle to the shared environment store.
#[derive(Clone)]
pub struct Environment {
    state: Arc<RwLock<EnvironmentState>>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self { state: Arc::new(RwLock::new(EnvironmentState::default())) }
    }

    pub async fn set_resource_capacity(&self, kind: ResourceKind, total: f64) {
        self.state.write().await.resources.set_capacity(kind, total);
    }

    pub async fn set_visibility(&self, agent_id: Uuid, level: VisibilityLevel) {
        self.state.write().await.observability.set_level(agent_id, level);
    }

    pub async fn add_entity(&self, entity: SpatialEntity) {
        self.state.write().await.spatial.add_entity(entity);
    }

    pub async fn add_connection(&self, from: Uuid, to: Uuid, kind: ConnectionKind) {
        self.state.write().await.spatial.add_connection(from, to, kind);
    }

    pub async fn usage(&self) -> HashMap<ResourceKind, ResourceUsage> {
        self.state.read().await.resources.usage()
    }

    pub async fn push_event(&self, event: EnvironmentEvent) {
        self.state.write().await.event_log.push(event);
    }

    pub async fn events_visible_to(&self, viewer: Uuid, viewer_location: &SoftwareLocation) -> Vec<EnvironmentEvent> {
        let state = self.state.read().await;
        let locations: HashMap<Uuid, SoftwareLocation> =
            state.spatial.entities().map(|e| (e.id, e.location.clone())).collect();
        state
            .event_log
            .iter()
            .filter(|event| {
                let source_loc = locations.get(&event.source_id);
                state.observability.can_see_event(viewer, viewer_location, source_loc, event)
            })
            .cloned()
            .collect()
    }

    pub async fn neighbours_within_radius(&self, id: Uuid, radius: f64) -> Vec<SpatialEntity> {
        self.state.read().await.spatial.neighbours_within_radius(id, radius).into_iter().cloned().collect()
    }

    /// Last-sampled host/simulated metrics, for callers that need to react
    /// to CPU pressure (e.g. the coordinator's auto-scaler) without waiting
    /// on an event.
    pub async fn host_metrics(&self) -> dynamics::HostMetrics {
        self.state.read().await.dynamics.metrics()
    }

    /// Sample host/simulated metrics and evaluate dynamics rules, pushing
    /// any raised events onto the log.
    pub async fn update(&self, seconds_of_day: u32) {
        let events = {
            let mut state = self.state.write().await;
            state.dynamics.update(seconds_of_day)
        };
        let mut state = self.state.write().await;
        for event in events {
            state.event_log.push(event);
        }
    }

    /// Evaluate constraints, then dispatch to the handler for
    /// `action.action_type`. Returns `(success, details)`.
    pub async fn execute_action(&self, agent_id: Uuid, action: ProposedAction) -> (bool, Value) {
        let mut state = self.state.write().await;

        let usage = state.resources.usage();
        let cpu_usage_pct = usage.get(&ResourceKind::Cpu).map(|u| u.utilisation_pct).unwrap_or(0.0);
        let available_memory_mb = usage.get(&ResourceKind::Memory).map(|u| u.available).unwrap_or(0.0);
        let requesting_namespace = state
            .spatial
            .entity(agent_id)
            .map(|e| e.location.namespace_path.clone())
            .unwrap_or_else(|| "/".to_string());

        let ctx = ConstraintContext {
            current_cpu_usage_pct: cpu_usage_pct,
            available_memory_mb,
            available_network_bandwidth_mbps: state.available_network_bandwidth_mbps,
            allowed_namespaces: state.allowed_namespaces.clone(),
            requesting_namespace,
        };

        let violations = state.constraints.evaluate(&action, &ctx);
        if !violations.is_empty() {
            return (
                false,
                serde_json::json!({ "violations": violations.iter().map(|v| serde_json::json!({
                    "kind": v.kind, "message": v.message
                })).collect::<Vec<_>>() }),
            );
        }

        match action.action_type {
            ActionType::Move => {
                let Some(location) = action
                    .params
                    .get("location")
                    .and_then(|v| serde_json::from_value::<SoftwareLocation>(v.clone()).ok())
                else {
                    return (false, serde_json::json!({ "error": "move requires a 'location' param" }));
                };
                let moved = state.spatial.move_entity(agent_id, location);
                (moved, serde_json::json!({ "moved": moved }))
            }
            ActionType::AllocateResource => {
                let wants: HashMap<ResourceKind, f64> = action
                    .params
                    .iter()
                    .filter_map(|(key, value)| resource_kind_for_param(key).zip(value.as_f64()))
                    .collect();
                match state.resources.request(agent_id, &wants) {
                    Ok(()) => (true, serde_json::json!({ "granted": wants })),
                    Err(EnvironmentError::ResourceDenied(violations)) => (
                        false,
                        serde_json::json!({ "violations": violations.iter().map(|v| v.message.clone()).collect::<Vec<_>>() }),
                    ),
                    Err(err) => (false, serde_json::json!({ "error": err.to_string() })),
                }
            }
            ActionType::Communicate => {
                state.event_log.push(EnvironmentEvent::new(
                    "communicate",
                    agent_id,
                    serde_json::json!({ "params": action.params }),
                ));
                (true, serde_json::json!({ "dispatched": true }))
            }
            ActionType::SpawnProcess => {
                state.event_log.push(EnvironmentEvent::new(
                    "spawn_process",
                    agent_id,
                    serde_json::json!({ "params": action.params }),
                ));
                (true, serde_json::json!({ "spawned": true }))
            }
        }
    }

    pub async fn release_resources(&self, agent_id: Uuid, gives: &HashMap<ResourceKind, f64>) {
        self.state.write().await.resources.release(agent_id, gives);
    }

    pub async fn release_all_resources(&self, agent_id: Uuid) {
        self.state.write().await.resources.release_all(agent_id);
    }
}

fn resource_kind_for_param(key: &str) -> Option<ResourceKind> {
    match key {
        "cpu" => Some(ResourceKind::Cpu),
        "memory_mb" => Some(ResourceKind::Memory),
        "disk_io" => Some(ResourceKind::DiskIo),
        "network_bandwidth" => Some(ResourceKind::NetworkBandwidth),
        "file_handles" => Some(ResourceKind::FileHandles),
        "threads" => Some(ResourceKind::Threads),
        _ => None,
    }
}
