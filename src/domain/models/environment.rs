//! Environment-facing domain types: spatial location, resources,
//! observability levels, constraints, and the event log.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Where a software entity (agent, process) lives, used by the observability
/// filter's distance function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftwareLocation {
    pub host: String,
    pub process_id: u32,
    pub container_id: Option<String>,
    pub namespace_path: String,
    pub coordinates: Option<(f64, f64)>,
}

impl SoftwareLocation {
    pub fn new(host: impl Into<String>, process_id: u32, namespace_path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            process_id,
            container_id: None,
            namespace_path: namespace_path.into(),
            coordinates: None,
        }
    }

    /// Distance heuristic: different host is "far", same host/different
    /// process is "near", otherwise Euclidean on abstract coordinates (or a
    /// constant when neither side has coordinates).
    pub fn distance(&self, other: &SoftwareLocation) -> f64 {
        const DIFFERENT_HOST: f64 = 1_000.0;
        const SAME_HOST_DIFFERENT_PROCESS: f64 = 10.0;
        const SAME_PROCESS_CONSTANT: f64 = 0.0;

        if self.host != other.host {
            return DIFFERENT_HOST;
        }
        if self.process_id != other.process_id {
            return SAME_HOST_DIFFERENT_PROCESS;
        }
        match (self.coordinates, other.coordinates) {
            (Some((x1, y1)), Some((x2, y2))) => ((x1 - x2).powi(2) + (y1 - y2).powi(2)).sqrt(),
            _ => SAME_PROCESS_CONSTANT,
        }
    }
}

/// Per-agent partial-observability level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityLevel {
    None,
    Network,
    Process,
    Namespace,
    Full,
}

/// A typed, named quantity tracked by the resource ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Cpu,
    Memory,
    DiskIo,
    NetworkBandwidth,
    FileHandles,
    Threads,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::DiskIo => "disk_io",
            Self::NetworkBandwidth => "network_bandwidth",
            Self::FileHandles => "file_handles",
            Self::Threads => "threads",
        }
    }
}

/// Per-resource usage snapshot returned by `ResourceLedger::usage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub total: f64,
    pub available: f64,
    pub used: f64,
    pub utilisation_pct: f64,
}

/// A node in the spatial model: an agent or a logical entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialEntity {
    pub id: Uuid,
    pub name: String,
    pub location: SoftwareLocation,
}

/// Kind of a directed spatial connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    Network,
    ParentChild,
    Coordination,
}

/// An append-only environment event, consumed by the observability filter
/// and by dynamics rule dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentEvent {
    pub event_type: String,
    pub source_id: Uuid,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl EnvironmentEvent {
    pub fn new(event_type: impl Into<String>, source_id: Uuid, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            source_id,
            data,
            timestamp: Utc::now(),
        }
    }
}

/// Bounded append-only ring buffer of environment events.
///
/// Mirrors the evict-oldest-on-overflow idiom used for task context hints:
/// the most recent entries are always retained.
#[derive(Debug, Clone)]
pub struct EventLog {
    capacity: usize,
    events: VecDeque<EnvironmentEvent>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    pub fn push(&mut self, event: EnvironmentEvent) {
        self.events.push_back(event);
        while self.events.len() > self.capacity {
            self.events.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnvironmentEvent> {
        self.events.iter()
    }

    pub fn visible_to(&self, predicate: impl Fn(&EnvironmentEvent) -> bool) -> Vec<&EnvironmentEvent> {
        self.events.iter().filter(|e| predicate(e)).collect()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(10_000)
    }
}

/// Constraint category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Security,
    Performance,
    Resource,
    Network,
    Scheduling,
}

/// A violation produced by the constraint engine for a proposed action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintViolation {
    pub kind: ConstraintKind,
    pub message: String,
}

/// A proposed action an agent wants to take, gated by the constraint engine
/// before `Environment::execute_action` dispatches it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedAction {
    pub action_type: ActionType,
    pub params: HashMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Move,
    AllocateResource,
    Communicate,
    SpawnProcess,
}
