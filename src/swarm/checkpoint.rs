//! Checkpointing (§4.9 "Checkpointing", §6 "Persistence layout"): a plain
//! JSON snapshot of coordinator state, written to the configured project
//! root on the checkpoint interval. No database — see DESIGN.md's
//! "Dropped teacher dependencies" for why `sqlx` isn't carried forward.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::agent::{Agent, AgentMetrics};
use crate::domain::models::task::Task;

/// A snapshot of everything the coordinator needs to resume after a
/// restart: agent roster (including BDI state), full task registry, and
/// where on disk generated project files live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: Uuid,
    pub swarm_name: String,
    pub agents: Vec<Agent>,
    pub agent_metrics: HashMap<Uuid, AgentMetrics>,
    pub tasks: HashMap<Uuid, Task>,
    pub project_path: PathBuf,
    pub taken_at: chrono::DateTime<chrono::Utc>,
}

impl Checkpoint {
    pub fn new(swarm_name: impl Into<String>, agents: Vec<Agent>, tasks: HashMap<Uuid, Task>, project_path: PathBuf) -> Self {
        let agent_metrics = agents.iter().map(|a| (a.id, a.metrics.clone())).collect();
        Self {
            id: Uuid::new_v4(),
            swarm_name: swarm_name.into(),
            agents,
            agent_metrics,
            tasks,
            project_path,
            taken_at: chrono::Utc::now(),
        }
    }

    /// Where a checkpoint with this id lives under `checkpoint_dir`.
    pub fn path_for(checkpoint_dir: &Path, id: Uuid) -> PathBuf {
        checkpoint_dir.join(format!("{id}.json"))
    }

    pub async fn write(&self, checkpoint_dir: &Path) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(checkpoint_dir).await?;
        let path = Self::path_for(checkpoint_dir, self.id);
        let bytes = serde_json::to_vec_pretty(self).map_err(std::io::Error::other)?;
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    pub async fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        serde_json::from_slice(&bytes).map_err(std::io::Error::other)
    }

    /// Most recent checkpoint file in `checkpoint_dir`, by `taken_at`.
    pub async fn latest(checkpoint_dir: &Path) -> std::io::Result<Option<Self>> {
        if !checkpoint_dir.exists() {
            return Ok(None);
        }
        let mut entries = tokio::fs::read_dir(checkpoint_dir).await?;
        let mut latest: Option<Self> = None;
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Ok(candidate) = Self::read(&entry.path()).await {
                if latest.as_ref().map(|l| candidate.taken_at > l.taken_at).unwrap_or(true) {
                    latest = Some(candidate);
                }
            }
        }
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::agent::AgentMode;

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let agents = vec![Agent::new("a", "coder", AgentMode::Reactive)];
        let mut tasks = HashMap::new();
        let task = Task::new("t", "d");
        tasks.insert(task.id, task);

        let checkpoint = Checkpoint::new("demo-swarm", agents, tasks, dir.path().join("project"));
        let path = checkpoint.write(dir.path()).await.unwrap();
        let loaded = Checkpoint::read(&path).await.unwrap();

        assert_eq!(loaded.id, checkpoint.id);
        assert_eq!(loaded.swarm_name, "demo-swarm");
        assert_eq!(loaded.tasks.len(), 1);
    }

    #[tokio::test]
    async fn latest_picks_the_newest_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let first = Checkpoint::new("s", vec![], HashMap::new(), PathBuf::from("p"));
        first.write(dir.path()).await.unwrap();

        let mut second = Checkpoint::new("s", vec![], HashMap::new(), PathBuf::from("p"));
        second.taken_at = first.taken_at + chrono::Duration::seconds(5);
        second.write(dir.path()).await.unwrap();

        let latest = Checkpoint::latest(dir.path()).await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
    }

    #[tokio::test]
    async fn latest_is_none_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        assert!(Checkpoint::latest(&missing).await.unwrap().is_none());
    }
}
