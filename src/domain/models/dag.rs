//! SwarmTask DAG.
//!
//! Represents the dependency graph of a decomposition: edges point from
//! prerequisite to dependent. Cycle detection is mandatory before a freshly
//! decomposed subtree is handed to the scheduler.

use std::collections::{HashMap, HashSet, VecDeque};

use uuid::Uuid;

use super::task::{Task, TaskStatus};

/// A node in the DAG representing a task.
#[derive(Debug, Clone)]
pub struct DagNode {
    pub task_id: Uuid,
    pub task_name: String,
    pub status: TaskStatus,
    pub dependencies: Vec<Uuid>,
    pub dependents: Vec<Uuid>,
}

impl DagNode {
    pub fn from_task(task: &Task) -> Self {
        Self {
            task_id: task.id,
            task_name: task.name.clone(),
            status: task.status,
            dependencies: task.depends_on.clone(),
            dependents: Vec::new(),
        }
    }

    pub fn is_ready(&self, completed: &HashSet<Uuid>) -> bool {
        self.dependencies.iter().all(|dep| completed.contains(dep))
    }
}

/// A DAG over a set of tasks, keyed by task id.
#[derive(Debug, Clone, Default)]
pub struct TaskDag {
    pub nodes: HashMap<Uuid, DagNode>,
    pub roots: Vec<Uuid>,
    pub leaves: Vec<Uuid>,
}

impl TaskDag {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut nodes: HashMap<Uuid, DagNode> = HashMap::new();
        let mut has_dependents: HashSet<Uuid> = HashSet::new();

        for task in tasks {
            nodes.insert(task.id, DagNode::from_task(task));
        }

        for task in tasks {
            for dep_id in &task.depends_on {
                if let Some(dep_node) = nodes.get_mut(dep_id) {
                    dep_node.dependents.push(task.id);
                    has_dependents.insert(*dep_id);
                }
            }
        }

        let roots: Vec<Uuid> = nodes
            .iter()
            .filter(|(_, node)| {
                node.dependencies.is_empty()
                    || node.dependencies.iter().all(|d| !nodes.contains_key(d))
            })
            .map(|(id, _)| *id)
            .collect();

        let leaves: Vec<Uuid> = nodes
            .iter()
            .filter(|(id, _)| !has_dependents.contains(*id))
            .map(|(id, _)| *id)
            .collect();

        Self { nodes, roots, leaves }
    }

    pub fn has_cycle(&self) -> bool {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        for &id in self.nodes.keys() {
            if self.detect_cycle_dfs(id, &mut visited, &mut rec_stack) {
                return true;
            }
        }
        false
    }

    fn detect_cycle_dfs(
        &self,
        node_id: Uuid,
        visited: &mut HashSet<Uuid>,
        rec_stack: &mut HashSet<Uuid>,
    ) -> bool {
        if rec_stack.contains(&node_id) {
            return true;
        }
        if visited.contains(&node_id) {
            return false;
        }
        visited.insert(node_id);
        rec_stack.insert(node_id);
        if let Some(node) = self.nodes.get(&node_id) {
            for &dep in &node.dependents {
                if self.detect_cycle_dfs(dep, visited, rec_stack) {
                    return true;
                }
            }
        }
        rec_stack.remove(&node_id);
        false
    }

    pub fn topological_sort(&self) -> Result<Vec<Uuid>, DagError> {
        if self.has_cycle() {
            return Err(DagError::CycleDetected);
        }

        let mut result = Vec::new();
        let mut in_degree: HashMap<Uuid, usize> = HashMap::new();
        let mut queue = VecDeque::new();

        for (id, node) in &self.nodes {
            let deps_in_dag = node
                .dependencies
                .iter()
                .filter(|d| self.nodes.contains_key(d))
                .count();
            in_degree.insert(*id, deps_in_dag);
        }

        for (&id, &degree) in &in_degree {
            if degree == 0 {
                queue.push_back(id);
            }
        }

        while let Some(node_id) = queue.pop_front() {
            result.push(node_id);
            if let Some(node) = self.nodes.get(&node_id) {
                for &dependent in &node.dependents {
                    if let Some(degree) = in_degree.get_mut(&dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(dependent);
                        }
                    }
                }
            }
        }

        if result.len() != self.nodes.len() {
            return Err(DagError::CycleDetected);
        }
        Ok(result)
    }

    /// Group tasks into waves of mutually independent tasks, in dependency
    /// order. Each wave can be dispatched to the scheduler concurrently.
    pub fn execution_waves(&self) -> Result<Vec<Vec<Uuid>>, DagError> {
        if self.has_cycle() {
            return Err(DagError::CycleDetected);
        }

        let mut waves = Vec::new();
        let mut remaining: HashSet<Uuid> = self.nodes.keys().copied().collect();
        let mut completed: HashSet<Uuid> = HashSet::new();

        while !remaining.is_empty() {
            let wave: Vec<Uuid> = remaining
                .iter()
                .filter(|id| {
                    self.nodes
                        .get(id)
                        .map(|n| n.is_ready(&completed))
                        .unwrap_or(false)
                })
                .copied()
                .collect();

            if wave.is_empty() {
                return Err(DagError::CycleDetected);
            }

            for id in &wave {
                remaining.remove(id);
                completed.insert(*id);
            }
            waves.push(wave);
        }

        Ok(waves)
    }

    pub fn critical_path(&self) -> Result<Vec<Uuid>, DagError> {
        let sorted = self.topological_sort()?;
        let mut distances: HashMap<Uuid, usize> = HashMap::new();
        let mut predecessors: HashMap<Uuid, Option<Uuid>> = HashMap::new();

        for &id in &sorted {
            distances.insert(id, 0);
            predecessors.insert(id, None);
        }

        for &node_id in &sorted {
            if let Some(node) = self.nodes.get(&node_id) {
                let current_dist = *distances.get(&node_id).unwrap_or(&0);
                for &dependent in &node.dependents {
                    let new_dist = current_dist + 1;
                    if new_dist > *distances.get(&dependent).unwrap_or(&0) {
                        distances.insert(dependent, new_dist);
                        predecessors.insert(dependent, Some(node_id));
                    }
                }
            }
        }

        let end_node = distances.iter().max_by_key(|&(_, &d)| d).map(|(&id, _)| id);
        if let Some(mut current) = end_node {
            let mut path = vec![current];
            while let Some(&Some(pred)) = predecessors.get(&current) {
                path.push(pred);
                current = pred;
            }
            path.reverse();
            Ok(path)
        } else {
            Ok(vec![])
        }
    }

    pub fn stats(&self) -> DagStats {
        let waves = self.execution_waves().unwrap_or_default();
        let critical = self.critical_path().unwrap_or_default();
        DagStats {
            total_nodes: self.nodes.len(),
            root_count: self.roots.len(),
            leaf_count: self.leaves.len(),
            wave_count: waves.len(),
            max_parallelism: waves.iter().map(|w| w.len()).max().unwrap_or(0),
            critical_path_length: critical.len(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DagStats {
    pub total_nodes: usize,
    pub root_count: usize,
    pub leaf_count: usize,
    pub wave_count: usize,
    pub max_parallelism: usize,
    pub critical_path_length: usize,
}

/// DAG validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DagError {
    #[error("cycle detected in task dependencies")]
    CycleDetected,
    #[error("missing dependency: {0}")]
    MissingDependency(Uuid),
}
