//! Dependency-aware scheduling (§4.9 "Scheduler loop"): picks the next
//! batch of tasks whose dependencies are satisfied, in priority order.
//! Cycle detection reuses [`crate::domain::models::dag::TaskDag`]; the
//! DFS-before-Kahn structure mirrors the teacher's dependency resolver.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::domain::error::TaskError;
use crate::domain::models::dag::TaskDag;
use crate::domain::models::task::{Task, TaskStatus};

#[derive(Debug, Default)]
pub struct TaskScheduler;

impl TaskScheduler {
    pub fn new() -> Self {
        Self
    }

    /// Reject a task set with a dependency cycle before any of it is
    /// scheduled, per the "cycle detection before scheduling" design note.
    pub fn check_for_cycles(&self, tasks: &HashMap<Uuid, Task>) -> Result<(), TaskError> {
        let all: Vec<Task> = tasks.values().cloned().collect();
        let dag = TaskDag::from_tasks(&all);
        if dag.has_cycle() {
            let offender = tasks.keys().next().copied().unwrap_or_else(Uuid::nil);
            return Err(TaskError::DependencyCycle(offender));
        }
        Ok(())
    }

    /// Tasks that are `Pending`/`Planning` with every dependency already
    /// `Completed`, sorted by priority (highest first) then creation order.
    pub fn schedulable_tasks<'a>(&self, tasks: &'a HashMap<Uuid, Task>) -> Vec<&'a Task> {
        let completed: HashSet<Uuid> =
            tasks.values().filter(|t| t.status == TaskStatus::Completed).map(|t| t.id).collect();

        let mut ready: Vec<&Task> = tasks
            .values()
            .filter(|t| matches!(t.status, TaskStatus::Pending | TaskStatus::Planning))
            .filter(|t| t.depends_on.iter().all(|dep| completed.contains(dep)))
            .collect();

        ready.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.created_at.cmp(&b.created_at)));
        ready
    }

    /// Group every task into dependency-respecting execution waves, for
    /// the coordinator's load-balancing loop to fan concurrent dispatch
    /// out across.
    pub fn execution_waves(&self, tasks: &HashMap<Uuid, Task>) -> Result<Vec<Vec<Uuid>>, TaskError> {
        self.check_for_cycles(tasks)?;
        let all: Vec<Task> = tasks.values().cloned().collect();
        let dag = TaskDag::from_tasks(&all);
        dag.execution_waves().map_err(|_| TaskError::DependencyCycle(Uuid::nil()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::task::TaskPriority;

    fn task(name: &str, deps: Vec<Uuid>, priority: TaskPriority) -> Task {
        let mut t = Task::new(name, "desc");
        t.depends_on = deps;
        t.priority = priority;
        t
    }

    #[test]
    fn schedulable_tasks_exclude_unmet_dependencies() {
        let scheduler = TaskScheduler::new();
        let root = task("root", vec![], TaskPriority::Medium);
        let dependent = task("dependent", vec![root.id], TaskPriority::Medium);
        let mut tasks = HashMap::new();
        tasks.insert(root.id, root.clone());
        tasks.insert(dependent.id, dependent.clone());

        let schedulable = scheduler.schedulable_tasks(&tasks);
        assert_eq!(schedulable.len(), 1);
        assert_eq!(schedulable[0].id, root.id);
    }

    #[test]
    fn schedulable_tasks_prioritise_critical_first() {
        let scheduler = TaskScheduler::new();
        let low = task("low", vec![], TaskPriority::Low);
        let critical = task("critical", vec![], TaskPriority::Critical);
        let mut tasks = HashMap::new();
        tasks.insert(low.id, low.clone());
        tasks.insert(critical.id, critical.clone());

        let schedulable = scheduler.schedulable_tasks(&tasks);
        assert_eq!(schedulable[0].id, critical.id);
    }

    #[test]
    fn cycle_is_rejected_before_scheduling() {
        let scheduler = TaskScheduler::new();
        let mut a = task("a", vec![], TaskPriority::Medium);
        let mut b = task("b", vec![a.id], TaskPriority::Medium);
        a.depends_on = vec![b.id];
        let mut tasks = HashMap::new();
        tasks.insert(a.id, a.clone());
        tasks.insert(b.id, b.clone());

        assert!(scheduler.check_for_cycles(&tasks).is_err());
    }
}
