// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::errors::GraphError;
use crate::task::{Task, TaskId, TaskSpec};
use crate::types::TaskStatus;

/// Dependency graph that owns every task of a pipeline run.
///
/// Tasks live in an arena in declaration order; edges refer to arena
/// indices. All queries that return task ids return them in declaration
/// order, which makes submission order reproducible.
///
/// The shape of the graph is fixed at [`TaskGraph::build`]; afterwards only
/// the lifecycle fields of the owned tasks change.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    tasks: Vec<Task>,
    index: HashMap<TaskId, usize>,
    /// `deps[i]`: arena indices task `i` waits on.
    deps: Vec<Vec<usize>>,
    /// `dependents[i]`: arena indices waiting on task `i`.
    dependents: Vec<Vec<usize>>,
    /// A topological order of arena indices (dependencies first).
    topo: Vec<usize>,
}

impl TaskGraph {
    /// Validate and index a declaration set.
    ///
    /// Fails on duplicate ids, dependencies on undeclared ids, and cycles
    /// (a task depending on itself is a cycle of one).
    pub fn build(specs: Vec<TaskSpec>) -> Result<Self, GraphError> {
        let mut index = HashMap::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            if index.insert(spec.id.clone(), i).is_some() {
                return Err(GraphError::DuplicateTask(spec.id.clone()));
            }
        }

        let mut deps: Vec<Vec<usize>> = vec![Vec::new(); specs.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); specs.len()];

        for (i, spec) in specs.iter().enumerate() {
            for dep in &spec.depends {
                let d = *index
                    .get(dep)
                    .ok_or_else(|| GraphError::UnknownDependency {
                        task: spec.id.clone(),
                        dependency: dep.clone(),
                    })?;
                if !deps[i].contains(&d) {
                    deps[i].push(d);
                    dependents[d].push(i);
                }
            }
        }

        // Edge direction: dependency -> dependent.
        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
        for i in 0..specs.len() {
            graph.add_node(i);
        }
        for (i, ds) in deps.iter().enumerate() {
            for &d in ds {
                graph.add_edge(d, i, ());
            }
        }

        let topo = match toposort(&graph, None) {
            Ok(order) => order,
            Err(_) => {
                return Err(GraphError::Cycle {
                    participants: cycle_participants(&graph, &specs),
                });
            }
        };

        let tasks: Vec<Task> = specs.into_iter().map(Task::new).collect();
        debug!(tasks = tasks.len(), "task graph built");

        Ok(Self {
            tasks,
            index,
            deps,
            dependents,
            topo,
        })
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// All tasks in declaration order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    /// Mutable access for driving a task's lifecycle.
    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        let i = *self.index.get(id)?;
        Some(&mut self.tasks[i])
    }

    pub(crate) fn tasks_mut(&mut self) -> std::slice::IterMut<'_, Task> {
        self.tasks.iter_mut()
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        self.neighbours(id, &self.deps)
    }

    /// Tasks that list this one as a dependency.
    pub fn dependents_of(&self, id: &str) -> Vec<&str> {
        self.neighbours(id, &self.dependents)
    }

    fn neighbours<'a>(&'a self, id: &str, edges: &'a [Vec<usize>]) -> Vec<&'a str> {
        match self.index.get(id) {
            Some(&i) => edges[i].iter().map(|&j| self.tasks[j].id()).collect(),
            None => Vec::new(),
        }
    }

    /// Task ids with dependencies before dependents.
    pub fn topological_order(&self) -> impl Iterator<Item = &str> {
        self.topo.iter().map(|&i| self.tasks[i].id())
    }

    /// Tasks that may be submitted now: `Unsubmitted` with every dependency
    /// `Succeeded`.
    pub fn ready_tasks(&self) -> Vec<TaskId> {
        self.tasks
            .iter()
            .enumerate()
            .filter(|(i, task)| {
                task.status() == TaskStatus::Unsubmitted
                    && self.deps[*i]
                        .iter()
                        .all(|&d| self.tasks[d].status() == TaskStatus::Succeeded)
            })
            .map(|(_, task)| task.id().to_string())
            .collect()
    }

    /// Tasks that can never become ready because something upstream failed.
    ///
    /// This is transitive: if A failed, B waits on A and C waits on B, both
    /// B and C are blocked.
    pub fn blocked_tasks(&self) -> Vec<TaskId> {
        self.tasks_with_blocked()
            .filter(|(_, blocked)| *blocked)
            .map(|(task, _)| task.id().to_string())
            .collect()
    }

    /// Every task in declaration order, paired with its blocked flag.
    ///
    /// The blocked set is computed once for the whole walk.
    pub fn tasks_with_blocked(&self) -> impl Iterator<Item = (&Task, bool)> {
        self.tasks.iter().zip(self.blocked_mask())
    }

    fn blocked_mask(&self) -> Vec<bool> {
        let mut blocked = vec![false; self.tasks.len()];
        for &i in &self.topo {
            if self.tasks[i].status() != TaskStatus::Unsubmitted {
                continue;
            }
            blocked[i] = self.deps[i]
                .iter()
                .any(|&d| self.tasks[d].status() == TaskStatus::Failed || blocked[d]);
        }
        blocked
    }

    /// Tasks currently owned by the remote side (Submitted or InProgress).
    pub fn in_flight(&self) -> Vec<TaskId> {
        self.tasks
            .iter()
            .filter(|t| t.status().is_in_flight())
            .map(|t| t.id().to_string())
            .collect()
    }

    pub fn failed_tasks(&self) -> Vec<TaskId> {
        self.tasks
            .iter()
            .filter(|t| t.status() == TaskStatus::Failed)
            .map(|t| t.id().to_string())
            .collect()
    }

    /// Every task is `Succeeded` or `Failed`.
    pub fn all_terminal(&self) -> bool {
        self.tasks.iter().all(|t| t.is_terminal())
    }

    /// No further progress is possible: every task is terminal or blocked.
    pub fn is_settled(&self) -> bool {
        self.tasks_with_blocked()
            .all(|(task, blocked)| task.is_terminal() || blocked)
    }
}

/// Ids of every task sitting on a cycle, in declaration order.
fn cycle_participants(graph: &DiGraphMap<usize, ()>, specs: &[TaskSpec]) -> Vec<String> {
    let mut on_cycle: Vec<usize> = tarjan_scc(graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .flatten()
        .collect();
    on_cycle.sort_unstable();
    on_cycle.into_iter().map(|i| specs[i].id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{AppParams, TaskParams};

    fn spec(id: &str, depends: &[&str]) -> TaskSpec {
        TaskSpec {
            id: id.to_string(),
            depends: depends.iter().map(|d| d.to_string()).collect(),
            params: TaskParams::App(AppParams {
                name: id.to_string(),
                tier: None,
            }),
        }
    }

    #[test]
    fn roots_are_initially_ready_in_declaration_order() {
        let graph = TaskGraph::build(vec![
            spec("job_2", &[]),
            spec("model_1", &["job_3"]),
            spec("job_3", &[]),
            spec("job_1", &[]),
        ])
        .unwrap();

        assert_eq!(graph.ready_tasks(), vec!["job_2", "job_3", "job_1"]);
        assert!(graph.blocked_tasks().is_empty());
        assert!(!graph.all_terminal());
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let err = TaskGraph::build(vec![spec("a", &["ghost"])]).unwrap_err();
        assert_eq!(
            err,
            GraphError::UnknownDependency {
                task: "a".to_string(),
                dependency: "ghost".to_string()
            }
        );
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let err = TaskGraph::build(vec![spec("a", &[]), spec("b", &["b"])]).unwrap_err();
        assert_eq!(
            err,
            GraphError::Cycle {
                participants: vec!["b".to_string()]
            }
        );
    }

    #[test]
    fn cycle_reports_all_participants() {
        let err = TaskGraph::build(vec![
            spec("root", &[]),
            spec("x", &["root", "z"]),
            spec("y", &["x"]),
            spec("z", &["y"]),
        ])
        .unwrap_err();

        match err {
            GraphError::Cycle { participants } => assert_eq!(participants, ["x", "y", "z"]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        assert_eq!(
            TaskGraph::build(vec![spec("a", &[]), spec("a", &[])]).unwrap_err(),
            GraphError::DuplicateTask("a".to_string())
        );
    }

    #[test]
    fn empty_set_is_already_settled() {
        let graph = TaskGraph::build(vec![]).unwrap();

        assert!(graph.is_empty());
        assert!(graph.ready_tasks().is_empty());
        assert!(graph.all_terminal());
        assert!(graph.is_settled());
        assert_eq!(graph.topological_order().count(), 0);
    }

    #[test]
    fn topological_order_puts_dependencies_first() {
        let graph = TaskGraph::build(vec![
            spec("d", &["b", "c"]),
            spec("b", &["a"]),
            spec("c", &["a"]),
            spec("a", &[]),
        ])
        .unwrap();

        let order: Vec<&str> = graph.topological_order().collect();
        let pos = |id: &str| order.iter().position(|t| *t == id).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("d"));
        assert!(pos("c") < pos("d"));
        assert_eq!(graph.dependents_of("a"), vec!["b", "c"]);
        assert_eq!(graph.dependencies_of("d"), vec!["b", "c"]);
    }
}
