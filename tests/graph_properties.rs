// tests/graph_properties.rs

use std::collections::{BTreeSet, HashSet};

use proptest::prelude::*;

use mlorch::dag::TaskGraph;
use mlorch::engine::{Pipeline, PipelineOptions, PipelineOutcome, PipelineReport};
use mlorch::errors::GraphError;
use mlorch::task::TaskSpec;
use mlorch::types::TaskStatus;
use mlorch_test_utils::{FakeClient, TaskSpecBuilder, test_options};

// Acyclic by construction: task N may only depend on tasks 0..N-1.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..4),
            num_tasks,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, picks)| {
                    let deps: BTreeSet<usize> = if i == 0 {
                        BTreeSet::new()
                    } else {
                        picks.into_iter().map(|p| p % i).collect()
                    };
                    deps.into_iter().collect()
                })
                .collect()
        })
    })
}

fn name(i: usize) -> String {
    format!("task_{i}")
}

fn specs(deps: &[Vec<usize>]) -> Vec<TaskSpec> {
    deps.iter()
        .enumerate()
        .map(|(i, ds)| {
            let dep_names: Vec<String> = ds.iter().map(|&d| name(d)).collect();
            let dep_refs: Vec<&str> = dep_names.iter().map(String::as_str).collect();
            TaskSpecBuilder::run(&name(i), &format!("step.py {i}"))
                .depends_on(&dep_refs)
                .build()
        })
        .collect()
}

fn run_to_completion(deps: &[Vec<usize>], failing: &HashSet<usize>) -> PipelineReport {
    let client = FakeClient::new();
    for (i, _) in deps.iter().enumerate() {
        let verdict = if failing.contains(&i) { "Failed" } else { "Succeeded" };
        client.script(&name(i), ["Running", verdict]);
    }

    let graph = TaskGraph::build(specs(deps)).unwrap();
    let options = PipelineOptions {
        timeout: None,
        max_iterations: Some(4 * deps.len() as u64 + 4),
        ..test_options()
    };

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap();
    rt.block_on(Pipeline::new(graph, client, options).run())
}

proptest! {
    #[test]
    fn initially_ready_tasks_are_exactly_the_roots(deps in dag_strategy(12)) {
        let graph = TaskGraph::build(specs(&deps)).unwrap();

        let expected: Vec<String> = deps
            .iter()
            .enumerate()
            .filter(|(_, ds)| ds.is_empty())
            .map(|(i, _)| name(i))
            .collect();
        prop_assert_eq!(graph.ready_tasks(), expected);
        prop_assert!(graph.blocked_tasks().is_empty());
    }

    #[test]
    fn topological_order_respects_every_edge(deps in dag_strategy(12)) {
        let graph = TaskGraph::build(specs(&deps)).unwrap();
        let order: Vec<&str> = graph.topological_order().collect();
        prop_assert_eq!(order.len(), deps.len());

        let pos = |id: &str| order.iter().position(|t| *t == id).unwrap();
        for (i, ds) in deps.iter().enumerate() {
            for &d in ds {
                prop_assert!(pos(&name(d)) < pos(&name(i)));
            }
        }
    }

    #[test]
    fn closing_a_ring_is_always_a_cycle(deps in dag_strategy(8), ring in 1usize..4) {
        let ring = ring.min(deps.len());
        let mut with_cycle = deps.clone();
        // task_0 -> task_1 -> ... -> task_{ring-1} -> task_0
        for i in 0..ring {
            with_cycle[i].push((i + 1) % ring);
        }

        match TaskGraph::build(specs(&with_cycle)) {
            Err(GraphError::Cycle { participants }) => {
                for i in 0..ring {
                    prop_assert!(participants.contains(&name(i)));
                }
            }
            other => prop_assert!(false, "expected a cycle, got {:?}", other.map(|g| g.len())),
        }
    }

    #[test]
    fn undeclared_dependency_is_rejected(deps in dag_strategy(8), at in any::<usize>()) {
        let mut specs = specs(&deps);
        let victim = at % specs.len();
        specs[victim].depends.push("ghost".to_string());

        let is_unknown = matches!(
            TaskGraph::build(specs),
            Err(GraphError::UnknownDependency { ref dependency, .. }) if dependency == "ghost"
        );
        prop_assert!(is_unknown);
    }

    #[test]
    fn pipeline_terminates_and_accounts_for_every_task(
        deps in dag_strategy(10),
        fail_picks in proptest::collection::vec(any::<usize>(), 0..3),
    ) {
        let failing: HashSet<usize> = fail_picks.into_iter().map(|p| p % deps.len()).collect();
        let report = run_to_completion(&deps, &failing);

        prop_assert_ne!(report.outcome, PipelineOutcome::TimedOut);
        prop_assert_eq!(report.tasks.len(), deps.len());

        for (i, task) in report.tasks.iter().enumerate() {
            prop_assert!(task.status.is_terminal() || task.blocked, "{:?}", task);
            if task.blocked {
                prop_assert_eq!(task.status, TaskStatus::Unsubmitted);
                prop_assert!(task.remote_handle.is_none());
                let has_failed_or_blocked_dep = deps[i].iter().any(|&d| {
                    report.tasks[d].status == TaskStatus::Failed || report.tasks[d].blocked
                });
                prop_assert!(has_failed_or_blocked_dep);
            }
            if task.status == TaskStatus::Failed {
                prop_assert!(failing.contains(&i));
            }
        }

        let any_failed = report.tasks.iter().any(|t| t.status == TaskStatus::Failed);
        prop_assert_eq!(report.outcome == PipelineOutcome::Succeeded, !any_failed);
    }
}
