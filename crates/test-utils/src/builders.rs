#![allow(dead_code)]

use std::time::Duration;

use mlorch::dag::TaskGraph;
use mlorch::engine::PipelineOptions;
use mlorch::task::{AppParams, ModelParams, RunParams, ScheduledJobParams, TaskParams, TaskSpec};

/// Builder for `TaskSpec` to simplify test setup.
///
/// Titles and names default to the task id, which is also the key
/// [`crate::FakeClient`] uses for scripting.
pub struct TaskSpecBuilder {
    spec: TaskSpec,
}

impl TaskSpecBuilder {
    /// An immediate run of `command`.
    pub fn run(id: &str, command: &str) -> Self {
        Self::with_params(
            id,
            TaskParams::Run(RunParams {
                command: command.split_whitespace().map(str::to_string).collect(),
                is_direct: false,
                title: Some(id.to_string()),
                tier: None,
            }),
        )
    }

    pub fn scheduled(id: &str, command: &str, cron: &str) -> Self {
        Self::with_params(
            id,
            TaskParams::ScheduledJob(ScheduledJobParams {
                command: command.to_string(),
                cron_string: cron.to_string(),
                title: id.to_string(),
                tier: None,
                environment_id: None,
                scheduled_by: None,
                timezone: "UTC".to_string(),
            }),
        )
    }

    pub fn model(id: &str) -> Self {
        Self::with_params(
            id,
            TaskParams::Model(ModelParams {
                name: id.to_string(),
                file: "model.py".to_string(),
                function: "predict".to_string(),
                description: None,
                model_id: None,
                environment_id: None,
            }),
        )
    }

    pub fn app(id: &str) -> Self {
        Self::with_params(
            id,
            TaskParams::App(AppParams {
                name: id.to_string(),
                tier: None,
            }),
        )
    }

    fn with_params(id: &str, params: TaskParams) -> Self {
        Self {
            spec: TaskSpec {
                id: id.to_string(),
                depends: Vec::new(),
                params,
            },
        }
    }

    pub fn depends_on(mut self, deps: &[&str]) -> Self {
        self.spec.depends = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn tier(mut self, tier: &str) -> Self {
        match &mut self.spec.params {
            TaskParams::Run(p) => p.tier = Some(tier.to_string()),
            TaskParams::ScheduledJob(p) => p.tier = Some(tier.to_string()),
            TaskParams::App(p) => p.tier = Some(tier.to_string()),
            TaskParams::Model(_) => panic!("models have no hardware tier"),
        }
        self
    }

    pub fn model_id(mut self, model_id: &str) -> Self {
        match &mut self.spec.params {
            TaskParams::Model(p) => p.model_id = Some(model_id.to_string()),
            _ => panic!("model_id only applies to model tasks"),
        }
        self
    }

    pub fn build(self) -> TaskSpec {
        self.spec
    }
}

/// Build a graph, panicking on invalid input.
pub fn graph(specs: Vec<TaskSpec>) -> TaskGraph {
    TaskGraph::build(specs).expect("Failed to build valid task graph from specs")
}

/// Loop options suited to paused-clock tests: 1s polling, tight budgets.
pub fn test_options() -> PipelineOptions {
    PipelineOptions {
        poll_interval: Duration::from_secs(1),
        request_timeout: Duration::from_secs(5),
        timeout: Some(Duration::from_secs(600)),
        max_iterations: None,
        max_poll_failures: 3,
        fail_fast: false,
    }
}
