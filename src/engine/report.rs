// src/engine/report.rs

//! Final result of a pipeline run.

use std::time::Duration;

use crate::client::RemoteHandle;
use crate::dag::TaskGraph;
use crate::errors::{MlorchError, Result};
use crate::task::TaskId;
use crate::types::{FailureCause, TaskKind, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Every task succeeded.
    Succeeded,
    /// At least one task failed (or was blocked by a failure).
    Failed,
    /// The time or iteration budget ran out.
    TimedOut,
}

/// Last known state of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub id: TaskId,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub remote_handle: Option<RemoteHandle>,
    pub failure: Option<FailureCause>,
    /// Never submitted because an upstream task failed.
    pub blocked: bool,
}

/// Outcome plus every task, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub outcome: PipelineOutcome,
    pub iterations: u64,
    pub elapsed: Duration,
    pub tasks: Vec<TaskReport>,
}

impl PipelineReport {
    pub fn from_graph(
        graph: &TaskGraph,
        outcome: PipelineOutcome,
        iterations: u64,
        elapsed: Duration,
    ) -> Self {
        let tasks = graph
            .tasks_with_blocked()
            .map(|(t, blocked)| TaskReport {
                id: t.id().to_string(),
                kind: t.kind(),
                status: t.status(),
                remote_handle: t.remote_handle().cloned(),
                failure: t.failure().cloned(),
                blocked,
            })
            .collect();

        Self {
            outcome,
            iterations,
            elapsed,
            tasks,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == PipelineOutcome::Succeeded
    }

    /// Process exit code: 0 for full success, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }

    pub fn task(&self, id: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn status_of(&self, id: &str) -> Option<TaskStatus> {
        self.task(id).map(|t| t.status)
    }

    pub fn failed(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Failed)
            .map(|t| t.id.as_str())
            .collect()
    }

    pub fn blocked(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|t| t.blocked)
            .map(|t| t.id.as_str())
            .collect()
    }

    /// Turn a non-successful report into an error.
    pub fn into_result(self) -> Result<Self> {
        match self.outcome {
            PipelineOutcome::Succeeded => Ok(self),
            PipelineOutcome::TimedOut => Err(MlorchError::Timeout {
                elapsed: self.elapsed,
                unfinished: self
                    .tasks
                    .iter()
                    .filter(|t| t.failure == Some(FailureCause::TimedOut))
                    .map(|t| t.id.clone())
                    .collect(),
            }),
            PipelineOutcome::Failed => Err(MlorchError::PipelineFailed {
                failed: self
                    .tasks
                    .iter()
                    .filter(|t| t.status == TaskStatus::Failed || t.blocked)
                    .map(|t| t.id.clone())
                    .collect(),
            }),
        }
    }
}
