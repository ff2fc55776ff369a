// src/engine/mod.rs

//! Orchestration engine for mlorch.
//!
//! The [`pipeline`] control loop repeatedly:
//! 1. submits every ready task,
//! 2. polls every in-flight task,
//! 3. reports tasks blocked by an upstream failure,
//! 4. stops once nothing can make progress (or a budget runs out),
//!
//! and sleeps for the poll interval between iterations.
//!
//! Progress is published as [`PipelineEvent`]s to a [`PipelineObserver`];
//! the final state of every task is returned as a [`PipelineReport`].

use std::time::Duration;

use crate::client::RemoteHandle;
use crate::task::TaskId;
use crate::types::{TaskKind, TaskStatus};

pub mod observer;
pub mod pipeline;
pub mod report;

pub use observer::{PipelineObserver, TracingObserver};
pub use pipeline::Pipeline;
pub use report::{PipelineOutcome, PipelineReport, TaskReport};

/// Loop tuning knobs, usually taken from the `[config]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Sleep between iterations.
    pub poll_interval: Duration,
    /// Upper bound on any single remote call.
    pub request_timeout: Duration,
    /// Overall wall-clock budget.
    pub timeout: Option<Duration>,
    /// Overall iteration budget.
    pub max_iterations: Option<u64>,
    /// Consecutive failed polls after which a task is marked failed.
    pub max_poll_failures: u32,
    /// Stop submitting new work as soon as any task fails.
    pub fail_fast: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
            request_timeout: Duration::from_secs(60),
            timeout: None,
            max_iterations: None,
            max_poll_failures: 3,
            fail_fast: false,
        }
    }
}

/// One row of the per-iteration status table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub blocked: bool,
}

/// Progress events emitted by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// The loop is about to start; tasks listed in declaration order.
    Started { tasks: Vec<TaskId> },
    /// A submit call succeeded.
    Submitted { task: TaskId, handle: RemoteHandle },
    /// A submit call failed; the task is now `Failed`.
    SubmissionFailed { task: TaskId, error: String },
    /// A task's status moved forward.
    StatusChanged {
        task: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },
    /// A status poll errored; the task keeps its status unless `exhausted`.
    PollFailed {
        task: TaskId,
        attempt: u32,
        error: String,
        exhausted: bool,
    },
    /// Tasks that became blocked during this iteration.
    Blocked { tasks: Vec<TaskId> },
    /// Status of every task at the end of an iteration.
    Snapshot {
        iteration: u64,
        tasks: Vec<TaskSnapshot>,
    },
    /// The loop has stopped.
    Finished {
        outcome: PipelineOutcome,
        iterations: u64,
    },
}
