// src/task/mod.rs

//! Tasks: units of remote work and their lifecycle.
//!
//! A [`Task`] is a tagged variant over the four kinds of work (see
//! [`TaskParams`]) plus the mutable lifecycle fields the pipeline updates:
//! status, remote handle and failure cause.
//!
//! Kind-specific request building and status mapping live in:
//! - [`run`] for immediate and cron-scheduled jobs,
//! - [`model`] for model endpoint builds,
//! - [`app`] for hosted web apps.

pub mod app;
pub mod model;
pub mod run;

use tracing::{debug, info, warn};

use crate::client::{PlatformClient, RemoteHandle};
use crate::errors::{PollError, SubmissionError};
use crate::types::{FailureCause, TaskKind, TaskStatus};

pub use app::AppParams;
pub use model::ModelParams;
pub use run::{RunParams, ScheduledJobParams};

/// Canonical task id type.
pub type TaskId = String;

/// Kind-specific, immutable submission parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskParams {
    Run(RunParams),
    ScheduledJob(ScheduledJobParams),
    Model(ModelParams),
    App(AppParams),
}

impl TaskParams {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskParams::Run(_) => TaskKind::Run,
            TaskParams::ScheduledJob(_) => TaskKind::ScheduledJob,
            TaskParams::Model(_) => TaskKind::Model,
            TaskParams::App(_) => TaskKind::App,
        }
    }
}

/// A fully materialised task declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub id: TaskId,
    /// Ids of tasks that must succeed first, in declaration order.
    pub depends: Vec<TaskId>,
    pub params: TaskParams,
}

#[derive(Debug, Clone)]
pub struct Task {
    id: TaskId,
    depends: Vec<TaskId>,
    params: TaskParams,
    status: TaskStatus,
    handle: Option<RemoteHandle>,
    failure: Option<FailureCause>,
    /// Consecutive status polls that errored; reset by a successful poll.
    poll_failures: u32,
}

impl Task {
    pub fn new(spec: TaskSpec) -> Self {
        Self {
            id: spec.id,
            depends: spec.depends,
            params: spec.params,
            status: TaskStatus::Unsubmitted,
            handle: None,
            failure: None,
            poll_failures: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TaskKind {
        self.params.kind()
    }

    pub fn params(&self) -> &TaskParams {
        &self.params
    }

    pub fn dependencies(&self) -> &[TaskId] {
        &self.depends
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn remote_handle(&self) -> Option<&RemoteHandle> {
        self.handle.as_ref()
    }

    pub fn failure(&self) -> Option<&FailureCause> {
        self.failure.as_ref()
    }

    pub fn poll_failures(&self) -> u32 {
        self.poll_failures
    }

    /// Submit the task to the platform.
    ///
    /// Only valid while `Unsubmitted`. On success the task becomes `Submitted`
    /// and keeps the returned handle; on failure it becomes `Failed`. Nothing
    /// is retried here.
    pub async fn submit<C>(&mut self, client: &C) -> Result<RemoteHandle, SubmissionError>
    where
        C: PlatformClient + ?Sized,
    {
        if self.status != TaskStatus::Unsubmitted {
            return Err(SubmissionError::AlreadySubmitted(self.id.clone()));
        }

        info!(task = %self.id, kind = %self.kind(), "submitting task");

        let result = match &self.params {
            TaskParams::Run(p) => run::submit_run(&self.id, p, client).await,
            TaskParams::ScheduledJob(p) => run::submit_scheduled(&self.id, p, client).await,
            TaskParams::Model(p) => model::submit(&self.id, p, client).await,
            TaskParams::App(p) => app::submit(&self.id, p, client).await,
        };

        match result {
            Ok(handle) => {
                self.handle = Some(handle.clone());
                self.advance(TaskStatus::Submitted);
                Ok(handle)
            }
            Err(err) => {
                self.fail(FailureCause::Submission(err.to_string()));
                Err(err)
            }
        }
    }

    /// Ask the platform where the task stands and update `status`.
    ///
    /// Terminal tasks return their status without touching the network.
    /// The mapped status is never `Unsubmitted` or `Submitted`.
    pub async fn refresh_status<C>(&mut self, client: &C) -> Result<TaskStatus, PollError>
    where
        C: PlatformClient + ?Sized,
    {
        if self.status.is_terminal() {
            return Ok(self.status);
        }

        let handle = match (&self.handle, self.status) {
            (Some(handle), s) if s.is_in_flight() => handle,
            _ => return Err(PollError::NotSubmitted(self.id.clone())),
        };

        let (next, raw) = match &self.params {
            // Registering the schedule is the whole job.
            TaskParams::ScheduledJob(_) => (TaskStatus::Succeeded, None),
            params => {
                let raw = client.status(handle).await?;
                let mapped = match params {
                    TaskParams::Run(_) => run::map_run_status(&raw)?,
                    TaskParams::Model(_) => model::map_build_status(&raw)?,
                    TaskParams::App(_) => app::map_app_status(&raw)?,
                    TaskParams::ScheduledJob(_) => TaskStatus::Succeeded,
                };
                (mapped, Some(raw))
            }
        };

        self.poll_failures = 0;
        if next == TaskStatus::Failed {
            self.failure = Some(FailureCause::Remote(raw.unwrap_or_default()));
        }
        self.advance(next);
        Ok(self.status)
    }

    /// Record a poll error. Returns `true` once `max_failures` consecutive
    /// errors have been seen, at which point the task is `Failed`.
    pub fn record_poll_failure(&mut self, err: &PollError, max_failures: u32) -> bool {
        self.poll_failures += 1;
        warn!(
            task = %self.id,
            attempt = self.poll_failures,
            max = max_failures,
            error = %err,
            "status poll failed"
        );

        if self.poll_failures >= max_failures {
            self.fail(FailureCause::PollExhausted {
                attempts: self.poll_failures,
                last_error: err.to_string(),
            });
            true
        } else {
            false
        }
    }

    /// Force the task into `Failed`. No-op (returns `false`) if already terminal.
    pub fn fail(&mut self, cause: FailureCause) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.failure = Some(cause);
        self.advance(TaskStatus::Failed)
    }

    fn advance(&mut self, next: TaskStatus) -> bool {
        if !self.status.can_advance_to(next) {
            warn!(
                task = %self.id,
                from = %self.status,
                to = %next,
                "ignoring backwards status transition"
            );
            return false;
        }
        if self.status != next {
            debug!(task = %self.id, from = %self.status, to = %next, "status transition");
            self.status = next;
        }
        true
    }
}
