use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Lifecycle state of a task.
///
/// Transitions only ever move forward:
///
/// ```text
/// Unsubmitted -> Submitted -> InProgress -> Succeeded | Failed
///      \______________________________________________/^
///                   (submission failure)
/// ```
///
/// `Submitted` is a bookkeeping state that lasts until the first poll. A task
/// may jump straight from `Submitted` to a terminal state if the remote work
/// finished before it was polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Unsubmitted,
    Submitted,
    InProgress,
    Succeeded,
    Failed,
}

impl TaskStatus {
    /// `Succeeded` and `Failed` never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }

    /// Submitted or InProgress: the remote side owns the work.
    pub fn is_in_flight(self) -> bool {
        matches!(self, TaskStatus::Submitted | TaskStatus::InProgress)
    }

    fn rank(self) -> u8 {
        match self {
            TaskStatus::Unsubmitted => 0,
            TaskStatus::Submitted => 1,
            TaskStatus::InProgress => 2,
            TaskStatus::Succeeded | TaskStatus::Failed => 3,
        }
    }

    /// Whether moving from `self` to `next` is a legal forward transition.
    ///
    /// Staying in the same non-terminal state is allowed (a poll that reports
    /// "still running"). Anything that goes backwards, or leaves a terminal
    /// state, is not.
    pub fn can_advance_to(self, next: TaskStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if self == next {
            return true;
        }
        next.rank() > self.rank()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Unsubmitted => "Unsubmitted",
            TaskStatus::Submitted => "Submitted",
            TaskStatus::InProgress => "In-progress",
            TaskStatus::Succeeded => "Succeeded",
            TaskStatus::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// The four kinds of remote work the orchestrator knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Run,
    ScheduledJob,
    Model,
    App,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskKind::Run => "run",
            TaskKind::ScheduledJob => "scheduled-job",
            TaskKind::Model => "model",
            TaskKind::App => "app",
        };
        f.write_str(s)
    }
}

/// Declared `type = "..."` of a task in the task file.
///
/// Scheduled jobs are declared as `run` tasks with a `cron_string`, so they
/// have no entry here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclaredType {
    #[default]
    Run,
    Model,
    App,
}

impl FromStr for DeclaredType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "run" => Ok(DeclaredType::Run),
            "model" => Ok(DeclaredType::Model),
            "app" => Ok(DeclaredType::App),
            other => Err(format!(
                "{other} is not a valid task type (expected \"run\", \"model\" or \"app\")"
            )),
        }
    }
}

/// Why a task ended up `Failed` (or never left `Unsubmitted`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// The submit call was rejected or errored.
    Submission(String),
    /// The remote platform reported a failed status.
    Remote(String),
    /// Too many consecutive status polls errored.
    PollExhausted { attempts: u32, last_error: String },
    /// The pipeline budget ran out while the task was unfinished.
    TimedOut,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Submission(e) => write!(f, "submission failed: {e}"),
            FailureCause::Remote(status) => write!(f, "remote status '{status}'"),
            FailureCause::PollExhausted {
                attempts,
                last_error,
            } => write!(
                f,
                "status polling failed {attempts} times in a row (last error: {last_error})"
            ),
            FailureCause::TimedOut => f.write_str("pipeline timed out"),
        }
    }
}
