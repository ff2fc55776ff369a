// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::time::Duration;

use thiserror::Error;

use crate::client::ClientError;
use crate::types::TaskKind;

#[derive(Error, Debug)]
pub enum MlorchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid task graph: {0}")]
    Graph(#[from] GraphError),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Pipeline timed out after {elapsed:?}; unfinished tasks: {}", unfinished.join(", "))]
    Timeout {
        elapsed: Duration,
        unfinished: Vec<String>,
    },

    #[error("Pipeline execution failed; failed tasks: {}", failed.join(", "))]
    PipelineFailed { failed: Vec<String> },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MlorchError {
    /// Process exit code: 1 when the pipeline ran but did not fully succeed,
    /// 2 when it could not start (bad task file, graph, session, ...).
    pub fn exit_code(&self) -> i32 {
        match self {
            MlorchError::Timeout { .. } | MlorchError::PipelineFailed { .. } => 1,
            _ => 2,
        }
    }
}

/// Problems detected while building the dependency graph.
///
/// All of these are fatal: the pipeline never starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("task '{0}' is declared more than once")]
    DuplicateTask(String),

    #[error("task '{task}' has unknown dependency '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    #[error("cycle detected in task graph involving: {}", participants.join(" -> "))]
    Cycle { participants: Vec<String> },
}

/// Errors raised by [`crate::task::Task::submit`].
///
/// The affected task is marked `Failed`; submissions are never retried.
#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("task '{0}' has already been submitted")]
    AlreadySubmitted(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("submission timed out after {0:?}")]
    TimedOut(Duration),

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Errors raised while polling the remote status of a submitted task.
///
/// These are treated as transient by the pipeline up to a configured number
/// of consecutive failures.
#[derive(Error, Debug)]
pub enum PollError {
    #[error("task '{0}' has no remote handle to poll")]
    NotSubmitted(String),

    #[error("unknown {kind} status '{status}'")]
    UnknownStatus { kind: TaskKind, status: String },

    #[error("status poll timed out after {0:?}")]
    TimedOut(Duration),

    #[error(transparent)]
    Client(#[from] ClientError),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, MlorchError>;
