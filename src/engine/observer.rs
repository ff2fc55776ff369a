// src/engine/observer.rs

//! Pluggable sink for pipeline progress events.
//!
//! The pipeline talks to a `PipelineObserver` instead of logging directly.
//! Production uses [`TracingObserver`]; tests can provide their own
//! implementation that records events for assertions.

use tracing::{error, info, warn};

use super::PipelineEvent;

pub trait PipelineObserver: Send {
    fn on_event(&mut self, event: &PipelineEvent);
}

/// Renders events as `tracing` records.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&mut self, event: &PipelineEvent) {
        match event {
            PipelineEvent::Started { tasks } => {
                info!(count = tasks.len(), tasks = ?tasks, "starting the pipeline");
            }
            PipelineEvent::Submitted { task, handle } => {
                info!(task = %task, handle = %handle, "task submitted");
            }
            PipelineEvent::SubmissionFailed { task, error } => {
                error!(task = %task, error = %error, "submission failed");
            }
            PipelineEvent::StatusChanged { task, from, to } => {
                info!(task = %task, from = %from, to = %to, "task status changed");
            }
            PipelineEvent::PollFailed {
                task,
                attempt,
                error,
                exhausted,
            } => {
                if *exhausted {
                    error!(task = %task, attempt, error = %error, "giving up on status polling");
                } else {
                    warn!(task = %task, attempt, error = %error, "status poll failed; will retry");
                }
            }
            PipelineEvent::Blocked { tasks } => {
                warn!(tasks = ?tasks, "tasks blocked by failed dependencies");
            }
            PipelineEvent::Snapshot { iteration, tasks } => {
                for row in tasks {
                    let status = if row.blocked {
                        format!("{} (blocked)", row.status)
                    } else {
                        row.status.to_string()
                    };
                    info!(iteration, "task_id: {:15} status: {}", row.id, status);
                }
            }
            PipelineEvent::Finished {
                outcome,
                iterations,
            } => {
                info!(outcome = ?outcome, iterations, "pipeline finished");
            }
        }
    }
}
