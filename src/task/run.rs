// src/task/run.rs

//! Immediate runs and cron-scheduled jobs.
//!
//! Both are declared as `type = "run"`; the presence of a `cron_string`
//! decides which platform API receives the submission.

use tracing::info;

use crate::client::{PlatformClient, RemoteHandle, RunRequest, ScheduledJobRequest};
use crate::errors::{PollError, SubmissionError};
use crate::types::{TaskKind, TaskStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParams {
    /// Script plus arguments, or a single shell line when `is_direct`.
    pub command: Vec<String>,
    pub is_direct: bool,
    pub title: Option<String>,
    /// Hardware tier override; project default when `None`.
    pub tier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJobParams {
    /// Scheduled jobs always run their command as one shell line.
    pub command: String,
    pub cron_string: String,
    pub title: String,
    pub tier: Option<String>,
    pub environment_id: Option<String>,
    pub scheduled_by: Option<String>,
    pub timezone: String,
}

pub(super) async fn submit_run<C>(
    task_id: &str,
    params: &RunParams,
    client: &C,
) -> Result<RemoteHandle, SubmissionError>
where
    C: PlatformClient + ?Sized,
{
    if params.command.is_empty() {
        return Err(SubmissionError::InvalidParameters(format!(
            "run '{task_id}' has an empty command"
        )));
    }

    let req = RunRequest {
        command: params.command.clone(),
        is_direct: params.is_direct,
        title: params.title.clone(),
        tier: params.tier.clone(),
    };

    let run_id = client.start_run(&req).await?;
    info!(
        task = %task_id,
        %run_id,
        direct = params.is_direct,
        tier = params.tier.as_deref().unwrap_or("default"),
        "run started"
    );
    Ok(RemoteHandle::Run { run_id })
}

pub(super) async fn submit_scheduled<C>(
    task_id: &str,
    params: &ScheduledJobParams,
    client: &C,
) -> Result<RemoteHandle, SubmissionError>
where
    C: PlatformClient + ?Sized,
{
    let req = ScheduledJobRequest {
        title: params.title.clone(),
        command: params.command.clone(),
        cron_string: params.cron_string.clone(),
        tier: params.tier.clone(),
        environment_id: params.environment_id.clone(),
        scheduled_by: params.scheduled_by.clone(),
        timezone: params.timezone.clone(),
    };

    let job_id = client.create_scheduled_job(&req).await?;
    info!(task = %task_id, %job_id, cron = %params.cron_string, "scheduled job registered");
    Ok(RemoteHandle::ScheduledJob { job_id })
}

/// Map the platform's run status vocabulary onto ours.
pub fn map_run_status(raw: &str) -> Result<TaskStatus, PollError> {
    match raw.trim().to_lowercase().as_str() {
        "succeeded" => Ok(TaskStatus::Succeeded),
        "error" | "failed" | "stopped" => Ok(TaskStatus::Failed),
        "queued" | "preparing" | "pending" | "running" | "finishing" => {
            Ok(TaskStatus::InProgress)
        }
        _ => Err(PollError::UnknownStatus {
            kind: TaskKind::Run,
            status: raw.to_string(),
        }),
    }
}
