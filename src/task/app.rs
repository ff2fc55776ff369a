// src/task/app.rs

//! Hosted web app deployments.
//!
//! A project hosts one app at a time, so every running app is stopped before
//! the new one is created and started.

use tracing::info;

use crate::client::{AppRequest, PlatformClient, RemoteHandle};
use crate::errors::{PollError, SubmissionError};
use crate::types::{TaskKind, TaskStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppParams {
    pub name: String,
    /// Hardware tier override; project default when `None`.
    pub tier: Option<String>,
}

pub(super) async fn submit<C>(
    task_id: &str,
    params: &AppParams,
    client: &C,
) -> Result<RemoteHandle, SubmissionError>
where
    C: PlatformClient + ?Sized,
{
    let running = client.running_apps().await?;
    for app_id in &running {
        info!(task = %task_id, %app_id, "unpublishing running app");
        client.unpublish_app(app_id).await?;
    }

    let req = AppRequest {
        name: params.name.clone(),
        tier: params.tier.clone(),
    };

    let app_id = client.create_app(&req).await?;
    info!(task = %task_id, %app_id, name = %params.name, "app created; starting");
    client.start_app(&app_id, &req).await?;

    Ok(RemoteHandle::App { app_id })
}

/// Map an app status onto ours. A running app counts as a successful deploy.
pub fn map_app_status(raw: &str) -> Result<TaskStatus, PollError> {
    match raw.trim().to_lowercase().as_str() {
        "running" => Ok(TaskStatus::Succeeded),
        "error" | "failed" => Ok(TaskStatus::Failed),
        "preparing" | "pending" | "finishing" => Ok(TaskStatus::InProgress),
        _ => Err(PollError::UnknownStatus {
            kind: TaskKind::App,
            status: raw.to_string(),
        }),
    }
}
