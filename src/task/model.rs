// src/task/model.rs

//! Model endpoint deployments.

use tracing::info;

use crate::client::{ModelRequest, PlatformClient, RemoteHandle};
use crate::errors::{PollError, SubmissionError};
use crate::types::TaskStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelParams {
    /// Display name; also used to find an existing model to version.
    pub name: String,
    pub file: String,
    pub function: String,
    pub description: Option<String>,
    /// Explicit id of an existing model; skips the lookup by name.
    pub model_id: Option<String>,
    pub environment_id: Option<String>,
}

/// Publish the model, or a new version of it if it already exists.
pub(super) async fn submit<C>(
    task_id: &str,
    params: &ModelParams,
    client: &C,
) -> Result<RemoteHandle, SubmissionError>
where
    C: PlatformClient + ?Sized,
{
    let req = ModelRequest {
        name: params.name.clone(),
        file: params.file.clone(),
        function: params.function.clone(),
        description: params.description.clone(),
        environment_id: params.environment_id.clone(),
    };

    let existing = match &params.model_id {
        Some(id) => Some(id.clone()),
        None => client.find_model(&params.name).await?,
    };

    let version = match existing {
        Some(model_id) => {
            info!(
                task = %task_id,
                %model_id,
                "model already exists; publishing a new version"
            );
            client.publish_model_version(&model_id, &req).await?
        }
        None => client.publish_model(&req).await?,
    };

    info!(
        task = %task_id,
        model_id = %version.model_id,
        version_id = %version.version_id,
        "model build started"
    );

    Ok(RemoteHandle::Model {
        model_id: version.model_id,
        version_id: version.version_id,
    })
}

/// Map a model build status onto ours.
///
/// Only `complete` and explicit failures are decisive; every other value
/// (e.g. `building`) means the build is still going.
pub fn map_build_status(raw: &str) -> Result<TaskStatus, PollError> {
    match raw.trim().to_lowercase().as_str() {
        "complete" => Ok(TaskStatus::Succeeded),
        "failed" | "error" => Ok(TaskStatus::Failed),
        _ => Ok(TaskStatus::InProgress),
    }
}
