// src/client/mod.rs

//! Remote execution client abstraction.
//!
//! Tasks never talk HTTP directly. They build one of the request records in
//! this module and hand it to a [`PlatformClient`]. That keeps the task state
//! machine testable with a fake client while the production implementation
//! lives in [`http`].
//!
//! - [`session`] resolves credentials and project coordinates once, up front.
//! - [`http`] implements [`PlatformClient`] on top of `reqwest`.

pub mod http;
pub mod session;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

pub use http::HttpPlatformClient;
pub use session::Session;

/// Boxed future returned by every client call.
pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ClientError>> + Send + 'a>>;

/// Errors produced by a [`PlatformClient`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("platform rejected request with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("could not decode platform response: {0}")]
    Decode(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("request timed out after {0:?}")]
    TimedOut(Duration),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

/// Opaque reference to submitted remote work, used for status polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteHandle {
    Run { run_id: String },
    ScheduledJob { job_id: String },
    Model { model_id: String, version_id: String },
    App { app_id: String },
}

impl fmt::Display for RemoteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteHandle::Run { run_id } => write!(f, "run:{run_id}"),
            RemoteHandle::ScheduledJob { job_id } => write!(f, "scheduled-job:{job_id}"),
            RemoteHandle::Model {
                model_id,
                version_id,
            } => write!(f, "model:{model_id}/{version_id}"),
            RemoteHandle::App { app_id } => write!(f, "app:{app_id}"),
        }
    }
}

/// Start an immediate job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Command and its arguments, e.g. `["main.py", "hi mom"]`.
    pub command: Vec<String>,
    /// Pass the command straight to a shell instead of treating it as a script.
    pub is_direct: bool,
    pub title: Option<String>,
    /// Human-readable hardware tier name ("Small", "GPU", ...).
    pub tier: Option<String>,
}

/// Register a cron-scheduled job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJobRequest {
    pub title: String,
    pub command: String,
    pub cron_string: String,
    pub tier: Option<String>,
    pub environment_id: Option<String>,
    /// User the schedule runs as; the project owner when `None`.
    pub scheduled_by: Option<String>,
    pub timezone: String,
}

/// Build and deploy a model endpoint (or a new version of one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub name: String,
    pub file: String,
    pub function: String,
    pub description: Option<String>,
    /// Compute environment; the platform default is chosen when `None`.
    pub environment_id: Option<String>,
}

/// Identifies one build of a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelVersion {
    pub model_id: String,
    pub version_id: String,
}

/// Create and start a hosted web app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppRequest {
    pub name: String,
    pub tier: Option<String>,
}

/// Everything the orchestrator needs from the remote platform.
///
/// Implementations must be usable from several in-flight calls at once; each
/// call addresses its own remote resource.
pub trait PlatformClient: Send + Sync {
    /// Start an immediate run; returns the run id.
    fn start_run<'a>(&'a self, req: &'a RunRequest) -> ClientFuture<'a, String>;

    /// Register a scheduled job; returns the schedule id.
    fn create_scheduled_job<'a>(&'a self, req: &'a ScheduledJobRequest)
        -> ClientFuture<'a, String>;

    /// Look up an existing model by name.
    fn find_model<'a>(&'a self, name: &'a str) -> ClientFuture<'a, Option<String>>;

    /// Publish a brand new model.
    fn publish_model<'a>(&'a self, req: &'a ModelRequest) -> ClientFuture<'a, ModelVersion>;

    /// Publish a new version of an existing model.
    fn publish_model_version<'a>(
        &'a self,
        model_id: &'a str,
        req: &'a ModelRequest,
    ) -> ClientFuture<'a, ModelVersion>;

    /// Ids of apps that are currently running (or about to run) in the project.
    fn running_apps(&self) -> ClientFuture<'_, Vec<String>>;

    /// Stop a running app.
    fn unpublish_app<'a>(&'a self, app_id: &'a str) -> ClientFuture<'a, ()>;

    /// Create a new app; returns its id.
    fn create_app<'a>(&'a self, req: &'a AppRequest) -> ClientFuture<'a, String>;

    /// Start a previously created app.
    fn start_app<'a>(&'a self, app_id: &'a str, req: &'a AppRequest) -> ClientFuture<'a, ()>;

    /// Raw remote status for a handle, in the platform's own vocabulary.
    fn status<'a>(&'a self, handle: &'a RemoteHandle) -> ClientFuture<'a, String>;
}
