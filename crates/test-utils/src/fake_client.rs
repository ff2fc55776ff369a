use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use mlorch::client::{
    AppRequest, ClientError, ClientFuture, ModelRequest, ModelVersion, PlatformClient,
    RemoteHandle, RunRequest, ScheduledJobRequest,
};

/// One call made against the fake platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    StartRun(String),
    CreateScheduledJob(String),
    FindModel(String),
    PublishModel(String),
    PublishModelVersion { model_id: String, name: String },
    RunningApps,
    UnpublishApp(String),
    CreateApp(String),
    StartApp(String),
    Status(String),
}

#[derive(Default)]
struct Inner {
    /// Scripted status replies per key; the last reply repeats.
    scripts: HashMap<String, VecDeque<Result<String, ClientError>>>,
    submit_failures: HashMap<String, ClientError>,
    hanging_submits: HashSet<String>,
    hanging_polls: HashSet<String>,
    existing_models: HashMap<String, String>,
    /// model id -> model name, for keying status polls.
    model_names: HashMap<String, String>,
    running_apps: Vec<String>,
    versions: u32,
    calls: Vec<Call>,
}

/// In-memory [`PlatformClient`].
///
/// Remote work is identified by a *key*: the title of a run or scheduled
/// job (or its joined command when untitled), and the name of a model or
/// app. The builders in this crate use the task id for both, so tests can
/// script behaviour per task id.
///
/// Without a script, status polls report immediate success.
#[derive(Clone, Default)]
pub struct FakeClient {
    inner: Arc<Mutex<Inner>>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    /// Status replies for `key`, in order. The last one repeats forever.
    pub fn script<I, S>(&self, key: &str, statuses: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queue = statuses.into_iter().map(|s| Ok(s.into())).collect();
        self.lock().scripts.insert(key.to_string(), queue);
        self
    }

    /// Append a status reply for `key`.
    pub fn then_status(&self, key: &str, status: &str) -> &Self {
        self.lock()
            .scripts
            .entry(key.to_string())
            .or_default()
            .push_back(Ok(status.to_string()));
        self
    }

    /// Append a failing status reply for `key`.
    pub fn then_poll_error(&self, key: &str, err: ClientError) -> &Self {
        self.lock()
            .scripts
            .entry(key.to_string())
            .or_default()
            .push_back(Err(err));
        self
    }

    /// Reject the submission of `key`.
    pub fn fail_submit(&self, key: &str, err: ClientError) -> &Self {
        self.lock().submit_failures.insert(key.to_string(), err);
        self
    }

    /// Submission of `key` never completes.
    pub fn hang_submit(&self, key: &str) -> &Self {
        self.lock().hanging_submits.insert(key.to_string());
        self
    }

    /// Status polls of `key` never complete.
    pub fn hang_polls(&self, key: &str) -> &Self {
        self.lock().hanging_polls.insert(key.to_string());
        self
    }

    pub fn with_existing_model(&self, name: &str, model_id: &str) -> &Self {
        self.lock()
            .existing_models
            .insert(name.to_string(), model_id.to_string());
        self
    }

    pub fn with_running_app(&self, app_id: &str) -> &Self {
        self.lock().running_apps.push(app_id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn running_app_ids(&self) -> Vec<String> {
        self.lock().running_apps.clone()
    }

    /// Keys in the order they were submitted (any kind).
    pub fn submissions(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::StartRun(k) | Call::CreateScheduledJob(k) | Call::PublishModel(k) => Some(k),
                Call::PublishModelVersion { name, .. } => Some(name),
                Call::CreateApp(k) => Some(k),
                _ => None,
            })
            .collect()
    }

    /// Number of status polls made for `key`.
    pub fn polls_of(&self, key: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Status(k) if k == key))
            .count()
    }

    /// Shared submission prologue: log, then fail or hang if scripted.
    async fn begin_submit(&self, call: Call, key: &str) -> Result<(), ClientError> {
        let (failure, hang) = {
            let mut inner = self.lock();
            inner.calls.push(call);
            (
                inner.submit_failures.get(key).cloned(),
                inner.hanging_submits.contains(key),
            )
        };
        if hang {
            std::future::pending::<()>().await;
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn new_version(&self, model_id: &str, name: &str) -> ModelVersion {
        let mut inner = self.lock();
        inner.versions += 1;
        inner
            .model_names
            .insert(model_id.to_string(), name.to_string());
        ModelVersion {
            model_id: model_id.to_string(),
            version_id: format!("v{}", inner.versions),
        }
    }
}

fn run_key(req: &RunRequest) -> String {
    req.title.clone().unwrap_or_else(|| req.command.join(" "))
}

/// Key and default "done" status for a handle.
fn handle_key(inner: &Inner, handle: &RemoteHandle) -> (String, &'static str) {
    match handle {
        RemoteHandle::Run { run_id } => (strip(run_id, "run-"), "Succeeded"),
        RemoteHandle::ScheduledJob { job_id } => (strip(job_id, "job-"), "scheduled"),
        RemoteHandle::Model { model_id, .. } => {
            let name = inner
                .model_names
                .get(model_id)
                .cloned()
                .unwrap_or_else(|| strip(model_id, "model-"));
            (name, "complete")
        }
        RemoteHandle::App { app_id } => (strip(app_id, "app-"), "Running"),
    }
}

fn strip(id: &str, prefix: &str) -> String {
    id.strip_prefix(prefix).unwrap_or(id).to_string()
}

impl PlatformClient for FakeClient {
    fn start_run<'a>(&'a self, req: &'a RunRequest) -> ClientFuture<'a, String> {
        Box::pin(async move {
            let key = run_key(req);
            self.begin_submit(Call::StartRun(key.clone()), &key).await?;
            Ok(format!("run-{key}"))
        })
    }

    fn create_scheduled_job<'a>(
        &'a self,
        req: &'a ScheduledJobRequest,
    ) -> ClientFuture<'a, String> {
        Box::pin(async move {
            let key = req.title.clone();
            self.begin_submit(Call::CreateScheduledJob(key.clone()), &key)
                .await?;
            Ok(format!("job-{key}"))
        })
    }

    fn find_model<'a>(&'a self, name: &'a str) -> ClientFuture<'a, Option<String>> {
        Box::pin(async move {
            let mut inner = self.lock();
            inner.calls.push(Call::FindModel(name.to_string()));
            Ok(inner.existing_models.get(name).cloned())
        })
    }

    fn publish_model<'a>(&'a self, req: &'a ModelRequest) -> ClientFuture<'a, ModelVersion> {
        Box::pin(async move {
            self.begin_submit(Call::PublishModel(req.name.clone()), &req.name)
                .await?;
            let model_id = format!("model-{}", req.name);
            self.lock()
                .existing_models
                .insert(req.name.clone(), model_id.clone());
            Ok(self.new_version(&model_id, &req.name))
        })
    }

    fn publish_model_version<'a>(
        &'a self,
        model_id: &'a str,
        req: &'a ModelRequest,
    ) -> ClientFuture<'a, ModelVersion> {
        Box::pin(async move {
            let call = Call::PublishModelVersion {
                model_id: model_id.to_string(),
                name: req.name.clone(),
            };
            self.begin_submit(call, &req.name).await?;
            Ok(self.new_version(model_id, &req.name))
        })
    }

    fn running_apps(&self) -> ClientFuture<'_, Vec<String>> {
        Box::pin(async move {
            let mut inner = self.lock();
            inner.calls.push(Call::RunningApps);
            Ok(inner.running_apps.clone())
        })
    }

    fn unpublish_app<'a>(&'a self, app_id: &'a str) -> ClientFuture<'a, ()> {
        Box::pin(async move {
            let mut inner = self.lock();
            inner.calls.push(Call::UnpublishApp(app_id.to_string()));
            inner.running_apps.retain(|id| id != app_id);
            Ok(())
        })
    }

    fn create_app<'a>(&'a self, req: &'a AppRequest) -> ClientFuture<'a, String> {
        Box::pin(async move {
            self.begin_submit(Call::CreateApp(req.name.clone()), &req.name)
                .await?;
            Ok(format!("app-{}", req.name))
        })
    }

    fn start_app<'a>(&'a self, app_id: &'a str, _req: &'a AppRequest) -> ClientFuture<'a, ()> {
        Box::pin(async move {
            let mut inner = self.lock();
            inner.calls.push(Call::StartApp(app_id.to_string()));
            inner.running_apps.push(app_id.to_string());
            Ok(())
        })
    }

    fn status<'a>(&'a self, handle: &'a RemoteHandle) -> ClientFuture<'a, String> {
        Box::pin(async move {
            let (key, reply, hang) = {
                let mut inner = self.lock();
                let (key, done) = handle_key(&inner, handle);
                inner.calls.push(Call::Status(key.clone()));
                let hang = inner.hanging_polls.contains(&key);
                let reply = match inner.scripts.get_mut(&key) {
                    Some(queue) if queue.len() > 1 => queue.pop_front(),
                    Some(queue) => queue.front().cloned(),
                    None => None,
                };
                (key, reply.unwrap_or_else(|| Ok(done.to_string())), hang)
            };
            if hang {
                tracing::debug!(%key, "status poll hanging");
                std::future::pending::<()>().await;
            }
            reply
        })
    }
}
