// src/client/http.rs

//! `reqwest`-backed [`PlatformClient`].
//!
//! Routes used (all relative to [`Session::host`]):
//!
//! | purpose                | method | path                                                        |
//! |------------------------|--------|-------------------------------------------------------------|
//! | project id             | GET    | `/v4/gateway/projects/findProjectByOwnerAndName`            |
//! | start run              | POST   | `/v1/projects/{owner}/{project}/runs`                       |
//! | run status             | GET    | `/v1/projects/{owner}/{project}/runs/{run_id}`              |
//! | hardware tiers         | GET    | `/v4/projects/{project_id}/hardwareTiers`                   |
//! | user lookup            | GET    | `/v4/users?userName=...`                                    |
//! | scheduled job          | POST   | `/v4/projects/{project_id}/scheduledjobs`                   |
//! | environments           | GET    | `/v1/environments`                                          |
//! | list models            | GET    | `/v1/projects/{owner}/{project}/models`                     |
//! | publish model          | POST   | `/v1/models`                                                |
//! | publish model version  | POST   | `/v1/models/{model_id}/versions`                            |
//! | model versions         | GET    | `/v1/models/{model_id}/versions`                            |
//! | model build status     | GET    | `/v4/models/{model_id}/{version_id}/getBuildStatus`         |
//! | list / create apps     | GET/POST | `/v4/modelProducts`                                       |
//! | start / stop app       | POST   | `/v4/modelProducts/{app_id}/start`, `.../stop`              |
//! | app status             | GET    | `/v4/modelProducts/{app_id}`                                |

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{
    AppRequest, ClientError, ClientFuture, ModelRequest, ModelVersion, PlatformClient,
    RemoteHandle, RunRequest, ScheduledJobRequest, Session,
};

pub const API_KEY_HEADER: &str = "X-Domino-Api-Key";

const APP_ACTIVE_STATES: [&str; 3] = ["running", "pending", "preparing"];

#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

pub struct HttpPlatformClient {
    http: Client,
    session: Session,
    project_id: OnceCell<String>,
}

#[derive(Deserialize)]
struct RunStarted {
    #[serde(rename = "runId")]
    run_id: String,
}

#[derive(Deserialize)]
struct StatusBody {
    status: String,
}

#[derive(Deserialize)]
struct IdBody {
    id: String,
}

#[derive(Deserialize)]
struct TierEntry {
    #[serde(rename = "hardwareTier")]
    hardware_tier: Tier,
}

#[derive(Deserialize)]
struct Tier {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct DataList<T> {
    data: Vec<T>,
}

#[derive(Deserialize)]
struct Environment {
    id: String,
    #[serde(default)]
    visibility: Option<String>,
}

#[derive(Deserialize)]
struct ModelEntry {
    #[serde(alias = "_id")]
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct Published {
    data: Versioned,
}

#[derive(Deserialize)]
struct Versioned {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Deserialize)]
struct AppEntry {
    id: String,
    #[serde(default)]
    status: String,
}

impl HttpPlatformClient {
    pub fn new(session: Session, options: HttpOptions) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(options.request_timeout)
            .connect_timeout(options.connect_timeout)
            .user_agent(concat!("mlorch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            session,
            project_id: OnceCell::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.session.host, path)
    }

    fn project_path(&self) -> String {
        format!(
            "/v1/projects/{}/{}",
            self.session.project_owner, self.session.project_name
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.get_json_query(path, &[]).await
    }

    /// GET with query parameters; values are percent-encoded by reqwest.
    async fn get_json_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        debug!(path, ?query, "GET");
        let resp = self
            .http
            .get(self.url(path))
            .query(query)
            .header(API_KEY_HEADER, &self.session.api_key)
            .send()
            .await?;
        decode(resp).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, ClientError> {
        debug!(path, "POST");
        let resp = self
            .http
            .post(self.url(path))
            .header(API_KEY_HEADER, &self.session.api_key)
            .json(body)
            .send()
            .await?;
        decode(resp).await
    }

    async fn project_id(&self) -> Result<&str, ClientError> {
        let id = self
            .project_id
            .get_or_try_init(|| async {
                let body: IdBody = self
                    .get_json_query(
                        "/v4/gateway/projects/findProjectByOwnerAndName",
                        &[
                            ("ownerName", self.session.project_owner.as_str()),
                            ("projectName", self.session.project_name.as_str()),
                        ],
                    )
                    .await?;
                info!(project_id = %body.id, "resolved project id");
                Ok::<_, ClientError>(body.id)
            })
            .await?;
        Ok(id.as_str())
    }

    /// Map a human-readable tier name ("Large") to the platform's tier id.
    async fn hardware_tier_id(&self, tier_name: &str) -> Result<String, ClientError> {
        let project_id = self.project_id().await?;
        let tiers: Vec<TierEntry> = self
            .get_json(&format!("/v4/projects/{project_id}/hardwareTiers"))
            .await?;

        tiers
            .into_iter()
            .find(|t| t.hardware_tier.name.eq_ignore_ascii_case(tier_name))
            .map(|t| t.hardware_tier.id)
            .ok_or_else(|| ClientError::NotFound(format!("hardware tier '{tier_name}'")))
    }

    async fn user_id(&self, username: &str) -> Result<String, ClientError> {
        let users: Vec<IdBody> = self
            .get_json_query("/v4/users", &[("userName", username)])
            .await?;
        users
            .into_iter()
            .next()
            .map(|u| u.id)
            .ok_or_else(|| ClientError::NotFound(format!("user '{username}'")))
    }

    async fn environment_or_default(&self, requested: Option<&str>) -> Result<String, ClientError> {
        if let Some(env) = requested {
            return Ok(env.to_string());
        }
        let envs: DataList<Environment> = self.get_json("/v1/environments").await?;
        let env = envs
            .data
            .into_iter()
            .find(|e| e.visibility.as_deref() == Some("Global"))
            .map(|e| e.id)
            .ok_or_else(|| ClientError::NotFound("a global environment".to_string()))?;
        tracing::warn!(environment = %env, "no environment given for model; using first global environment");
        Ok(env)
    }

    /// Most recent version of a model (the platform lists newest first).
    async fn latest_version(&self, model_id: &str) -> Result<String, ClientError> {
        let versions: DataList<Versioned> = self
            .get_json(&format!("/v1/models/{model_id}/versions"))
            .await?;
        versions
            .data
            .into_iter()
            .next()
            .map(|v| v.id)
            .ok_or_else(|| ClientError::NotFound(format!("versions of model '{model_id}'")))
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Rejected {
            status: status.as_u16(),
            body,
        });
    }
    resp.json::<T>()
        .await
        .map_err(|e| ClientError::Decode(e.to_string()))
}

fn now_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

impl PlatformClient for HttpPlatformClient {
    fn start_run<'a>(&'a self, req: &'a RunRequest) -> ClientFuture<'a, String> {
        Box::pin(async move {
            let mut body = json!({
                "command": req.command,
                "isDirect": req.is_direct,
            });
            if let Some(title) = &req.title {
                body["title"] = json!(title);
            }
            if let Some(tier) = &req.tier {
                body["tier"] = json!(tier);
            }
            let started: RunStarted = self
                .post_json(&format!("{}/runs", self.project_path()), &body)
                .await?;
            Ok(started.run_id)
        })
    }

    fn create_scheduled_job<'a>(
        &'a self,
        req: &'a ScheduledJobRequest,
    ) -> ClientFuture<'a, String> {
        Box::pin(async move {
            let project_id = self.project_id().await?.to_string();
            let tier_id = match &req.tier {
                Some(name) => Some(self.hardware_tier_id(name).await?),
                None => None,
            };
            let username = req
                .scheduled_by
                .as_deref()
                .unwrap_or(&self.session.project_owner);
            let user_id = self.user_id(username).await?;

            let body = json!({
                "title": req.title,
                "command": req.command,
                "schedule": {
                    "cronString": req.cron_string,
                    "isCustom": true,
                },
                "hardwareTierIdentifier": tier_id,
                "environmentRevisionSpec": "ActiveRevision",
                "notifyOnCompleteEmailAddresses": [],
                "isPaused": false,
                "timezoneId": req.timezone,
                "publishAfterCompleted": false,
                "allowConcurrentExecution": false,
                "scheduledByUserId": user_id,
                "overrideEnvironmentId": req.environment_id,
            });

            let created: IdBody = self
                .post_json(&format!("/v4/projects/{project_id}/scheduledjobs"), &body)
                .await?;
            Ok(created.id)
        })
    }

    fn find_model<'a>(&'a self, name: &'a str) -> ClientFuture<'a, Option<String>> {
        Box::pin(async move {
            let models: DataList<ModelEntry> = self
                .get_json(&format!("{}/models", self.project_path()))
                .await?;
            Ok(models
                .data
                .into_iter()
                .find(|m| m.name == name)
                .map(|m| m.id))
        })
    }

    fn publish_model<'a>(&'a self, req: &'a ModelRequest) -> ClientFuture<'a, ModelVersion> {
        Box::pin(async move {
            let project_id = self.project_id().await?.to_string();
            let environment_id = self
                .environment_or_default(req.environment_id.as_deref())
                .await?;
            let body = json!({
                "name": req.name,
                "description": req.description.clone().unwrap_or_default(),
                "projectId": project_id,
                "file": req.file,
                "function": req.function,
                "environmentId": environment_id,
            });
            let published: Published = self.post_json("/v1/models", &body).await?;
            let model_id = published.data.id;
            let version_id = self.latest_version(&model_id).await?;
            Ok(ModelVersion {
                model_id,
                version_id,
            })
        })
    }

    fn publish_model_version<'a>(
        &'a self,
        model_id: &'a str,
        req: &'a ModelRequest,
    ) -> ClientFuture<'a, ModelVersion> {
        Box::pin(async move {
            let project_id = self.project_id().await?.to_string();
            let environment_id = self
                .environment_or_default(req.environment_id.as_deref())
                .await?;
            let body = json!({
                "projectId": project_id,
                "file": req.file,
                "function": req.function,
                "environmentId": environment_id,
                "description": req.description.clone().unwrap_or_default(),
            });
            let _: Value = self
                .post_json(&format!("/v1/models/{model_id}/versions"), &body)
                .await?;
            let version_id = self.latest_version(model_id).await?;
            Ok(ModelVersion {
                model_id: model_id.to_string(),
                version_id,
            })
        })
    }

    fn running_apps(&self) -> ClientFuture<'_, Vec<String>> {
        Box::pin(async move {
            let project_id = self.project_id().await?.to_string();
            let apps: Vec<AppEntry> = self
                .get_json_query("/v4/modelProducts", &[("projectId", project_id.as_str())])
                .await?;
            Ok(apps
                .into_iter()
                .filter(|a| APP_ACTIVE_STATES.contains(&a.status.to_lowercase().as_str()))
                .map(|a| a.id)
                .collect())
        })
    }

    fn unpublish_app<'a>(&'a self, app_id: &'a str) -> ClientFuture<'a, ()> {
        Box::pin(async move {
            let _: Value = self
                .post_json(&format!("/v4/modelProducts/{app_id}/stop"), &json!({}))
                .await?;
            Ok(())
        })
    }

    fn create_app<'a>(&'a self, req: &'a AppRequest) -> ClientFuture<'a, String> {
        Box::pin(async move {
            let project_id = self.project_id().await?.to_string();
            let now = now_nanos();
            let body = json!({
                "modelProductType": "APP",
                "projectId": project_id,
                "name": req.name,
                "owner": "",
                "created": now,
                "lastUpdated": now,
                "status": "",
                "media": [],
                "openUrl": "",
                "tags": [],
                "stats": { "usageCount": 0 },
                "appExtension": { "appType": "" },
                "id": "000000000000000000000000",
                "permissionsData": {
                    "visibility": "GRANT_BASED",
                    "accessRequestStatuses": {},
                    "pendingInvitations": [],
                    "discoverable": true,
                    "appAccessStatus": "ALLOWED",
                },
            });
            let created: IdBody = self.post_json("/v4/modelProducts", &body).await?;
            Ok(created.id)
        })
    }

    fn start_app<'a>(&'a self, app_id: &'a str, req: &'a AppRequest) -> ClientFuture<'a, ()> {
        Box::pin(async move {
            let body = match &req.tier {
                Some(tier) => json!({ "hardwareTierId": self.hardware_tier_id(tier).await? }),
                None => json!({}),
            };
            let _: Value = self
                .post_json(&format!("/v4/modelProducts/{app_id}/start"), &body)
                .await?;
            Ok(())
        })
    }

    fn status<'a>(&'a self, handle: &'a RemoteHandle) -> ClientFuture<'a, String> {
        Box::pin(async move {
            let body: StatusBody = match handle {
                RemoteHandle::Run { run_id } => {
                    self.get_json(&format!("{}/runs/{run_id}", self.project_path()))
                        .await?
                }
                // The platform exposes no status for a schedule itself.
                RemoteHandle::ScheduledJob { job_id } => {
                    return Err(ClientError::NotFound(format!(
                        "status of scheduled job '{job_id}'"
                    )));
                }
                RemoteHandle::Model {
                    model_id,
                    version_id,
                } => {
                    self.get_json(&format!(
                        "/v4/models/{model_id}/{version_id}/getBuildStatus"
                    ))
                    .await?
                }
                RemoteHandle::App { app_id } => {
                    self.get_json(&format!("/v4/modelProducts/{app_id}")).await?
                }
            };
            Ok(body.status)
        })
    }
}
