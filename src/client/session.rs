// src/client/session.rs

//! Authentication and project coordinates for the remote platform.

use crate::errors::{MlorchError, Result};

pub const ENV_API_HOST: &str = "MLORCH_API_HOST";
pub const ENV_API_KEY: &str = "MLORCH_USER_API_KEY";
pub const ENV_PROJECT_OWNER: &str = "MLORCH_PROJECT_OWNER";
pub const ENV_PROJECT_NAME: &str = "MLORCH_PROJECT_NAME";

/// Resolved once at startup and handed to the client.
#[derive(Clone)]
pub struct Session {
    /// Base URL, e.g. `https://mlops.example.com` (no trailing slash).
    pub host: String,
    pub api_key: String,
    pub project_owner: String,
    pub project_name: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host)
            .field("api_key", &"<redacted>")
            .field("project_owner", &self.project_owner)
            .field("project_name", &self.project_name)
            .finish()
    }
}

impl Session {
    pub fn new(
        host: impl Into<String>,
        api_key: impl Into<String>,
        project_owner: impl Into<String>,
        project_name: impl Into<String>,
    ) -> Self {
        let host: String = host.into();
        Self {
            host: host.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            project_owner: project_owner.into(),
            project_name: project_name.into(),
        }
    }

    /// Read the session from `MLORCH_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| MlorchError::Session(format!("environment variable {key} is not set")))
        };

        Ok(Self::new(
            get(ENV_API_HOST)?,
            get(ENV_API_KEY)?,
            get(ENV_PROJECT_OWNER)?,
            get(ENV_PROJECT_NAME)?,
        ))
    }
}
