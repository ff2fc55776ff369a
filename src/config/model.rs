// src/config/model.rs

use serde::Deserialize;

use crate::dag::TaskGraph;
use crate::engine::PipelineOptions;
use crate::types::DeclaredType;

/// Top-level task file as read from TOML.
///
/// ```toml
/// [config]
/// poll_interval = "15s"
///
/// [[task]]
/// id = "job_1"
/// command = "hello.py job_1"
///
/// [[task]]
/// id = "model_1"
/// type = "model"
/// file = "model.py"
/// function = "predict"
/// depends = "job_1"
/// ```
///
/// `[[task]]` is an array, so declaration order survives deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPipelineFile {
    #[serde(default)]
    pub config: PipelineSection,

    #[serde(default)]
    pub task: Vec<TaskDecl>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSection {
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,

    /// Overall wall-clock budget; unlimited when absent.
    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default)]
    pub max_iterations: Option<u64>,

    #[serde(default = "default_max_poll_failures")]
    pub max_poll_failures: u32,

    #[serde(default)]
    pub fail_fast: bool,

    /// Timezone id attached to scheduled jobs.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_poll_interval() -> String {
    "15s".to_string()
}

fn default_request_timeout() -> String {
    "60s".to_string()
}

fn default_max_poll_failures() -> u32 {
    3
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            request_timeout: default_request_timeout(),
            timeout: None,
            max_iterations: None,
            max_poll_failures: default_max_poll_failures(),
            fail_fast: false,
            timezone: default_timezone(),
        }
    }
}

/// One `[[task]]` entry.
///
/// Attributes are a union over all task types; validation decides which are
/// required or allowed for the declared `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskDecl {
    pub id: String,

    #[serde(rename = "type", default)]
    pub kind: DeclaredType,

    #[serde(default)]
    pub depends: DependsDecl,

    // run
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub direct: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub cron_string: Option<String>,
    #[serde(default)]
    pub user: Option<String>,

    // run + app
    #[serde(default)]
    pub tier: Option<String>,

    // run (scheduled) + model
    #[serde(default)]
    pub environment: Option<String>,

    // model
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub function: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,

    // model + app
    #[serde(default)]
    pub name: Option<String>,
}

/// `depends = "a b"` or `depends = ["a", "b"]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DependsDecl {
    Line(String),
    List(Vec<String>),
}

impl Default for DependsDecl {
    fn default() -> Self {
        DependsDecl::List(Vec::new())
    }
}

impl DependsDecl {
    pub fn ids(&self) -> Vec<String> {
        match self {
            DependsDecl::Line(line) => line.split_whitespace().map(str::to_string).collect(),
            DependsDecl::List(list) => list
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

/// A validated task file, ready to run.
#[derive(Debug, Clone)]
pub struct PipelineFile {
    pub options: PipelineOptions,
    pub graph: TaskGraph,
}
