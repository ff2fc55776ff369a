// src/config/validate.rs

use regex::Regex;

use crate::config::duration::parse_duration;
use crate::config::model::{PipelineFile, PipelineSection, RawPipelineFile, TaskDecl};
use crate::dag::TaskGraph;
use crate::engine::PipelineOptions;
use crate::errors::{MlorchError, Result};
use crate::task::{AppParams, ModelParams, RunParams, ScheduledJobParams, TaskParams, TaskSpec};
use crate::types::DeclaredType;

const TASK_ID_PATTERN: &str = r"^[A-Za-z0-9_.-]+$";

impl TryFrom<RawPipelineFile> for PipelineFile {
    type Error = MlorchError;

    fn try_from(raw: RawPipelineFile) -> std::result::Result<Self, Self::Error> {
        let options = pipeline_options(&raw.config)?;
        let specs = task_specs(&raw)?;
        let graph = TaskGraph::build(specs)?;
        Ok(PipelineFile { options, graph })
    }
}

fn config_error(msg: impl Into<String>) -> MlorchError {
    MlorchError::ConfigError(msg.into())
}

fn duration_field(field: &str, value: &str) -> Result<std::time::Duration> {
    parse_duration(value).map_err(|e| config_error(format!("[config].{field}: {e}")))
}

fn pipeline_options(cfg: &PipelineSection) -> Result<PipelineOptions> {
    let poll_interval = duration_field("poll_interval", &cfg.poll_interval)?;
    if poll_interval.is_zero() {
        return Err(config_error("[config].poll_interval must be > 0"));
    }

    let request_timeout = duration_field("request_timeout", &cfg.request_timeout)?;
    if request_timeout.is_zero() {
        return Err(config_error("[config].request_timeout must be > 0"));
    }

    let timeout = cfg
        .timeout
        .as_deref()
        .map(|t| duration_field("timeout", t))
        .transpose()?;

    if cfg.max_poll_failures == 0 {
        return Err(config_error("[config].max_poll_failures must be >= 1 (got 0)"));
    }
    if cfg.max_iterations == Some(0) {
        return Err(config_error("[config].max_iterations must be >= 1 (got 0)"));
    }
    if cfg.timezone.trim().is_empty() {
        return Err(config_error("[config].timezone must not be empty"));
    }

    Ok(PipelineOptions {
        poll_interval,
        request_timeout,
        timeout,
        max_iterations: cfg.max_iterations,
        max_poll_failures: cfg.max_poll_failures,
        fail_fast: cfg.fail_fast,
    })
}

fn task_specs(raw: &RawPipelineFile) -> Result<Vec<TaskSpec>> {
    let id_pattern = Regex::new(TASK_ID_PATTERN)
        .map_err(|e| config_error(format!("invalid task id pattern: {e}")))?;

    raw.task
        .iter()
        .map(|decl| {
            if !id_pattern.is_match(&decl.id) {
                return Err(config_error(format!(
                    "invalid task id '{}': only letters, digits, '_', '-' and '.' are allowed",
                    decl.id
                )));
            }
            let params = match decl.kind {
                DeclaredType::Run => run_params(decl, &raw.config.timezone)?,
                DeclaredType::Model => model_params(decl)?,
                DeclaredType::App => app_params(decl)?,
            };
            Ok(TaskSpec {
                id: decl.id.clone(),
                depends: decl.depends.ids(),
                params,
            })
        })
        .collect()
}

/// Fail if any attribute that does not belong to this task type is set.
fn reject_foreign(decl: &TaskDecl, kind: &str, attrs: &[(&str, bool)]) -> Result<()> {
    match attrs.iter().find(|(_, set)| *set) {
        Some((attr, _)) => Err(config_error(format!(
            "task '{}': attribute `{attr}` is not valid for {kind} tasks",
            decl.id
        ))),
        None => Ok(()),
    }
}

fn run_params(decl: &TaskDecl, timezone: &str) -> Result<TaskParams> {
    reject_foreign(
        decl,
        "run",
        &[
            ("file", decl.file.is_some()),
            ("function", decl.function.is_some()),
            ("description", decl.description.is_some()),
            ("model_id", decl.model_id.is_some()),
            ("name", decl.name.is_some()),
        ],
    )?;

    let command = decl
        .command
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| config_error(format!("run task '{}' requires `command`", decl.id)))?;

    if let Some(cron_string) = &decl.cron_string {
        let cron_string = cron_string.trim();
        if cron_string.is_empty() {
            return Err(config_error(format!(
                "task '{}': `cron_string` must not be empty",
                decl.id
            )));
        }
        reject_foreign(decl, "scheduled", &[("direct", decl.direct)])?;

        return Ok(TaskParams::ScheduledJob(ScheduledJobParams {
            command: command.to_string(),
            cron_string: cron_string.to_string(),
            title: decl.title.clone().unwrap_or_else(|| decl.id.clone()),
            tier: decl.tier.clone(),
            environment_id: decl.environment.clone(),
            scheduled_by: decl.user.clone(),
            timezone: timezone.to_string(),
        }));
    }

    reject_foreign(
        decl,
        "unscheduled run",
        &[
            ("user", decl.user.is_some()),
            ("environment", decl.environment.is_some()),
        ],
    )?;

    let command = if decl.direct {
        vec![command.to_string()]
    } else {
        command.split_whitespace().map(str::to_string).collect()
    };

    Ok(TaskParams::Run(RunParams {
        command,
        is_direct: decl.direct,
        title: decl.title.clone(),
        tier: decl.tier.clone(),
    }))
}

fn model_params(decl: &TaskDecl) -> Result<TaskParams> {
    reject_foreign(
        decl,
        "model",
        &[
            ("command", decl.command.is_some()),
            ("direct", decl.direct),
            ("title", decl.title.is_some()),
            ("cron_string", decl.cron_string.is_some()),
            ("user", decl.user.is_some()),
            ("tier", decl.tier.is_some()),
        ],
    )?;

    let required = |value: &Option<String>, attr: &str| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| config_error(format!("model task '{}' requires `{attr}`", decl.id)))
    };

    Ok(TaskParams::Model(ModelParams {
        name: decl.name.clone().unwrap_or_else(|| decl.id.clone()),
        file: required(&decl.file, "file")?,
        function: required(&decl.function, "function")?,
        description: decl.description.clone(),
        model_id: decl.model_id.clone(),
        environment_id: decl.environment.clone(),
    }))
}

fn app_params(decl: &TaskDecl) -> Result<TaskParams> {
    reject_foreign(
        decl,
        "app",
        &[
            ("command", decl.command.is_some()),
            ("direct", decl.direct),
            ("title", decl.title.is_some()),
            ("cron_string", decl.cron_string.is_some()),
            ("user", decl.user.is_some()),
            ("environment", decl.environment.is_some()),
            ("file", decl.file.is_some()),
            ("function", decl.function.is_some()),
            ("description", decl.description.is_some()),
            ("model_id", decl.model_id.is_some()),
        ],
    )?;

    Ok(TaskParams::App(AppParams {
        name: decl.name.clone().unwrap_or_else(|| decl.id.clone()),
        tier: decl.tier.clone(),
    }))
}
