// src/lib.rs

pub mod cli;
pub mod client;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod task;
pub mod types;

use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::client::{HttpPlatformClient, PlatformClient, Session};
use crate::client::http::HttpOptions;
use crate::config::loader::load_and_validate;
use crate::config::{PipelineFile, parse_duration};
use crate::engine::{Pipeline, PipelineReport};
use crate::errors::{MlorchError, Result};
use crate::task::TaskParams;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - task file loading and validation
/// - session resolution from the environment
/// - the HTTP platform client
/// - the pipeline loop
///
/// A pipeline that finishes with failed, blocked or timed-out tasks is
/// returned as an error so the caller can pick an exit code.
pub async fn run(args: CliArgs) -> Result<()> {
    let mut file = load_and_validate(&args.config)?;

    if let Some(ref raw) = args.poll_interval {
        let interval = parse_duration(raw)
            .map_err(|e| MlorchError::ConfigError(format!("--poll-interval: {e}")))?;
        if interval.is_zero() {
            return Err(MlorchError::ConfigError(
                "--poll-interval must be > 0".to_string(),
            ));
        }
        file.options.poll_interval = interval;
    }

    if args.dry_run {
        print_dry_run(&file);
        return Ok(());
    }

    let session = Session::from_env()?;
    info!(?session, "resolved platform session");

    let http_options = HttpOptions {
        request_timeout: file.options.request_timeout,
        ..HttpOptions::default()
    };
    let client = HttpPlatformClient::new(session, http_options)
        .map_err(|e| MlorchError::Session(format!("failed to build HTTP client: {e}")))?;

    let report = run_pipeline(file, client).await;
    report.into_result().map(|_| ())
}

/// Run a validated task file against any platform client.
pub async fn run_pipeline<C: PlatformClient>(file: PipelineFile, client: C) -> PipelineReport {
    Pipeline::new(file.graph, client, file.options).run().await
}

/// Print options and tasks (dependencies first) without contacting the platform.
fn print_dry_run(file: &PipelineFile) {
    let opts = &file.options;
    println!("mlorch dry-run");
    println!("  config.poll_interval = {:?}", opts.poll_interval);
    println!("  config.request_timeout = {:?}", opts.request_timeout);
    if let Some(timeout) = opts.timeout {
        println!("  config.timeout = {timeout:?}");
    }
    if let Some(max) = opts.max_iterations {
        println!("  config.max_iterations = {max}");
    }
    println!("  config.max_poll_failures = {}", opts.max_poll_failures);
    println!("  config.fail_fast = {}", opts.fail_fast);
    println!();

    println!("tasks ({}), in submission order:", file.graph.len());
    for id in file.graph.topological_order() {
        let Some(task) = file.graph.task(id) else {
            continue;
        };
        println!("  - {id} ({})", task.kind());
        match task.params() {
            TaskParams::Run(p) => {
                println!("      command: {}", p.command.join(" "));
                if let Some(ref tier) = p.tier {
                    println!("      tier: {tier}");
                }
            }
            TaskParams::ScheduledJob(p) => {
                println!("      command: {}", p.command);
                println!("      cron: {} ({})", p.cron_string, p.timezone);
            }
            TaskParams::Model(p) => {
                println!("      model: {} ({}:{})", p.name, p.file, p.function);
                if let Some(ref model_id) = p.model_id {
                    println!("      model_id: {model_id}");
                }
            }
            TaskParams::App(p) => {
                println!("      app: {}", p.name);
            }
        }
        let deps = file.graph.dependencies_of(id);
        if !deps.is_empty() {
            println!("      depends: {}", deps.join(" "));
        }
    }

    debug!("dry-run complete (no execution)");
}
