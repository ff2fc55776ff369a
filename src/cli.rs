// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `mlorch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "mlorch",
    version,
    about = "Run a dependency graph of remote jobs, models and apps to completion.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the task file (TOML).
    ///
    /// Default: `pipeline.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "pipeline.toml")]
    pub config: String,

    /// Override `[config].poll_interval` (e.g. "5s", "500ms").
    #[arg(long, value_name = "DURATION")]
    pub poll_interval: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `MLORCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the task graph, but don't contact the platform.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
