// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::model::{PipelineFile, RawPipelineFile};
use crate::errors::Result;

/// Read and deserialize a task file without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawPipelineFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    debug!(path = %path.display(), bytes = contents.len(), "read task file");
    parse_str(&contents)
}

pub fn parse_str(contents: &str) -> Result<RawPipelineFile> {
    let raw: RawPipelineFile = toml::from_str(contents)?;
    Ok(raw)
}

/// Load a task file and validate it into a runnable [`PipelineFile`].
///
/// Besides TOML parsing this checks attribute requirements per task type,
/// duration strings, and the dependency graph (unknown ids, cycles).
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<PipelineFile> {
    let raw = load_from_path(&path)?;
    PipelineFile::try_from(raw)
}

/// Same as [`load_and_validate`] for an in-memory document.
pub fn validate_str(contents: &str) -> Result<PipelineFile> {
    PipelineFile::try_from(parse_str(contents)?)
}
