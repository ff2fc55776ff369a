// src/config/mod.rs

//! Task file loading and validation for mlorch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a task file from disk (`loader.rs`).
//! - Turn declarations into typed tasks and a checked graph (`validate.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{load_and_validate, load_from_path, validate_str};
pub use model::{DependsDecl, PipelineFile, PipelineSection, RawPipelineFile, TaskDecl};
