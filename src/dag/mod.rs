// src/dag/mod.rs

//! Dependency graph of tasks.
//!
//! [`graph`] validates the declaration set (unknown ids, cycles) and answers
//! the readiness questions the pipeline asks every iteration.

pub mod graph;

pub use graph::TaskGraph;
