// src/config/mod.rs

//! Workflow file loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`), including the immutable
//!   [`WorkerConfig`] handed to the engine.
//! - Load a workflow file from disk (`loader.rs`).
//! - Validate dependencies and acyclicity (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, parse_str};
pub use model::{
    ConfigSection, JobConfig, RawWorkflowFile, RuntimeOptions, WorkerConfig, WorkflowFile,
};
