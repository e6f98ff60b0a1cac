// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::time::Duration;

use thiserror::Error;

use crate::job::JobState;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Job not found: {workflow}/{job}")]
    JobNotFound { workflow: String, job: String },

    #[error("Missing dependency '{dependency}' for job {workflow}/{job}")]
    MissingDependency {
        workflow: String,
        job: String,
        dependency: String,
    },

    #[error("Job {job} failed: {message}")]
    JobExecution { job: String, message: String },

    #[error("Timed out after {waited:?} waiting for lock '{key}'")]
    LockTimeout { key: String, waited: Duration },

    #[error("Invalid transition for job {job}: cannot {action} from {from:?}")]
    InvalidTransition {
        job: String,
        action: &'static str,
        from: JobState,
    },

    #[error("No behavior registered for class '{0}'")]
    UnknownClass(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Cycle detected in DAG: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WorkflowError {
    /// Whether this error is a lock-acquisition timeout.
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, WorkflowError::LockTimeout { .. })
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WorkflowError>;
