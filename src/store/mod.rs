// src/store/mod.rs

//! Durable job storage.
//!
//! The engine only needs read-by-id and overwrite-by-id. Production
//! deployments plug in their own backend; [`memory::MemoryStore`] backs the
//! CLI and the tests.

use std::fmt::Debug;

use crate::errors::Result;
use crate::job::Job;
use crate::types::BoxFuture;

pub mod memory;

pub use memory::MemoryStore;

/// Abstract job store.
pub trait JobStore: Send + Sync + Debug {
    /// Load a job by `(workflow_id, name)`. `Ok(None)` means not found.
    fn find_job<'a>(
        &'a self,
        workflow_id: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<Job>>>;

    /// Overwrite the stored job with `job` (no compare-and-swap).
    fn persist_job<'a>(&'a self, workflow_id: &'a str, job: &'a Job)
    -> BoxFuture<'a, Result<()>>;
}
