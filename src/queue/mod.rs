// src/queue/mod.rs

//! Queue runtime abstraction.
//!
//! The engine hands execution requests to a [`QueueRuntime`] and never looks
//! at how they get delivered. Delivery is at-least-once: a request may reach
//! a worker more than once, and the coordinator is written to cope with that.
//!
//! [`memory::MemoryQueue`] is the in-process implementation driving the CLI's
//! worker pool.

use std::fmt::Debug;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::types::{BoxFuture, JobName, WorkflowId};

pub mod memory;

pub use memory::MemoryQueue;

/// Queue name used when a job does not declare one.
pub const DEFAULT_QUEUE: &str = "default";

/// Payload of one execution request: "run job `job_id` of `workflow_id`".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub workflow_id: WorkflowId,
    pub job_id: JobName,
}

impl ExecutionRequest {
    pub fn new(workflow_id: impl Into<WorkflowId>, job_id: impl Into<JobName>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            job_id: job_id.into(),
        }
    }
}

/// A request as seen by a worker: which queue it came from and how many
/// times it has been attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub queue: String,
    pub request: ExecutionRequest,
    /// 1 for the first attempt.
    pub attempt: u32,
}

/// Trait abstracting how execution requests are handed to workers.
pub trait QueueRuntime: Send + Sync + Debug {
    /// Deliver `request` on `queue` as soon as possible.
    fn enqueue<'a>(&'a self, queue: &'a str, request: ExecutionRequest)
    -> BoxFuture<'a, Result<()>>;

    /// Deliver `request` on `queue` once `delay` has elapsed.
    fn schedule_after<'a>(
        &'a self,
        delay: Duration,
        queue: &'a str,
        request: ExecutionRequest,
    ) -> BoxFuture<'a, Result<()>>;
}
