// src/exec/behavior.rs

//! Pluggable job behavior abstraction.
//!
//! A job's business logic is looked up by its `class_ref` and invoked with a
//! [`JobContext`]. Behaviors report back with an explicit [`JobOutcome`]
//! rather than an error, so the coordinator can record the `failed` state
//! before turning the failure into an error for the queue runtime.

use std::fmt;
use std::future::Future;

use serde_json::Value;

use crate::job::DependencyPayload;
use crate::types::{BoxFuture, JobName, WorkflowId};

/// Everything a behavior gets to see about the job it is running.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub workflow_id: WorkflowId,
    pub job: JobName,
    pub class_ref: String,
    pub params: Value,
    /// Outputs of the upstream jobs, in `incoming` order.
    pub payloads: Vec<DependencyPayload>,
}

impl JobContext {
    /// Output of the named upstream job, if it is one of this job's inputs.
    pub fn payload_of(&self, upstream: &str) -> Option<&Value> {
        self.payloads
            .iter()
            .find(|p| p.id == upstream)
            .map(|p| &p.output)
    }
}

/// Result of running a job's business logic.
#[derive(Debug)]
pub enum JobOutcome {
    Succeeded(Value),
    Failed(anyhow::Error),
}

impl From<anyhow::Result<Value>> for JobOutcome {
    fn from(res: anyhow::Result<Value>) -> Self {
        match res {
            Ok(value) => JobOutcome::Succeeded(value),
            Err(err) => JobOutcome::Failed(err),
        }
    }
}

/// Trait implemented by every job's business logic.
pub trait JobBehavior: Send + Sync {
    fn perform(&self, ctx: JobContext) -> BoxFuture<'_, JobOutcome>;
}

/// Adapter turning an async closure into a [`JobBehavior`].
pub struct FnBehavior<F> {
    inner: F,
}

impl<F> FnBehavior<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

impl<F> fmt::Debug for FnBehavior<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnBehavior").finish_non_exhaustive()
    }
}

impl<F, Fut> JobBehavior for FnBehavior<F>
where
    F: Fn(JobContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    fn perform(&self, ctx: JobContext) -> BoxFuture<'_, JobOutcome> {
        let fut = (self.inner)(ctx);
        Box::pin(async move { JobOutcome::from(fut.await) })
    }
}

/// Built-in behavior that does nothing and outputs `params.output`
/// (or `null`).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBehavior;

impl JobBehavior for NoopBehavior {
    fn perform(&self, ctx: JobContext) -> BoxFuture<'_, JobOutcome> {
        Box::pin(async move {
            let output = ctx.params.get("output").cloned().unwrap_or(Value::Null);
            JobOutcome::Succeeded(output)
        })
    }
}
