// src/engine/coordinator.rs

//! Execution coordinator: the single entry point the queue runtime
//! dispatches against.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::engine::advance::{AdvanceOutcome, Advancer};
use crate::engine::resolver::resolve_payloads;
use crate::errors::{Result, WorkflowError};
use crate::exec::{BehaviorRegistry, JobContext, JobOutcome};
use crate::job::Job;
use crate::lock::LockService;
use crate::queue::QueueRuntime;
use crate::store::JobStore;

/// What a successful [`Coordinator::perform`] call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PerformOutcome {
    /// Business logic ran and succeeded, then downstream jobs were advanced.
    Executed { advance: AdvanceOutcome },
    /// The job had already succeeded; only the advancement step was retried.
    AdvancedOnly { advance: AdvanceOutcome },
}

impl PerformOutcome {
    pub fn advance(&self) -> &AdvanceOutcome {
        match self {
            PerformOutcome::Executed { advance } => advance,
            PerformOutcome::AdvancedOnly { advance } => advance,
        }
    }
}

/// Runs one `(workflow_id, job_id)` delivery end to end.
#[derive(Debug, Clone)]
pub struct Coordinator {
    store: Arc<dyn JobStore>,
    registry: BehaviorRegistry,
    advancer: Advancer,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn JobStore>,
        locks: Arc<dyn LockService>,
        queue: Arc<dyn QueueRuntime>,
        registry: BehaviorRegistry,
        config: WorkerConfig,
    ) -> Self {
        let advancer = Advancer::new(Arc::clone(&store), locks, queue, config);
        Self {
            store,
            registry,
            advancer,
        }
    }

    /// Execute job `job_id` of `workflow_id`.
    ///
    /// - Already succeeded: skip business logic, only (re-)run advancement.
    ///   This is the path a lock-contention retry takes.
    /// - Otherwise: resolve payloads, mark `running`, run the behavior, then
    ///   mark `succeeded` and advance, or mark `failed` and return
    ///   [`WorkflowError::JobExecution`]. Nothing is advanced after a failure.
    pub async fn perform(&self, workflow_id: &str, job_id: &str) -> Result<PerformOutcome> {
        let mut job = self.load_job(workflow_id, job_id).await?;

        if job.succeeded() {
            info!(
                workflow = %workflow_id,
                job = %job_id,
                "job already succeeded; retrying advancement only"
            );
            let advance = self.advancer.enqueue_outgoing_jobs(&job).await?;
            return Ok(PerformOutcome::AdvancedOnly { advance });
        }

        let payloads = match resolve_payloads(self.store.as_ref(), &job).await {
            Ok(payloads) => payloads,
            Err(err @ WorkflowError::MissingDependency { .. }) => {
                warn!(
                    workflow = %workflow_id,
                    job = %job_id,
                    error = %err,
                    "cannot resolve dependency payloads; failing job"
                );
                self.mark_as_failed(&mut job).await?;
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let behavior = match self.registry.resolve(&job.class_ref) {
            Ok(behavior) => behavior,
            Err(err) => {
                warn!(
                    workflow = %workflow_id,
                    job = %job_id,
                    class = %job.class_ref,
                    "no behavior for job class; failing job"
                );
                self.mark_as_failed(&mut job).await?;
                return Err(err);
            }
        };

        self.mark_as_started(&mut job).await?;

        let ctx = JobContext {
            workflow_id: job.workflow_id.clone(),
            job: job.name.clone(),
            class_ref: job.class_ref.clone(),
            params: job.params.clone(),
            payloads,
        };

        match behavior.perform(ctx).await {
            JobOutcome::Succeeded(output) => {
                self.mark_as_finished(&mut job, output).await?;
                let advance = self.advancer.enqueue_outgoing_jobs(&job).await?;
                Ok(PerformOutcome::Executed { advance })
            }
            JobOutcome::Failed(err) => {
                let message = format!("{err:#}");
                warn!(
                    workflow = %workflow_id,
                    job = %job_id,
                    error = %message,
                    "job failed"
                );
                self.mark_as_failed(&mut job).await?;
                Err(WorkflowError::JobExecution {
                    job: job.name,
                    message,
                })
            }
        }
    }

    async fn load_job(&self, workflow_id: &str, job_id: &str) -> Result<Job> {
        self.store
            .find_job(workflow_id, job_id)
            .await?
            .ok_or_else(|| WorkflowError::JobNotFound {
                workflow: workflow_id.to_string(),
                job: job_id.to_string(),
            })
    }

    async fn mark_as_started(&self, job: &mut Job) -> Result<()> {
        job.start()?;
        self.store.persist_job(&job.workflow_id, job).await?;
        info!(workflow = %job.workflow_id, job = %job.name, "job started");
        Ok(())
    }

    async fn mark_as_finished(&self, job: &mut Job, output: serde_json::Value) -> Result<()> {
        job.finish(output)?;
        self.store.persist_job(&job.workflow_id, job).await?;
        info!(workflow = %job.workflow_id, job = %job.name, "job succeeded");
        Ok(())
    }

    async fn mark_as_failed(&self, job: &mut Job) -> Result<()> {
        job.fail()?;
        self.store.persist_job(&job.workflow_id, job).await?;
        debug!(workflow = %job.workflow_id, job = %job.name, "job marked failed");
        Ok(())
    }
}
