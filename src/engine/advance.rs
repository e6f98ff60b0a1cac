// src/engine/advance.rs

//! DAG advancement: enqueue downstream jobs once an upstream job succeeds.
//!
//! Several parents of the same child may finish at the same time, and each
//! of them runs this step. The "is the child ready, and if so enqueue it"
//! decision is therefore taken under a lock keyed by the *child*, with the
//! child reloaded inside the critical section. The child is marked
//! `enqueued` before the lock is released, so a sibling that gets the lock
//! afterwards sees it as already taken care of.
//!
//! If any child's lock cannot be acquired in time, the remaining children
//! are left alone and the whole step is rescheduled for the parent. The
//! redelivered request finds the parent `succeeded` and only re-runs this
//! step.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::errors::{Result, WorkflowError};
use crate::job::{Job, JobState};
use crate::lock::{enqueue_lock_key, with_lock, LockService};
use crate::queue::{ExecutionRequest, QueueRuntime};
use crate::store::JobStore;
use crate::types::JobName;

/// Result of one advancement pass over a job's `outgoing` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Every downstream job was examined.
    Completed { enqueued: Vec<JobName> },
    /// The lock for `contended` timed out; the pass was aborted there and a
    /// retry was scheduled. `enqueued` lists what got enqueued before that.
    Rescheduled {
        contended: JobName,
        enqueued: Vec<JobName>,
    },
}

impl AdvanceOutcome {
    pub fn enqueued(&self) -> &[JobName] {
        match self {
            AdvanceOutcome::Completed { enqueued } => enqueued,
            AdvanceOutcome::Rescheduled { enqueued, .. } => enqueued,
        }
    }

    pub fn is_rescheduled(&self) -> bool {
        matches!(self, AdvanceOutcome::Rescheduled { .. })
    }
}

/// Runs the advancement step against the store, lock service and queue.
#[derive(Debug, Clone)]
pub struct Advancer {
    store: Arc<dyn JobStore>,
    locks: Arc<dyn LockService>,
    queue: Arc<dyn QueueRuntime>,
    config: WorkerConfig,
}

impl Advancer {
    pub fn new(
        store: Arc<dyn JobStore>,
        locks: Arc<dyn LockService>,
        queue: Arc<dyn QueueRuntime>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            locks,
            queue,
            config,
        }
    }

    /// Enqueue every job in `job.outgoing` that has become ready.
    ///
    /// Lock timeouts are not errors here: they turn into a rescheduled retry
    /// and an [`AdvanceOutcome::Rescheduled`]. Store and queue failures are
    /// propagated.
    pub async fn enqueue_outgoing_jobs(&self, job: &Job) -> Result<AdvanceOutcome> {
        let mut enqueued = Vec::new();
        let options = self.config.lock_options();

        for child in &job.outgoing {
            let key = enqueue_lock_key(&job.workflow_id, child);

            let res = with_lock(self.locks.as_ref(), &key, options, || {
                self.enqueue_if_ready(&job.workflow_id, child)
            })
            .await;

            match res {
                Ok(true) => enqueued.push(child.clone()),
                Ok(false) => {}
                Err(WorkflowError::LockTimeout { key, waited }) => {
                    warn!(
                        workflow = %job.workflow_id,
                        job = %job.name,
                        downstream = %child,
                        %key,
                        ?waited,
                        retry_in = ?self.config.advance_retry_delay,
                        "enqueue lock contended; rescheduling advancement"
                    );
                    self.queue
                        .schedule_after(
                            self.config.advance_retry_delay,
                            &job.queue,
                            ExecutionRequest::new(job.workflow_id.clone(), job.name.clone()),
                        )
                        .await?;
                    return Ok(AdvanceOutcome::Rescheduled {
                        contended: child.clone(),
                        enqueued,
                    });
                }
                Err(err) => return Err(err),
            }
        }

        debug!(
            workflow = %job.workflow_id,
            job = %job.name,
            ?enqueued,
            "advancement complete"
        );
        Ok(AdvanceOutcome::Completed { enqueued })
    }

    /// Critical section: reload `name`, and enqueue it if it is ready.
    async fn enqueue_if_ready(&self, workflow_id: &str, name: &str) -> Result<bool> {
        let mut child = self
            .store
            .find_job(workflow_id, name)
            .await?
            .ok_or_else(|| WorkflowError::JobNotFound {
                workflow: workflow_id.to_string(),
                job: name.to_string(),
            })?;

        if !self.ready_to_start(&child).await? {
            debug!(
                workflow = %workflow_id,
                job = %name,
                state = ?child.state,
                "downstream job not ready; skipping"
            );
            return Ok(false);
        }

        enqueue_job(self.store.as_ref(), self.queue.as_ref(), &mut child).await?;
        Ok(true)
    }

    /// A job is ready when it has not been started yet and every upstream
    /// job has succeeded.
    async fn ready_to_start(&self, job: &Job) -> Result<bool> {
        if job.state != JobState::Pending {
            return Ok(false);
        }

        for parent in &job.incoming {
            match self.store.find_job(&job.workflow_id, parent).await? {
                Some(p) if p.succeeded() => {}
                _ => return Ok(false),
            }
        }

        Ok(true)
    }
}

/// Mark `job` enqueued, persist it, then hand it to the queue.
///
/// The state is persisted *before* the request is queued: a worker may pick
/// the request up immediately and persist `running`, which must not be
/// overwritten by a late `enqueued`. If queueing fails the job is put back
/// to `pending` so a later advancement can pick it up again.
pub async fn enqueue_job<S, Q>(store: &S, queue: &Q, job: &mut Job) -> Result<()>
where
    S: JobStore + ?Sized,
    Q: QueueRuntime + ?Sized,
{
    job.enqueue()?;
    store.persist_job(&job.workflow_id, job).await?;

    let request = ExecutionRequest::new(job.workflow_id.clone(), job.name.clone());
    if let Err(err) = queue.enqueue(&job.queue, request).await {
        warn!(
            workflow = %job.workflow_id,
            job = %job.name,
            error = %err,
            "queueing failed; rolling job back to pending"
        );
        job.reset_enqueue()?;
        store.persist_job(&job.workflow_id, job).await?;
        return Err(err);
    }

    info!(
        workflow = %job.workflow_id,
        job = %job.name,
        queue = %job.queue,
        "job enqueued"
    );
    Ok(())
}
