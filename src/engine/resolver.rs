// src/engine/resolver.rs

//! Collects the outputs of a job's upstream dependencies.

use tracing::debug;

use crate::errors::{Result, WorkflowError};
use crate::job::{DependencyPayload, Job};
use crate::store::JobStore;

/// Load one payload record per name in `job.incoming`, in that order.
///
/// Upstream jobs are assumed to have succeeded already; the scheduler only
/// delivers a job once its dependencies are satisfied. An upstream job that
/// cannot be found, or that has no output payload, yields
/// [`WorkflowError::MissingDependency`].
pub async fn resolve_payloads<S>(store: &S, job: &Job) -> Result<Vec<DependencyPayload>>
where
    S: JobStore + ?Sized,
{
    let mut payloads = Vec::with_capacity(job.incoming.len());

    for upstream_name in &job.incoming {
        let missing = || WorkflowError::MissingDependency {
            workflow: job.workflow_id.clone(),
            job: job.name.clone(),
            dependency: upstream_name.clone(),
        };

        let upstream = store
            .find_job(&job.workflow_id, upstream_name)
            .await?
            .ok_or_else(missing)?;
        let output = upstream.output_payload.ok_or_else(missing)?;

        payloads.push(DependencyPayload {
            id: upstream.name,
            class: upstream.class_ref,
            output,
        });
    }

    debug!(
        workflow = %job.workflow_id,
        job = %job.name,
        count = payloads.len(),
        "resolved dependency payloads"
    );

    Ok(payloads)
}
