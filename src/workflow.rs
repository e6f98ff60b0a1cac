// src/workflow.rs

//! Workflow submission: turning a validated workflow file into persisted
//! jobs, starting it, and summarising its state.
//!
//! This is the DAG builder side of the system. It is the only place that
//! creates jobs, and it derives `incoming` / `outgoing` from the same
//! [`DagGraph`] so the two are always consistent.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::config::WorkflowFile;
use crate::dag::DagGraph;
use crate::engine::enqueue_job;
use crate::errors::{Result, WorkflowError};
use crate::job::{Job, JobState};
use crate::queue::QueueRuntime;
use crate::store::JobStore;
use crate::types::{JobName, WorkflowId};

/// A submitted workflow: its id and the names of its jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workflow {
    pub id: WorkflowId,
    pub jobs: Vec<JobName>,
    /// Jobs without dependencies, enqueued by [`WorkflowClient::start_workflow`].
    pub roots: Vec<JobName>,
}

/// Snapshot of a workflow's job states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowStatus {
    pub states: BTreeMap<JobName, JobState>,
}

impl WorkflowStatus {
    /// Every job succeeded.
    pub fn finished(&self) -> bool {
        self.states.values().all(|s| *s == JobState::Succeeded)
    }

    /// At least one job is `failed`.
    pub fn failed(&self) -> bool {
        self.states.values().any(|s| *s == JobState::Failed)
    }

    pub fn count(&self, state: JobState) -> usize {
        self.states.values().filter(|s| **s == state).count()
    }
}

/// Creates, starts and inspects workflows.
#[derive(Debug, Clone)]
pub struct WorkflowClient {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn QueueRuntime>,
}

impl WorkflowClient {
    pub fn new(store: Arc<dyn JobStore>, queue: Arc<dyn QueueRuntime>) -> Self {
        Self { store, queue }
    }

    /// Persist every job of `cfg` as `pending` under `workflow_id`.
    pub async fn create_workflow(
        &self,
        workflow_id: impl Into<WorkflowId>,
        cfg: &WorkflowFile,
    ) -> Result<Workflow> {
        let workflow_id = workflow_id.into();
        let graph = DagGraph::from_workflow(cfg);

        for (name, job_cfg) in cfg.job.iter() {
            let mut job = Job::new(
                workflow_id.clone(),
                name.clone(),
                job_cfg.class.clone(),
                job_cfg.effective_queue(),
            );
            job.incoming = graph.dependencies_of(name).to_vec();
            job.outgoing = graph.dependents_of(name).to_vec();
            job.params = job_cfg.effective_params();

            self.store.persist_job(&workflow_id, &job).await?;
        }

        let workflow = Workflow {
            id: workflow_id,
            jobs: graph.jobs().map(str::to_string).collect(),
            roots: graph.roots().map(str::to_string).collect(),
        };

        info!(
            workflow = %workflow.id,
            jobs = workflow.jobs.len(),
            roots = ?workflow.roots,
            "workflow created"
        );
        Ok(workflow)
    }

    /// Enqueue every root job of `workflow`.
    pub async fn start_workflow(&self, workflow: &Workflow) -> Result<()> {
        for name in &workflow.roots {
            let mut job = self.find(&workflow.id, name).await?;
            if job.state != JobState::Pending {
                continue;
            }
            enqueue_job(self.store.as_ref(), self.queue.as_ref(), &mut job).await?;
        }

        info!(workflow = %workflow.id, "workflow started");
        Ok(())
    }

    /// Current state of every job of `workflow`.
    pub async fn status(&self, workflow: &Workflow) -> Result<WorkflowStatus> {
        let mut states = BTreeMap::new();
        for name in &workflow.jobs {
            let job = self.find(&workflow.id, name).await?;
            states.insert(job.name, job.state);
        }
        Ok(WorkflowStatus { states })
    }

    async fn find(&self, workflow_id: &str, name: &str) -> Result<Job> {
        self.store
            .find_job(workflow_id, name)
            .await?
            .ok_or_else(|| WorkflowError::JobNotFound {
                workflow: workflow_id.to_string(),
                job: name.to_string(),
            })
    }
}
