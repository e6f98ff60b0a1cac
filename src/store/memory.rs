// src/store/memory.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::JobStore;
use crate::errors::{Result, WorkflowError};
use crate::job::Job;
use crate::types::{BoxFuture, JobName, WorkflowId};

/// In-process job store.
///
/// Cloning shares the underlying table, so every worker holding a clone sees
/// the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    jobs: Arc<Mutex<HashMap<(WorkflowId, JobName), Job>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a job synchronously (test setup helper).
    pub fn insert(&self, job: Job) {
        let key = (job.workflow_id.clone(), job.name.clone());
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.insert(key, job);
        }
    }

    /// Synchronous lookup (test assertions, summaries).
    pub fn get(&self, workflow_id: &str, name: &str) -> Option<Job> {
        let jobs = self.jobs.lock().ok()?;
        jobs.get(&(workflow_id.to_string(), name.to_string())).cloned()
    }

    /// All jobs of a workflow, sorted by name.
    pub fn jobs_of(&self, workflow_id: &str) -> Vec<Job> {
        let Ok(jobs) = self.jobs.lock() else {
            return Vec::new();
        };
        let mut out: Vec<Job> = jobs
            .iter()
            .filter(|((wf, _), _)| wf == workflow_id)
            .map(|(_, job)| job.clone())
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    fn poisoned() -> WorkflowError {
        WorkflowError::Store("memory store lock poisoned".to_string())
    }
}

impl JobStore for MemoryStore {
    fn find_job<'a>(
        &'a self,
        workflow_id: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<Job>>> {
        Box::pin(async move {
            let jobs = self.jobs.lock().map_err(|_| Self::poisoned())?;
            Ok(jobs
                .get(&(workflow_id.to_string(), name.to_string()))
                .cloned())
        })
    }

    fn persist_job<'a>(
        &'a self,
        workflow_id: &'a str,
        job: &'a Job,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut jobs = self.jobs.lock().map_err(|_| Self::poisoned())?;
            jobs.insert((workflow_id.to_string(), job.name.clone()), job.clone());
            Ok(())
        })
    }
}
