#![allow(dead_code)]

use std::collections::BTreeMap;
use std::time::Duration;

use dagworker::config::{ConfigSection, JobConfig, RawWorkflowFile, WorkflowFile};
use dagworker::dag::DagGraph;
use dagworker::job::{Job, JobState};
use dagworker::queue::DEFAULT_QUEUE;
use dagworker::store::MemoryStore;
use dagworker::types::HumanDuration;
use serde_json::Value;

/// Builder for `WorkflowFile` to simplify test setup.
///
/// Timings default to values small enough for tests to run quickly.
pub struct WorkflowFileBuilder {
    raw: RawWorkflowFile,
}

impl WorkflowFileBuilder {
    pub fn new() -> Self {
        let config = ConfigSection {
            polling_interval: HumanDuration::from_millis(5),
            locking_duration: HumanDuration::from_secs(1),
            lock_wait_timeout: Some(HumanDuration::from_millis(200)),
            advance_retry_delay: HumanDuration::from_millis(20),
            workers: 4,
            max_attempts: 1,
            retry_delay: HumanDuration::from_millis(10),
        };
        Self {
            raw: RawWorkflowFile {
                config,
                job: BTreeMap::new(),
            },
        }
    }

    pub fn with_job(mut self, name: &str, job: JobConfig) -> Self {
        self.raw.job.insert(name.to_string(), job);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.raw.config.workers = workers;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.raw.config.max_attempts = attempts;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.raw.config.retry_delay = HumanDuration(delay);
        self
    }

    pub fn raw(self) -> RawWorkflowFile {
        self.raw
    }

    pub fn build(self) -> WorkflowFile {
        WorkflowFile::try_from(self.raw).expect("Failed to build valid workflow from builder")
    }
}

impl Default for WorkflowFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `JobConfig`.
pub struct JobConfigBuilder {
    job: JobConfig,
}

impl JobConfigBuilder {
    pub fn new(class: &str) -> Self {
        Self {
            job: JobConfig {
                class: class.to_string(),
                cmd: None,
                queue: None,
                after: vec![],
                params: Value::Null,
            },
        }
    }

    /// Shell job running `cmd`.
    pub fn shell(cmd: &str) -> Self {
        Self::new("shell").cmd(cmd)
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.job.cmd = Some(cmd.to_string());
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.job.after.push(dep.to_string());
        self
    }

    pub fn queue(mut self, queue: &str) -> Self {
        self.job.queue = Some(queue.to_string());
        self
    }

    pub fn params(mut self, params: Value) -> Self {
        self.job.params = params;
        self
    }

    pub fn build(self) -> JobConfig {
        self.job
    }
}

/// Builder for a persisted `Job` record.
pub struct JobBuilder {
    job: Job,
}

impl JobBuilder {
    pub fn new(workflow_id: &str, name: &str) -> Self {
        Self {
            job: Job::new(workflow_id, name, "noop", DEFAULT_QUEUE),
        }
    }

    pub fn class(mut self, class: &str) -> Self {
        self.job.class_ref = class.to_string();
        self
    }

    pub fn queue(mut self, queue: &str) -> Self {
        self.job.queue = queue.to_string();
        self
    }

    pub fn incoming(mut self, names: &[&str]) -> Self {
        self.job.incoming = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn outgoing(mut self, names: &[&str]) -> Self {
        self.job.outgoing = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn state(mut self, state: JobState) -> Self {
        self.job.state = state;
        self
    }

    /// Mark the job succeeded with the given output.
    pub fn succeeded_with(mut self, output: Value) -> Self {
        self.job.state = JobState::Succeeded;
        self.job.output_payload = Some(output);
        self
    }

    pub fn build(self) -> Job {
        self.job
    }
}

/// Insert a DAG of `noop` jobs into `store`.
///
/// `edges` lists `(job, after)` pairs; `incoming` / `outgoing` are derived
/// with [`DagGraph`] so they are consistent, and every job starts `pending`.
pub fn seed_workflow(store: &MemoryStore, workflow_id: &str, edges: &[(&str, &[&str])]) {
    let graph = DagGraph::from_edges(edges.iter().map(|(name, deps)| {
        (
            name.to_string(),
            deps.iter().map(|d| d.to_string()).collect::<Vec<_>>(),
        )
    }));

    for name in graph.jobs() {
        let mut job = Job::new(workflow_id, name, "noop", DEFAULT_QUEUE);
        job.incoming = graph.dependencies_of(name).to_vec();
        job.outgoing = graph.dependents_of(name).to_vec();
        store.insert(job);
    }
}
