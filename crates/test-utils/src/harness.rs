use std::sync::Arc;
use std::time::Duration;

use dagworker::config::WorkerConfig;
use dagworker::engine::Coordinator;
use dagworker::exec::BehaviorRegistry;
use dagworker::job::{Job, JobState};
use dagworker::store::MemoryStore;

use crate::fakes::{ContendedLock, RecordingQueue};

/// Coordinator wired to in-memory collaborators the test can inspect.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub locks: Arc<ContendedLock>,
    pub queue: Arc<RecordingQueue>,
    pub registry: BehaviorRegistry,
    pub config: WorkerConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            locks: Arc::new(ContendedLock::new()),
            queue: Arc::new(RecordingQueue::new()),
            registry: BehaviorRegistry::with_builtins(),
            config: fast_config(),
        }
    }

    /// A coordinator using the harness' collaborators and a snapshot of its
    /// registry.
    pub fn coordinator(&self) -> Coordinator {
        Coordinator::new(
            self.store.clone(),
            self.locks.clone(),
            self.queue.clone(),
            self.registry.clone(),
            self.config,
        )
    }

    pub fn job(&self, workflow_id: &str, name: &str) -> Job {
        self.store
            .get(workflow_id, name)
            .unwrap_or_else(|| panic!("job {workflow_id}/{name} not in store"))
    }

    pub fn state_of(&self, workflow_id: &str, name: &str) -> JobState {
        self.job(workflow_id, name).state
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Engine timings small enough for tests.
pub fn fast_config() -> WorkerConfig {
    WorkerConfig {
        polling_interval: Duration::from_millis(5),
        locking_duration: Duration::from_secs(1),
        lock_wait_timeout: Duration::from_millis(100),
        advance_retry_delay: Duration::from_millis(20),
    }
}
