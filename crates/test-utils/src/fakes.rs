use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dagworker::errors::{Result, WorkflowError};
use dagworker::lock::{lock_timeout, LockLease, LockOptions, LockService, MemoryLockService};
use dagworker::queue::{ExecutionRequest, QueueRuntime};
use dagworker::types::BoxFuture;

/// One call made against a [`RecordingQueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueCall {
    Enqueue {
        queue: String,
        request: ExecutionRequest,
    },
    ScheduleAfter {
        delay: Duration,
        queue: String,
        request: ExecutionRequest,
    },
}

/// A fake queue runtime that:
/// - records every `enqueue` / `schedule_after` call
/// - never delivers anything (tests drive the coordinator by hand)
#[derive(Debug, Clone, Default)]
pub struct RecordingQueue {
    calls: Arc<Mutex<Vec<QueueCall>>>,
    fail_enqueue: Arc<AtomicBool>,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `enqueue` calls fail (they are still recorded).
    pub fn set_fail_enqueue(&self, fail: bool) {
        self.fail_enqueue.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<QueueCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Job names passed to `enqueue`, in call order.
    pub fn enqueued_jobs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                QueueCall::Enqueue { request, .. } => Some(request.job_id),
                QueueCall::ScheduleAfter { .. } => None,
            })
            .collect()
    }

    /// Number of `enqueue` calls for `job`.
    pub fn enqueue_count(&self, job: &str) -> usize {
        self.enqueued_jobs().iter().filter(|j| *j == job).count()
    }

    /// `(delay, queue, request)` of every `schedule_after` call.
    pub fn scheduled(&self) -> Vec<(Duration, String, ExecutionRequest)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                QueueCall::ScheduleAfter {
                    delay,
                    queue,
                    request,
                } => Some((delay, queue, request)),
                QueueCall::Enqueue { .. } => None,
            })
            .collect()
    }
}

impl QueueRuntime for RecordingQueue {
    fn enqueue<'a>(
        &'a self,
        queue: &'a str,
        request: ExecutionRequest,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(QueueCall::Enqueue {
                queue: queue.to_string(),
                request,
            });
            if self.fail_enqueue.load(Ordering::SeqCst) {
                return Err(WorkflowError::Queue("injected enqueue failure".to_string()));
            }
            Ok(())
        })
    }

    fn schedule_after<'a>(
        &'a self,
        delay: Duration,
        queue: &'a str,
        request: ExecutionRequest,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(QueueCall::ScheduleAfter {
                delay,
                queue: queue.to_string(),
                request,
            });
            Ok(())
        })
    }
}

/// Lock service that times out a configured number of acquisitions per key
/// before delegating to a real [`MemoryLockService`].
#[derive(Debug, Clone, Default)]
pub struct ContendedLock {
    inner: MemoryLockService,
    remaining_timeouts: Arc<Mutex<HashMap<String, usize>>>,
    attempts: Arc<Mutex<HashMap<String, usize>>>,
}

impl ContendedLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `times` acquisitions of `key` fail with a lock timeout.
    pub fn contend(&self, key: &str, times: usize) {
        self.remaining_timeouts
            .lock()
            .unwrap()
            .insert(key.to_string(), times);
    }

    /// Total acquisition attempts seen for `key`.
    pub fn attempts(&self, key: &str) -> usize {
        self.attempts.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.inner.is_held(key)
    }
}

impl LockService for ContendedLock {
    fn acquire<'a>(
        &'a self,
        key: &'a str,
        options: LockOptions,
    ) -> BoxFuture<'a, Result<LockLease>> {
        Box::pin(async move {
            *self
                .attempts
                .lock()
                .unwrap()
                .entry(key.to_string())
                .or_default() += 1;

            let contended = {
                let mut remaining = self.remaining_timeouts.lock().unwrap();
                match remaining.get_mut(key) {
                    Some(n) if *n > 0 => {
                        *n -= 1;
                        true
                    }
                    _ => false,
                }
            };

            if contended {
                return Err(lock_timeout(key, options.wait_timeout));
            }
            self.inner.acquire(key, options).await
        })
    }

    fn release(&self, lease: LockLease) -> BoxFuture<'_, Result<()>> {
        self.inner.release(lease)
    }
}
