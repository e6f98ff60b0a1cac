// src/queue/memory.rs

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use super::{Delivery, ExecutionRequest, QueueRuntime};
use crate::errors::{Result, WorkflowError};
use crate::types::BoxFuture;

/// In-process queue runtime.
///
/// Every accepted request counts as *outstanding* until a worker acknowledges
/// it with [`MemoryQueue::ack`]; delayed requests count from the moment they
/// are scheduled. [`MemoryQueue::idle`] resolves once nothing is outstanding,
/// which is how the worker runtime knows a workflow can make no further
/// progress.
///
/// The channel is unbounded: workers enqueue successors while the runtime
/// loop may itself be waiting for a free worker slot.
#[derive(Debug, Clone)]
pub struct MemoryQueue {
    tx: mpsc::UnboundedSender<Delivery>,
    outstanding: watch::Sender<usize>,
}

impl MemoryQueue {
    /// Create a queue and the receiving end the worker runtime consumes.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Delivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (outstanding, _) = watch::channel(0usize);
        (Self { tx, outstanding }, rx)
    }

    /// Number of requests accepted but not yet acknowledged.
    pub fn outstanding(&self) -> usize {
        *self.outstanding.borrow()
    }

    /// Mark one delivery as fully handled.
    pub fn ack(&self) {
        self.outstanding.send_modify(|n| *n = n.saturating_sub(1));
    }

    /// Resolves once no request is outstanding.
    pub async fn idle(&self) {
        let mut rx = self.outstanding.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Schedule another attempt of `delivery` after `delay`.
    ///
    /// This is the queue runtime's own redelivery policy, applied when a job
    /// attempt returns an error.
    pub fn redeliver(&self, delivery: Delivery, delay: Duration) -> Result<()> {
        let next = Delivery {
            attempt: delivery.attempt + 1,
            ..delivery
        };
        self.push_later(next, delay)
    }

    fn push_now(&self, delivery: Delivery) -> Result<()> {
        self.outstanding.send_modify(|n| *n += 1);
        if let Err(err) = self.tx.send(delivery) {
            self.ack();
            return Err(WorkflowError::Queue(format!(
                "worker channel closed; dropped request for job '{}'",
                err.0.request.job_id
            )));
        }
        Ok(())
    }

    fn push_later(&self, delivery: Delivery, delay: Duration) -> Result<()> {
        self.outstanding.send_modify(|n| *n += 1);
        let this = self.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!(
                queue = %delivery.queue,
                workflow = %delivery.request.workflow_id,
                job = %delivery.request.job_id,
                attempt = delivery.attempt,
                "delivering scheduled request"
            );
            if this.tx.send(delivery).is_err() {
                warn!("worker channel closed before scheduled request was delivered");
                this.ack();
            }
        });

        Ok(())
    }
}

impl QueueRuntime for MemoryQueue {
    fn enqueue<'a>(
        &'a self,
        queue: &'a str,
        request: ExecutionRequest,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            debug!(
                queue,
                workflow = %request.workflow_id,
                job = %request.job_id,
                "enqueue"
            );
            self.push_now(Delivery {
                queue: queue.to_string(),
                request,
                attempt: 1,
            })
        })
    }

    fn schedule_after<'a>(
        &'a self,
        delay: Duration,
        queue: &'a str,
        request: ExecutionRequest,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            debug!(
                queue,
                workflow = %request.workflow_id,
                job = %request.job_id,
                ?delay,
                "schedule_after"
            );
            self.push_later(
                Delivery {
                    queue: queue.to_string(),
                    request,
                    attempt: 1,
                },
                delay,
            )
        })
    }
}
