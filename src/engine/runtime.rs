// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};

use crate::config::RuntimeOptions;
use crate::errors::{Result, WorkflowError};
use crate::queue::{Delivery, MemoryQueue};

use super::coordinator::Coordinator;

/// Worker pool draining a [`MemoryQueue`].
///
/// Each delivery is handed to [`Coordinator::perform`] on its own Tokio task,
/// with at most `options.workers` running at once. Failed attempts are
/// redelivered after `options.retry_delay` until `options.max_attempts` is
/// reached; that redelivery policy belongs to the queue runtime, not to the
/// coordinator. The loop exits once the queue has nothing outstanding.
pub struct Runtime {
    coordinator: Arc<Coordinator>,
    queue: MemoryQueue,
    deliveries: mpsc::UnboundedReceiver<Delivery>,
    options: RuntimeOptions,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("options", &self.options)
            .field("outstanding", &self.queue.outstanding())
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(
        coordinator: Arc<Coordinator>,
        queue: MemoryQueue,
        deliveries: mpsc::UnboundedReceiver<Delivery>,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            coordinator,
            queue,
            deliveries,
            options,
        }
    }

    /// Main loop.
    pub async fn run(mut self) -> Result<()> {
        info!(workers = self.options.workers, "worker runtime started");
        let slots = Arc::new(Semaphore::new(self.options.workers.max(1)));

        loop {
            let delivery = tokio::select! {
                biased;
                received = self.deliveries.recv() => match received {
                    Some(d) => d,
                    None => {
                        info!("delivery channel closed; exiting");
                        break;
                    }
                },
                _ = self.queue.idle() => {
                    info!("no outstanding deliveries; exiting");
                    break;
                }
            };

            debug!(
                queue = %delivery.queue,
                workflow = %delivery.request.workflow_id,
                job = %delivery.request.job_id,
                attempt = delivery.attempt,
                "runtime received delivery"
            );

            let permit = Arc::clone(&slots)
                .acquire_owned()
                .await
                .map_err(|e| WorkflowError::Other(e.into()))?;

            let coordinator = Arc::clone(&self.coordinator);
            let queue = self.queue.clone();
            let options = self.options;

            tokio::spawn(async move {
                let _permit = permit;
                let _ack = AckOnDrop(queue.clone());
                handle_delivery(&coordinator, &queue, options, delivery).await;
            });
        }

        info!("runtime exiting");
        Ok(())
    }
}

/// Acknowledges a delivery even if the job's task panics.
struct AckOnDrop(MemoryQueue);

impl Drop for AckOnDrop {
    fn drop(&mut self) {
        self.0.ack();
    }
}

async fn handle_delivery(
    coordinator: &Coordinator,
    queue: &MemoryQueue,
    options: RuntimeOptions,
    delivery: Delivery,
) {
    let workflow_id = delivery.request.workflow_id.clone();
    let job_id = delivery.request.job_id.clone();

    let err = match coordinator.perform(&workflow_id, &job_id).await {
        Ok(outcome) => {
            debug!(workflow = %workflow_id, job = %job_id, ?outcome, "delivery handled");
            return;
        }
        Err(err) => err,
    };

    // These fail the same way on every attempt.
    let retryable = !matches!(
        err,
        WorkflowError::JobNotFound { .. }
            | WorkflowError::InvalidTransition { .. }
            | WorkflowError::MissingDependency { .. }
            | WorkflowError::UnknownClass(_)
    );

    if retryable && delivery.attempt < options.max_attempts {
        warn!(
            workflow = %workflow_id,
            job = %job_id,
            attempt = delivery.attempt,
            max_attempts = options.max_attempts,
            retry_in = ?options.retry_delay,
            error = %err,
            "delivery failed; scheduling redelivery"
        );
        if let Err(e) = queue.redeliver(delivery, options.retry_delay) {
            error!(workflow = %workflow_id, job = %job_id, error = %e, "redelivery failed");
        }
    } else {
        error!(
            workflow = %workflow_id,
            job = %job_id,
            attempt = delivery.attempt,
            error = %err,
            "delivery failed; giving up"
        );
    }
}
