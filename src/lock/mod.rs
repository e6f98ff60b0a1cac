// src/lock/mod.rs

//! Lease-based distributed lock abstraction.
//!
//! A lock is identified by a string key. Acquisition waits up to
//! `wait_timeout`, re-trying every `poll_interval`, and yields a
//! [`LockLease`] that is valid for at most `lease`. If the wait window
//! elapses first, acquisition fails with [`WorkflowError::LockTimeout`].
//!
//! [`with_lock`] is the scoped form used by the engine: it runs a critical
//! section under the lock and releases it on every exit path. If the holder
//! dies without releasing, the lease simply expires.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::{Result, WorkflowError};
use crate::types::BoxFuture;

pub mod memory;

pub use memory::MemoryLockService;

/// Timing parameters for one acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// How long to keep trying before giving up.
    pub wait_timeout: Duration,
    /// Sleep between attempts.
    pub poll_interval: Duration,
    /// Maximum hold duration; after this the lock may be taken over.
    pub lease: Duration,
}

/// Proof of holding a lock. Hand it back to [`LockService::release`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    pub key: String,
    pub token: u64,
}

/// Distributed mutual exclusion keyed by string.
pub trait LockService: Send + Sync + Debug {
    /// Acquire `key`, or fail with [`WorkflowError::LockTimeout`] once
    /// `options.wait_timeout` has elapsed.
    fn acquire<'a>(&'a self, key: &'a str, options: LockOptions)
    -> BoxFuture<'a, Result<LockLease>>;

    /// Release a lease. Releasing a lease that already expired (and may have
    /// been taken over by someone else) must not affect the new holder.
    fn release(&self, lease: LockLease) -> BoxFuture<'_, Result<()>>;
}

/// Lock key guarding the "enqueue this downstream job" decision.
///
/// The key is per *downstream* job: the race being prevented is several
/// parents of the same child enqueuing it concurrently.
pub fn enqueue_lock_key(workflow_id: &str, job_name: &str) -> String {
    format!("dagworker_enqueue_outgoing_jobs_{workflow_id}-{job_name}")
}

/// Run `critical` while holding `key`.
///
/// The lease is released whether the critical section succeeds or fails.
/// An error from the critical section wins over an error from releasing.
pub async fn with_lock<L, T, F, Fut>(
    locks: &L,
    key: &str,
    options: LockOptions,
    critical: F,
) -> Result<T>
where
    L: LockService + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let lease = locks.acquire(key, options).await?;
    debug!(key, token = lease.token, "lock acquired");

    let result = critical().await;
    let released = locks.release(lease).await;

    match (result, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(release_err)) => {
            warn!(key, error = %release_err, "failed to release lock after error");
            Err(err)
        }
        (Ok(_), Err(release_err)) => Err(release_err),
    }
}

/// Convenience constructor for the timeout error used by lock services.
pub fn lock_timeout(key: &str, waited: Duration) -> WorkflowError {
    WorkflowError::LockTimeout {
        key: key.to_string(),
        waited,
    }
}
