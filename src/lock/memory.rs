// src/lock/memory.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

use super::{lock_timeout, LockLease, LockOptions, LockService};
use crate::errors::{Result, WorkflowError};
use crate::types::BoxFuture;

#[derive(Debug, Clone, Copy)]
struct Lease {
    token: u64,
    expires_at: Instant,
}

/// In-process lease lock.
///
/// Clones share the lease table, so it behaves like a single lock server for
/// every worker in the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryLockService {
    leases: Arc<Mutex<HashMap<String, Lease>>>,
    next_token: Arc<AtomicU64>,
}

impl MemoryLockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` is currently held by a lease that has not expired.
    pub fn is_held(&self, key: &str) -> bool {
        let Ok(leases) = self.leases.lock() else {
            return false;
        };
        leases
            .get(key)
            .is_some_and(|lease| lease.expires_at > Instant::now())
    }

    fn try_acquire(&self, key: &str, lease: std::time::Duration) -> Result<Option<LockLease>> {
        let mut leases = self
            .leases
            .lock()
            .map_err(|_| poisoned())?;
        let now = Instant::now();

        if let Some(existing) = leases.get(key) {
            if existing.expires_at > now {
                return Ok(None);
            }
            debug!(key, token = existing.token, "taking over expired lease");
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed) + 1;
        leases.insert(
            key.to_string(),
            Lease {
                token,
                expires_at: now + lease,
            },
        );

        Ok(Some(LockLease {
            key: key.to_string(),
            token,
        }))
    }
}

fn poisoned() -> WorkflowError {
    WorkflowError::Other(anyhow::anyhow!("memory lock table poisoned"))
}

impl LockService for MemoryLockService {
    fn acquire<'a>(
        &'a self,
        key: &'a str,
        options: LockOptions,
    ) -> BoxFuture<'a, Result<LockLease>> {
        Box::pin(async move {
            let started = Instant::now();
            let deadline = started + options.wait_timeout;

            loop {
                if let Some(lease) = self.try_acquire(key, options.lease)? {
                    return Ok(lease);
                }

                let now = Instant::now();
                if now >= deadline {
                    return Err(lock_timeout(key, now - started));
                }

                trace!(key, "lock busy; polling");
                sleep(options.poll_interval.min(deadline - now)).await;
            }
        })
    }

    fn release(&self, lease: LockLease) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut leases = self
                .leases
                .lock()
                .map_err(|_| poisoned())?;

            match leases.get(&lease.key) {
                Some(current) if current.token == lease.token => {
                    leases.remove(&lease.key);
                }
                _ => {
                    debug!(
                        key = %lease.key,
                        token = lease.token,
                        "lease already expired or taken over; nothing to release"
                    );
                }
            }
            Ok(())
        })
    }
}
