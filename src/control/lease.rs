//! Exclusive use of the browser's primary tab
//!
//! Every long-running task drives the primary tab as its first worker, so
//! tasks take turns here. A task waiting for its turn stays registered and
//! can still be paused or stopped.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::control::token::ControlToken;
use crate::error::TaskStopped;

type Holder = Arc<Mutex<Option<Arc<ControlToken>>>>;

/// Single-holder lease on the primary tab; clones share the lease.
#[derive(Clone, Default)]
pub struct TabLease {
    gate: Arc<AsyncMutex<()>>,
    holder: Holder,
}

/// Held for the whole run of one task; releases the tab on drop.
pub struct LeaseGuard {
    holder: Holder,
    _permit: OwnedMutexGuard<()>,
}

fn slot(holder: &Holder) -> MutexGuard<'_, Option<Arc<ControlToken>>> {
    holder.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TabLease {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the tab. Gives up with `TaskStopped` once `token` is stopped.
    pub async fn acquire(&self, token: &Arc<ControlToken>) -> Result<LeaseGuard, TaskStopped> {
        if self.gate.try_lock().is_err() {
            debug!("[BATCH {}] waiting for the primary tab", token.batch_id());
        }
        let permit = tokio::select! {
            biased;
            _ = token.stopped() => return Err(TaskStopped),
            permit = Arc::clone(&self.gate).lock_owned() => permit,
        };
        *slot(&self.holder) = Some(Arc::clone(token));
        Ok(LeaseGuard {
            holder: Arc::clone(&self.holder),
            _permit: permit,
        })
    }

    /// Whether the task owning `token` is the one driving the tabs now.
    pub fn is_held_by(&self, token: &Arc<ControlToken>) -> bool {
        slot(&self.holder)
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, token))
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        *slot(&self.holder) = None;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::control::token::BatchId;

    fn token(batch: &str) -> Arc<ControlToken> {
        Arc::new(ControlToken::new(BatchId::new(batch), Duration::from_millis(1)))
    }

    #[tokio::test]
    async fn second_task_waits_for_the_first() {
        let lease = TabLease::new();
        let (a, b) = (token("a"), token("b"));

        let held = assert_ok!(lease.acquire(&a).await);
        assert!(lease.is_held_by(&a));

        let waiting = tokio::time::timeout(Duration::from_millis(20), lease.acquire(&b)).await;
        assert!(waiting.is_err());
        assert!(!lease.is_held_by(&b));

        drop(held);
        assert!(!lease.is_held_by(&a));
        let _held = assert_ok!(lease.acquire(&b).await);
        assert!(lease.is_held_by(&b));
    }

    #[tokio::test]
    async fn stop_releases_a_waiting_task() {
        let lease = TabLease::new();
        let (a, b) = (token("a"), token("b"));
        let _held = assert_ok!(lease.acquire(&a).await);

        let waiter = {
            let (lease, b) = (lease.clone(), Arc::clone(&b));
            tokio::spawn(async move { lease.acquire(&b).await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        b.stop();

        assert_err!(waiter.await.unwrap());
        assert!(lease.is_held_by(&a));
    }
}
