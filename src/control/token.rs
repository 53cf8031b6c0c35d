//! Cooperative pause/stop token shared by every unit of work of one task

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::TaskStopped;

/// Batch identifier normalised to a string.
///
/// Commands may carry `42` or `"42"`; both map to the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(String);

impl BatchId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    /// Normalise a JSON id. `null`, empty strings and containers yield `None`.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::String(s) if !s.trim().is_empty() => Some(Self::new(s)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self(i.to_string()))
                } else if let Some(u) = n.as_u64() {
                    Some(Self(u.to_string()))
                } else {
                    // 42.0 and 42 must be the same batch
                    n.as_f64().map(|f| {
                        if f.fract() == 0.0 {
                            Self(format!("{}", f as i64))
                        } else {
                            Self(f.to_string())
                        }
                    })
                }
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for BatchId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for BatchId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Control token
///
/// `stopped` is backed by a [`CancellationToken`] so that pause polling and
/// cooperative delays wake as soon as the task is stopped. Once stopped the
/// token never goes back; `paused` may toggle freely before that.
#[derive(Debug)]
pub struct ControlToken {
    batch_id: BatchId,
    paused: AtomicBool,
    stopped: CancellationToken,
    poll_interval: Duration,
}

impl ControlToken {
    pub fn new(batch_id: BatchId, poll_interval: Duration) -> Self {
        Self {
            batch_id,
            paused: AtomicBool::new(false),
            stopped: CancellationToken::new(),
            poll_interval,
        }
    }

    pub fn batch_id(&self) -> &BatchId {
        &self.batch_id
    }

    /// Returns `false` when the token is already stopped.
    pub fn pause(&self) -> bool {
        if self.is_stopped() {
            return false;
        }
        self.paused.store(true, Ordering::SeqCst);
        true
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.stopped.cancel();
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst) && !self.is_stopped()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.is_cancelled()
    }

    /// Suspend point: fails on stop, blocks while paused.
    pub async fn check(&self) -> Result<(), TaskStopped> {
        if self.is_stopped() {
            return Err(TaskStopped);
        }
        if self.paused.load(Ordering::SeqCst) {
            debug!("[BATCH {}] paused, waiting for resume", self.batch_id);
        }
        while self.paused.load(Ordering::SeqCst) {
            tokio::select! {
                _ = self.stopped.cancelled() => return Err(TaskStopped),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        if self.is_stopped() {
            return Err(TaskStopped);
        }
        Ok(())
    }

    /// Delay that ends early with `TaskStopped` when the token is stopped.
    pub async fn sleep(&self, duration: Duration) -> Result<(), TaskStopped> {
        tokio::select! {
            _ = self.stopped.cancelled() => Err(TaskStopped),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// Resolves once the token is stopped.
    pub async fn stopped(&self) {
        self.stopped.cancelled().await
    }
}
