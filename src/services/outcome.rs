//! Result aggregation
//!
//! Each worker hands back a [`WorkerResult`]; [`finalize`] folds them into
//! one [`BatchOutcome`]. Status precedence:
//!
//! 1. `FAILED`  - some worker ended on a structural error
//! 2. `STOPPED` - the control token is stopped at finalize time
//! 3. `PARTIAL` - failures and not everything completed
//! 4. `SUCCESS`

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::control::ControlToken;

/// How a worker's loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEnd {
    Finished,
    Stopped,
    /// Unrecovered structural error
    Failed(String),
}

/// Per-worker tally
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerResult<T> {
    pub worker_index: usize,
    pub completed: usize,
    pub failed: usize,
    pub collected: Vec<T>,
    pub end: WorkerEnd,
}

impl<T> WorkerResult<T> {
    pub fn new(worker_index: usize) -> Self {
        Self {
            worker_index,
            completed: 0,
            failed: 0,
            collected: Vec::new(),
            end: WorkerEnd::Finished,
        }
    }

    pub fn with_counts(worker_index: usize, completed: usize, failed: usize) -> Self {
        Self {
            completed,
            failed,
            ..Self::new(worker_index)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Success,
    Partial,
    Failed,
    Stopped,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Success => "SUCCESS",
            BatchStatus::Partial => "PARTIAL",
            BatchStatus::Failed => "FAILED",
            BatchStatus::Stopped => "STOPPED",
        }
    }
}

/// One outcome per task
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome<T> {
    pub status: BatchStatus,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
    pub collected: Vec<T>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl<T> BatchOutcome<T> {
    pub fn map_collected<U>(self, f: impl FnMut(T) -> U) -> BatchOutcome<U> {
        BatchOutcome {
            status: self.status,
            completed: self.completed,
            failed: self.failed,
            total: self.total,
            collected: self.collected.into_iter().map(f).collect(),
            errors: self.errors,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }

    /// Outcome of a task that had nothing to do
    pub fn empty(status: BatchStatus, started_at: DateTime<Utc>) -> Self {
        Self {
            status,
            completed: 0,
            failed: 0,
            total: 0,
            collected: Vec::new(),
            errors: Vec::new(),
            started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Merge worker results.
///
/// Collected items are concatenated in worker-index order regardless of the
/// order workers finished in.
pub fn finalize<T>(
    mut results: Vec<WorkerResult<T>>,
    total: usize,
    token: &ControlToken,
    started_at: DateTime<Utc>,
) -> BatchOutcome<T> {
    results.sort_by_key(|r| r.worker_index);

    let mut completed = 0;
    let mut failed = 0;
    let mut collected = Vec::new();
    let mut errors = Vec::new();
    for result in results {
        completed += result.completed;
        failed += result.failed;
        collected.extend(result.collected);
        if let WorkerEnd::Failed(message) = result.end {
            errors.push(format!("worker {}: {}", result.worker_index, message));
        }
    }

    let status = if !errors.is_empty() {
        BatchStatus::Failed
    } else if token.is_stopped() {
        BatchStatus::Stopped
    } else if failed > 0 && completed < total {
        BatchStatus::Partial
    } else {
        BatchStatus::Success
    };

    BatchOutcome {
        status,
        completed,
        failed,
        total,
        collected,
        errors,
        started_at,
        finished_at: Utc::now(),
    }
}

/// Counters shared by the workers of one task
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

impl ProgressSnapshot {
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        let pct = self.completed as f64 / self.total as f64 * 100.0;
        (pct * 100.0).round() / 100.0
    }
}

/// Cross-worker progress counter, mutated under a lock
#[derive(Debug, Clone)]
pub struct SharedProgress {
    inner: Arc<Mutex<ProgressSnapshot>>,
}

impl SharedProgress {
    pub fn new(total: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ProgressSnapshot {
                total,
                ..Default::default()
            })),
        }
    }

    /// Count one finished unit; `ok == false` also counts it as failed.
    pub async fn record(&self, ok: bool) -> ProgressSnapshot {
        let mut snapshot = self.inner.lock().await;
        snapshot.completed += 1;
        if !ok {
            snapshot.failed += 1;
        }
        *snapshot
    }

    /// Count `n` units done at once.
    pub async fn add(&self, n: usize) -> ProgressSnapshot {
        let mut snapshot = self.inner.lock().await;
        snapshot.completed += n;
        *snapshot
    }

    pub async fn snapshot(&self) -> ProgressSnapshot {
        *self.inner.lock().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::control::BatchId;

    fn token() -> ControlToken {
        ControlToken::new(BatchId::from(1), Duration::from_millis(10))
    }

    #[test]
    fn partial_when_some_failed() {
        let outcome = finalize(
            vec![
                WorkerResult::<()>::with_counts(0, 5, 2),
                WorkerResult::with_counts(1, 3, 0),
            ],
            10,
            &token(),
            Utc::now(),
        );
        assert_eq!(outcome.status, BatchStatus::Partial);
        assert_eq!(outcome.completed, 8);
        assert_eq!(outcome.failed, 2);
    }

    #[test]
    fn success_when_nothing_failed() {
        let outcome = finalize(vec![WorkerResult::<()>::with_counts(0, 4, 0)], 4, &token(), Utc::now());
        assert_eq!(outcome.status, BatchStatus::Success);
    }

    #[test]
    fn stopped_token_wins_over_partial() {
        let token = token();
        token.stop();
        let outcome = finalize(vec![WorkerResult::<()>::with_counts(0, 1, 1)], 10, &token, Utc::now());
        assert_eq!(outcome.status, BatchStatus::Stopped);
    }

    #[test]
    fn structural_failure_wins_over_everything() {
        let token = token();
        token.stop();
        let mut broken = WorkerResult::<u32>::new(1);
        broken.end = WorkerEnd::Failed("tab vanished".into());
        let outcome = finalize(vec![broken], 3, &token, Utc::now());
        assert_eq!(outcome.status, BatchStatus::Failed);
        assert_eq!(outcome.errors, vec!["worker 1: tab vanished"]);
    }

    #[test]
    fn collected_follows_worker_order() {
        let mut late = WorkerResult::new(1);
        late.collected = vec![3, 4];
        let mut early = WorkerResult::new(0);
        early.collected = vec![1, 2];
        let outcome = finalize(vec![late, early], 4, &token(), Utc::now());
        assert_eq!(outcome.collected, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn shared_progress_counts() {
        let progress = SharedProgress::new(4);
        progress.record(true).await;
        let snap = progress.record(false).await;
        assert_eq!(snap.completed, 2);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.percentage(), 50.0);
    }
}
