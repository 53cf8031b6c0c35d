//! Parallel tab orchestrator
//!
//! ## Responsibilities
//!
//! 1. **Partition**: split `1..=total_units` across the workers
//! 2. **Tabs**: worker 0 reuses the primary tab, every other non-empty bucket
//!    gets a freshly opened tab; empty buckets get neither tab nor worker
//! 3. **Run**: every worker runs concurrently on the calling task
//!    (`join_all`); a failing worker never cancels its siblings
//! 4. **Teardown**: tabs opened here are closed once all workers are done
//!
//! Workers suspend only at navigation, polling and the control token, so
//! the shared counters they touch are guarded by short critical sections.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::browser::{BrowserDriver, Tab};
use crate::control::ControlToken;
use crate::error::{AppError, AppResult};
use crate::orchestrator::partition::partition;
use crate::services::{WorkerEnd, WorkerResult};
use crate::workflow::{ScanOutcome, ScanStatus, ScannedRow, TabCtx};

/// What one worker receives
pub struct WorkerSlot {
    pub worker_index: usize,
    /// 1-based units in processing order
    pub units: Vec<usize>,
    pub tab: Arc<dyn Tab>,
    pub ctx: TabCtx,
}

/// Result of a single unit of work
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome<T> {
    Completed(Vec<T>),
    Failed(String),
}

impl From<ScanOutcome> for UnitOutcome<ScannedRow> {
    /// An aborted page is a failed unit; a page without rows still completes.
    fn from(scan: ScanOutcome) -> Self {
        match scan.status {
            ScanStatus::Aborted(reason) => UnitOutcome::Failed(reason),
            ScanStatus::Complete | ScanStatus::NoRows => UnitOutcome::Completed(scan.rows),
        }
    }
}

pub struct TabOrchestrator {
    browser: Arc<dyn BrowserDriver>,
    report_id: String,
}

impl TabOrchestrator {
    pub fn new(browser: Arc<dyn BrowserDriver>, report_id: impl Into<String>) -> Self {
        Self {
            browser,
            report_id: report_id.into(),
        }
    }

    /// Run `processor` once per non-empty bucket of `partition(total_units, worker_count)`.
    ///
    /// Fails only when the primary tab is unavailable. A secondary tab that
    /// cannot be opened turns its whole bucket into failed units.
    pub async fn run<T, F, Fut>(
        &self,
        total_units: usize,
        worker_count: usize,
        tab_url: &str,
        processor: F,
    ) -> AppResult<Vec<WorkerResult<T>>>
    where
        F: Fn(WorkerSlot) -> Fut,
        Fut: Future<Output = WorkerResult<T>>,
    {
        let assignments = partition(total_units, worker_count).assignments();
        log_distribution(&self.report_id, total_units, &assignments);
        if assignments.is_empty() {
            return Ok(Vec::new());
        }

        let primary = self.browser.primary_tab().await?;
        let mut opened: Vec<Arc<dyn Tab>> = Vec::new();
        let mut workers = Vec::with_capacity(assignments.len());
        let mut results = Vec::new();

        for (worker_index, units) in assignments {
            let tab = if worker_index == 0 {
                primary.clone()
            } else {
                match self.browser.open_tab(tab_url).await {
                    Ok(tab) => {
                        opened.push(tab.clone());
                        tab
                    }
                    Err(e) => {
                        error!("[TAB-{}] ❌ cannot open tab: {}", worker_index, e);
                        results.push(WorkerResult::with_counts(worker_index, 0, units.len()));
                        continue;
                    }
                }
            };
            let slot = WorkerSlot {
                worker_index,
                units,
                tab,
                ctx: TabCtx::new(self.report_id.clone(), worker_index),
            };
            workers.push(processor(slot));
        }

        results.extend(join_all(workers).await);
        self.close_tabs(opened).await;
        Ok(results)
    }

    async fn close_tabs(&self, tabs: Vec<Arc<dyn Tab>>) {
        let count = tabs.len();
        for tab in tabs {
            if let Err(e) = tab.close().await {
                warn!("failed to close tab: {}", e);
            }
        }
        if count > 0 {
            debug!("closed {} worker tabs", count);
        }
    }
}

/// Process `units` in order, stopping early on stop or a structural error.
///
/// Transport and parse errors count the unit as failed and move on.
pub async fn drive_units<T, F, Fut>(
    worker_index: usize,
    units: &[usize],
    token: &ControlToken,
    mut per_unit: F,
) -> WorkerResult<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = AppResult<UnitOutcome<T>>>,
{
    let mut result = WorkerResult::new(worker_index);
    for &unit in units {
        if token.check().await.is_err() {
            result.end = WorkerEnd::Stopped;
            break;
        }
        match per_unit(unit).await {
            Ok(UnitOutcome::Completed(items)) => {
                result.completed += 1;
                result.collected.extend(items);
            }
            Ok(UnitOutcome::Failed(reason)) => {
                warn!("[TAB-{}] unit {} failed: {}", worker_index, unit, reason);
                result.failed += 1;
            }
            Err(AppError::Stopped(_)) => {
                result.end = WorkerEnd::Stopped;
                break;
            }
            Err(e) if e.is_structural() => {
                error!("[TAB-{}] ❌ giving up: {}", worker_index, e);
                result.end = WorkerEnd::Failed(e.to_string());
                break;
            }
            Err(e) => {
                warn!("[TAB-{}] unit {} failed: {}", worker_index, unit, e);
                result.failed += 1;
            }
        }
    }
    log_worker_done(&result);
    result
}

// ========== log helpers ==========

fn log_distribution(report_id: &str, total: usize, assignments: &[(usize, Vec<usize>)]) {
    info!("{}", "=".repeat(60));
    info!(
        "📦 report {}: {} units over {} tabs",
        report_id,
        total,
        assignments.len()
    );
    for (worker, units) in assignments {
        if let (Some(first), Some(last)) = (units.first(), units.last()) {
            info!("   [TAB-{}] units {}-{} ({})", worker, first, last, units.len());
        }
    }
    info!("{}", "=".repeat(60));
}

fn log_worker_done<T>(result: &WorkerResult<T>) {
    match &result.end {
        WorkerEnd::Finished => info!(
            "[TAB-{}] ✓ done: {} completed, {} failed",
            result.worker_index, result.completed, result.failed
        ),
        WorkerEnd::Stopped => info!(
            "[TAB-{}] ⏹ stopped after {} units",
            result.worker_index,
            result.completed + result.failed
        ),
        WorkerEnd::Failed(e) => error!("[TAB-{}] ❌ failed: {}", result.worker_index, e),
    }
}
