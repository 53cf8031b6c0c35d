//! Macro status check
//!
//! ## Flow
//!
//! 1. Load the stored report (missing report fails fast)
//! 2. Half check: only ids stored as incomplete are re-checked; none means done
//! 3. A report showing the delete button is complete as a whole
//! 4. Otherwise every page is scanned with the status column, each state is
//!    persisted and the incomplete ids are collected
//!
//! The check also reports which assets a cleanup pass would remove, grouped
//! per sub-page according to the configured [`RetentionPolicy`].

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::context::WorkerContext;
use crate::control::ControlToken;
use crate::error::{AppError, AppResult, StoreError};
use crate::infrastructure::{navigate_with_retry, wait_for_element};
use crate::models::{ReportRecord, SubmitState};
use crate::orchestrator::tab_runner::{drive_units, TabOrchestrator, UnitOutcome};
use crate::services::{
    finalize, BatchOutcome, BatchStatus, ProgressEmitter, ProgressFields, ProgressType,
    SharedProgress,
};
use crate::site;
use crate::workflow::retention::{plan_retention, RetentionPlan, RetentionPolicy};
use crate::workflow::{count_outer_pages, ScanStatus, TableLayout, TableScanner};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckMode {
    Full,
    Half,
}

/// One status row read from the report table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRow {
    pub macro_id: u64,
    pub page_number: usize,
    pub sub_page: usize,
    pub incomplete: bool,
    /// `false` when a half check skipped the row
    pub checked: bool,
}

/// Cleanup decision for one sub-page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubPageCleanup {
    pub page_number: usize,
    pub sub_page: usize,
    #[serde(flatten)]
    pub plan: RetentionPlan,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCheck {
    pub status: BatchStatus,
    pub check_type: CheckMode,
    pub incomplete_ids: Vec<u64>,
    pub macro_count: usize,
    pub total_pages_processed: usize,
    pub tabs_used: usize,
    pub total_macros_processed: usize,
    pub failed_pages: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cleanup_plan: Vec<SubPageCleanup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusCheck {
    fn shortcut(mode: CheckMode, message: &str) -> Self {
        Self {
            status: BatchStatus::Success,
            check_type: mode,
            incomplete_ids: Vec::new(),
            macro_count: 0,
            total_pages_processed: 0,
            tabs_used: 0,
            total_macros_processed: 0,
            failed_pages: 0,
            cleanup_plan: Vec::new(),
            message: Some(message.to_string()),
        }
    }

    fn from_outcome(mode: CheckMode, outcome: BatchOutcome<StatusRow>, tabs_used: usize, policy: RetentionPolicy) -> Self {
        let incomplete_ids: Vec<u64> = outcome
            .collected
            .iter()
            .filter(|r| r.checked && r.incomplete)
            .map(|r| r.macro_id)
            .collect();
        let processed: HashSet<u64> = outcome.collected.iter().map(|r| r.macro_id).collect();

        Self {
            status: outcome.status,
            check_type: mode,
            macro_count: incomplete_ids.len(),
            incomplete_ids,
            total_pages_processed: outcome.total,
            tabs_used,
            total_macros_processed: processed.len(),
            failed_pages: outcome.failed,
            cleanup_plan: cleanup_plan(&outcome.collected, policy),
            message: if outcome.errors.is_empty() {
                None
            } else {
                Some(outcome.errors.join("; "))
            },
        }
    }
}

/// Retention plan of every sub-page that has something to delete.
pub fn cleanup_plan(rows: &[StatusRow], policy: RetentionPolicy) -> Vec<SubPageCleanup> {
    let mut groups: BTreeMap<(usize, usize), Vec<(u64, bool)>> = BTreeMap::new();
    for row in rows {
        groups
            .entry((row.page_number, row.sub_page))
            .or_default()
            .push((row.macro_id, row.incomplete));
    }
    groups
        .into_iter()
        .map(|((page_number, sub_page), assets)| SubPageCleanup {
            page_number,
            sub_page,
            plan: plan_retention(&assets, policy),
        })
        .filter(|c| !c.plan.delete.is_empty())
        .collect()
}

/// Ids a half check re-verifies
fn stored_incomplete(record: &ReportRecord) -> HashSet<u64> {
    record.incomplete_ids().into_iter().collect()
}

pub async fn check_macro_status(
    ctx: &WorkerContext,
    report_id: &str,
    tabs: usize,
    mode: CheckMode,
    token: &ControlToken,
) -> AppResult<StatusCheck> {
    let started_at = Utc::now();
    let timings = &ctx.config.timings;
    let progress = ProgressEmitter::new(
        ctx.output.clone(),
        ProgressType::MacroStatus,
        token.batch_id().as_str(),
    );

    let record = ctx
        .store
        .find_report(report_id)
        .await?
        .ok_or_else(|| StoreError::ReportNotFound(report_id.to_string()))?;

    let only: Option<HashSet<u64>> = match mode {
        CheckMode::Full => None,
        CheckMode::Half => {
            let ids = stored_incomplete(&record);
            info!("[HALF CHECK] {} incomplete macros stored for report {}", ids.len(), report_id);
            if ids.is_empty() {
                return Ok(StatusCheck::shortcut(mode, "No incomplete macros found in database"));
            }
            Some(ids)
        }
    };

    progress.emit(
        "STARTED",
        format!("Checking macro status of report {}", report_id),
        ProgressFields::default().with_tabs(tabs),
    );

    let primary = ctx.browser.primary_tab().await?;
    navigate_with_retry(primary.as_ref(), &site::report_url(report_id), timings, token).await?;
    token.sleep(timings.poll_interval()).await?;

    let delete_button = wait_for_element(
        primary.as_ref(),
        site::DELETE_REPORT_BUTTON,
        timings.next_button_timeout(),
        timings.poll_interval(),
        token,
    )
    .await?;
    if delete_button.is_some() {
        info!("delete button present on report {}, every macro is complete", report_id);
        let result = ctx.store.mark_all_complete(report_id).await?;
        debug!("marked complete: {:?}", result);
        progress.emit("COMPLETED", "All macros complete", ProgressFields::default());
        return Ok(StatusCheck::shortcut(mode, "All macros complete"));
    }

    let total_pages = count_outer_pages(primary.as_ref(), timings, token).await?;
    let workers = tabs.min(total_pages).max(1);
    let layout = TableLayout::macros_with_status();
    let shared = SharedProgress::new(total_pages);
    let only = only.as_ref();

    let orchestrator = TabOrchestrator::new(ctx.browser.clone(), report_id);
    let results = orchestrator
        .run(total_pages, workers, "about:blank", |slot| {
            let (layout, shared, progress) = (&layout, &shared, &progress);
            async move {
                let scanner = TableScanner::new(slot.tab.as_ref(), token, timings, layout, &slot.ctx);
                let (scanner, tab_ctx) = (&scanner, &slot.ctx);
                drive_units(slot.worker_index, &slot.units, token, move |page| async move {
                    let scan = scanner
                        .scan_page(&site::report_page_url(report_id, page), page)
                        .await?;
                    let aborted = scan.is_aborted();

                    let mut rows = Vec::with_capacity(scan.rows.len());
                    let mut incomplete_here = 0;
                    for row in &scan.rows {
                        let Some(status_text) = row.fields.get("status") else {
                            debug!("{} macro {} has no status cell", tab_ctx, row.macro_id);
                            continue;
                        };
                        let incomplete = site::is_incomplete(status_text);
                        let checked = only.map_or(true, |ids| ids.contains(&row.macro_id));
                        if checked {
                            let state = if incomplete {
                                SubmitState::Incomplete
                            } else {
                                SubmitState::Complete
                            };
                            match ctx.store.update_asset_state(report_id, row.macro_id, state).await {
                                Ok(r) => debug!(
                                    "{} macro {} page {} state={:?} matched={} modified={}",
                                    tab_ctx, row.macro_id, page, state, r.matched, r.modified
                                ),
                                Err(e) => warn!("{} cannot store state of macro {}: {}", tab_ctx, row.macro_id, e),
                            }
                            if incomplete {
                                incomplete_here += 1;
                            }
                        }
                        rows.push(StatusRow {
                            macro_id: row.macro_id,
                            page_number: row.page_number,
                            sub_page: row.sub_page,
                            incomplete,
                            checked,
                        });
                    }

                    info!(
                        "{} page {}: processed {} macros, {} incomplete",
                        tab_ctx,
                        page,
                        rows.len(),
                        incomplete_here
                    );
                    let snapshot = shared.record(!aborted).await;
                    progress.emit(
                        "PROCESSING",
                        format!("Page {} checked", page),
                        ProgressFields::from_snapshot(snapshot).with_page(page),
                    );

                    Ok::<_, AppError>(match scan.status {
                        ScanStatus::Aborted(reason) => UnitOutcome::Failed(reason),
                        _ => UnitOutcome::Completed(rows),
                    })
                })
                .await
            }
        })
        .await?;

    let outcome = finalize(results, total_pages, token, started_at);
    let check = StatusCheck::from_outcome(mode, outcome, workers, ctx.config.retention_policy);
    log_check(report_id, &check);
    progress.emit(
        check.status.as_str(),
        format!("{} incomplete macros", check.macro_count),
        ProgressFields::total(total_pages).with_tabs(workers),
    );
    Ok(check)
}

// ========== log helpers ==========

fn log_check(report_id: &str, check: &StatusCheck) {
    info!("{}", "─".repeat(60));
    info!(
        "📊 {:?} check of report {}: {} macros, {} incomplete, {} failed pages - {}",
        check.check_type,
        report_id,
        check.total_macros_processed,
        check.macro_count,
        check.failed_pages,
        check.status.as_str()
    );
    if !check.cleanup_plan.is_empty() {
        info!("🧹 {} sub-pages have assets to clean up", check.cleanup_plan.len());
    }
    info!("{}", "─".repeat(60));
}
