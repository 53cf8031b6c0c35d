//! Macro id collection
//!
//! Reads the report's outer pagination, scans every page across the tabs
//! and stores one incomplete asset per macro id found.

use chrono::Utc;
use tracing::{info, warn};

use crate::context::WorkerContext;
use crate::control::ControlToken;
use crate::error::{AppError, AppResult};
use crate::infrastructure::navigate_with_retry;
use crate::models::{MacroLocation, ReportRecord};
use crate::orchestrator::tab_runner::{drive_units, TabOrchestrator, UnitOutcome};
use crate::services::{
    finalize, BatchOutcome, BatchStatus, ProgressEmitter, ProgressFields, ProgressType,
    SharedProgress,
};
use crate::site;
use crate::workflow::{count_outer_pages, ScannedRow, TableLayout, TableScanner};

/// Open the report on the primary tab and read how many outer pages it has.
pub(crate) async fn open_report(ctx: &WorkerContext, report_id: &str, token: &ControlToken) -> AppResult<usize> {
    let timings = &ctx.config.timings;
    let primary = ctx.browser.primary_tab().await?;
    navigate_with_retry(primary.as_ref(), &site::report_url(report_id), timings, token).await?;
    token.sleep(timings.settle_delay()).await?;
    let pages = count_outer_pages(primary.as_ref(), timings, token).await?;
    info!("📄 report {}: {} pages to scan", report_id, pages);
    Ok(pages)
}

/// Scan every page of the report and persist the ids found.
///
/// The record is written only when the scan was not stopped or failed, so
/// a partial stop never replaces an earlier complete record.
pub async fn collect_macro_ids(
    ctx: &WorkerContext,
    report_id: &str,
    tabs: usize,
    token: &ControlToken,
) -> AppResult<BatchOutcome<MacroLocation>> {
    let started_at = Utc::now();
    let progress = ProgressEmitter::new(ctx.output.clone(), ProgressType::MacroId, token.batch_id().as_str());
    progress.emit(
        "STARTED",
        format!("Collecting macro ids for report {}", report_id),
        ProgressFields::default().with_tabs(tabs),
    );

    let total_pages = open_report(ctx, report_id, token).await?;
    let workers = tabs.min(total_pages).max(1);
    let layout = TableLayout::macros();
    let timings = &ctx.config.timings;
    let shared = SharedProgress::new(total_pages);

    let orchestrator = TabOrchestrator::new(ctx.browser.clone(), report_id);
    let results = orchestrator
        .run(total_pages, workers, "about:blank", |slot| {
            let (layout, shared, progress) = (&layout, &shared, &progress);
            async move {
                let scanner = TableScanner::new(slot.tab.as_ref(), token, timings, layout, &slot.ctx);
                let scanner = &scanner;
                drive_units(slot.worker_index, &slot.units, token, move |page| async move {
                    let url = site::report_page_url(report_id, page);
                    let scan = scanner.scan_page(&url, page).await?;
                    let snapshot = shared.record(!scan.is_aborted()).await;
                    progress.emit(
                        "PROCESSING",
                        format!("Page {} scanned: {} macro ids", page, scan.rows.len()),
                        ProgressFields::from_snapshot(snapshot).with_page(page),
                    );
                    Ok::<_, AppError>(UnitOutcome::<ScannedRow>::from(scan))
                })
                .await
            }
        })
        .await?;

    let outcome = finalize(results, total_pages, token, started_at).map_collected(|row| MacroLocation {
        macro_id: row.macro_id,
        page_number: row.page_number,
    });
    log_collection(report_id, &outcome);

    match outcome.status {
        BatchStatus::Success | BatchStatus::Partial if !outcome.collected.is_empty() => {
            ctx.store
                .upsert_report(ReportRecord::from_locations(report_id, &outcome.collected))
                .await?;
            info!("💾 saved report {} with {} assets", report_id, outcome.collected.len());
        }
        BatchStatus::Success | BatchStatus::Partial => warn!("no macro ids found for report {}", report_id),
        _ => warn!("report {} not saved: scan {}", report_id, outcome.status.as_str()),
    }

    progress.emit(
        outcome.status.as_str(),
        format!("Collected {} macro ids", outcome.collected.len()),
        ProgressFields::total(total_pages).with_tabs(workers),
    );
    Ok(outcome)
}

// ========== log helpers ==========

fn log_collection(report_id: &str, outcome: &BatchOutcome<MacroLocation>) {
    info!("{}", "─".repeat(60));
    info!(
        "📊 report {}: {} macro ids from {}/{} pages ({} failed) - {}",
        report_id,
        outcome.collected.len(),
        outcome.completed,
        outcome.total,
        outcome.failed,
        outcome.status.as_str()
    );
    info!("{}", "─".repeat(60));
}
