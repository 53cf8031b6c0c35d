//! Macro editing
//!
//! Every stored asset is opened on its edit page and re-submitted with the
//! stored field values. Assets are split across tabs by the partitioner;
//! `editStartTime` / `editEndTime` bracket the run, even a failed one.

use chrono::Utc;
use tracing::{error, info, warn};

use crate::browser::Tab;
use crate::config::Timings;
use crate::context::WorkerContext;
use crate::control::ControlToken;
use crate::error::{AppError, AppResult, CommandError, StoreError};
use crate::infrastructure::{navigate_with_retry, wait_for_element};
use crate::models::{AssetRecord, ReportStamp};
use crate::orchestrator::tab_runner::{drive_units, TabOrchestrator, UnitOutcome};
use crate::services::{
    finalize, BatchOutcome, BatchStatus, ProgressEmitter, ProgressFields, ProgressType,
    SharedProgress,
};
use crate::site;
use crate::workflow::{FormFiller, FormOutcome};

/// Edit every asset of `report_id`; collected items are the edited macro ids.
pub async fn edit_macros(
    ctx: &WorkerContext,
    report_id: &str,
    tabs: usize,
    token: &ControlToken,
) -> AppResult<BatchOutcome<String>> {
    let started_at = Utc::now();
    let progress = ProgressEmitter::new(ctx.output.clone(), ProgressType::MacroEdit, token.batch_id().as_str());
    progress.emit("FETCHING_RECORD", "Fetching report data", ProgressFields::default());

    let record = ctx
        .store
        .find_report(report_id)
        .await?
        .ok_or_else(|| StoreError::ReportNotFound(report_id.to_string()))?;

    if record.asset_data.is_empty() {
        progress.emit("NO_ASSETS", "No assets found in record", ProgressFields::default());
        return Ok(BatchOutcome::empty(BatchStatus::Success, started_at));
    }

    let missing = record.assets_missing_ids();
    if !missing.is_empty() {
        let message = format!("Assets missing macro IDs at indices: {:?}", missing);
        progress.emit("MISSING_IDS", &message, ProgressFields::error(&message));
        return Err(CommandError::Precondition(message).into());
    }

    ctx.store.stamp(report_id, ReportStamp::EditStart, Utc::now()).await?;
    let result = edit_assets(ctx, report_id, &record.asset_data, tabs, token, &progress, started_at).await;
    if let Err(e) = ctx.store.stamp(report_id, ReportStamp::EditEnd, Utc::now()).await {
        warn!("cannot stamp edit end of report {}: {}", report_id, e);
    }

    match &result {
        Ok(outcome) => progress.emit(
            outcome.status.as_str(),
            format!(
                "Completed editing {}/{} macros ({} failed)",
                outcome.completed, outcome.total, outcome.failed
            ),
            ProgressFields {
                total: Some(outcome.total),
                current: Some(outcome.completed),
                percentage: Some(100.0),
                failed_records: Some(outcome.failed),
                ..Default::default()
            },
        ),
        Err(e) if e.is_stopped() => {}
        Err(e) => progress.emit(
            "FAILED",
            format!("Macro editing failed: {}", e),
            ProgressFields::error(e.to_string()),
        ),
    }
    result
}

async fn edit_assets(
    ctx: &WorkerContext,
    report_id: &str,
    assets: &[AssetRecord],
    tabs: usize,
    token: &ControlToken,
    progress: &ProgressEmitter,
    started_at: chrono::DateTime<Utc>,
) -> AppResult<BatchOutcome<String>> {
    let total = assets.len();
    let workers = tabs.min(total).max(1);
    let timings = &ctx.config.timings;
    let filler = FormFiller::new(&ctx.forms.edit, timings);
    let shared = SharedProgress::new(total);

    progress.emit(
        "STARTING",
        format!("Starting to edit {} macros using {} tabs", total, workers),
        ProgressFields::from_snapshot(shared.snapshot().await).with_tabs(workers),
    );

    let orchestrator = TabOrchestrator::new(ctx.browser.clone(), report_id);
    let results = orchestrator
        .run(total, workers, "about:blank", |slot| {
            let (filler, shared) = (&filler, &shared);
            async move {
                let tab = slot.tab.as_ref();
                let tab_ctx = &slot.ctx;
                drive_units(slot.worker_index, &slot.units, token, move |unit| async move {
                    let asset = &assets[unit - 1];
                    let macro_id = asset.id.trim().to_string();
                    info!("{} editing macro {}", tab_ctx, macro_id);

                    let outcome = match edit_one(tab, asset, filler, timings, token).await {
                        Ok(outcome) => outcome,
                        Err(AppError::Stopped(stop)) => return Err(AppError::Stopped(stop)),
                        Err(e) => FormOutcome::Failed(e.to_string()),
                    };

                    let snapshot = shared.record(outcome.is_saved()).await;
                    match outcome {
                        FormOutcome::Saved => {
                            progress.emit(
                                "PROCESSING",
                                format!("Edited macro {} ({}/{})", macro_id, snapshot.completed, total),
                                ProgressFields::from_snapshot(snapshot).with_macro(&macro_id),
                            );
                            Ok(UnitOutcome::Completed(vec![macro_id]))
                        }
                        FormOutcome::Failed(reason) => {
                            error!("{} editing macro {} failed: {}", tab_ctx, macro_id, reason);
                            progress.emit(
                                "ERROR",
                                format!("Failed to edit macro {}", macro_id),
                                ProgressFields::error(&reason).with_macro(&macro_id),
                            );
                            Ok(UnitOutcome::Failed(reason))
                        }
                    }
                })
                .await
            }
        })
        .await?;

    Ok(finalize(results, total, token, started_at))
}

async fn edit_one(
    tab: &dyn Tab,
    asset: &AssetRecord,
    filler: &FormFiller<'_>,
    timings: &Timings,
    token: &ControlToken,
) -> AppResult<FormOutcome> {
    navigate_with_retry(tab, &site::macro_edit_url(asset.id.trim()), timings, token).await?;
    let form = wait_for_element(
        tab,
        site::MACRO_EDIT_ANCHOR,
        timings.element_timeout(),
        timings.poll_interval(),
        token,
    )
    .await?;
    if form.is_none() {
        return Ok(FormOutcome::Failed("edit form did not load".to_string()));
    }
    Ok(filler.fill_and_submit(tab, &asset.fields, token).await?)
}
