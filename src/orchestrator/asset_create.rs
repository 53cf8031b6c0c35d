//! Asset creation
//!
//! `macro_count` assets are created through the report's asset form, which
//! accepts up to `batch_size` macros per submission. One tab suffices when
//! everything fits in one submission; otherwise up to `tabs` tabs share the
//! work with balanced sizes, each submitting its share in chunks and
//! reloading the form between chunks.
//!
//! A failed submission ends that tab's share; the other tabs carry on.

use chrono::Utc;
use serde_json::{Map, Value as JsonValue};
use tracing::{error, info, warn};

use crate::context::WorkerContext;
use crate::control::ControlToken;
use crate::error::{AppResult, BrowserError};
use crate::infrastructure::{navigate_with_retry, wait_for_ready};
use crate::orchestrator::partition::tab_batch_sizes;
use crate::orchestrator::tab_runner::{TabOrchestrator, WorkerSlot};
use crate::services::{
    finalize, BatchOutcome, ProgressEmitter, ProgressFields, ProgressType, SharedProgress,
    WorkerEnd, WorkerResult,
};
use crate::site;
use crate::workflow::{FormFiller, FormOutcome};

/// Readiness polls per tab before filling anyway
const READY_ATTEMPTS: usize = 20;

/// Form values for one submission of `count` macros.
///
/// An object template is used as is; an array supplies one entry per macro
/// and the entry of the chunk's first macro fills the shared form (the last
/// entry once the array runs out).
pub fn batch_form_data(template: &JsonValue, first_index: usize, count: usize) -> Map<String, JsonValue> {
    let base = match template {
        JsonValue::Object(map) => Some(map),
        JsonValue::Array(items) => items
            .get(first_index)
            .or_else(|| items.last())
            .and_then(JsonValue::as_object),
        _ => None,
    };
    let mut data = base.cloned().unwrap_or_default();
    data.insert("number_of_macros".to_string(), JsonValue::String(count.to_string()));
    data
}

/// Create `macro_count` assets on report `report_id`.
///
/// Collected items are the 1-based indices of the macros submitted.
pub async fn create_assets(
    ctx: &WorkerContext,
    report_id: &str,
    macro_count: usize,
    template: &JsonValue,
    tabs: usize,
    token: &ControlToken,
) -> AppResult<BatchOutcome<usize>> {
    let started_at = Utc::now();
    let timings = &ctx.config.timings;
    let batch_size = ctx.config.create_batch_size.max(1);
    let progress = ProgressEmitter::new(ctx.output.clone(), ProgressType::CreateAssets, token.batch_id().as_str());
    let asset_url = site::asset_create_url(report_id);

    token.check().await?;
    info!("🚀 creating {} macros for report {}", macro_count, report_id);

    let primary = ctx.browser.primary_tab().await?;
    navigate_with_retry(primary.as_ref(), &asset_url, timings, token).await?;
    token.sleep(timings.settle_delay()).await?;

    let current = primary.current_url().await?;
    if !current.contains(report_id) {
        error!("asset form for report {} not reached, landed on {}", report_id, current);
        return Err(BrowserError::UnexpectedPage { expected: asset_url }.into());
    }

    let distribution = tab_batch_sizes(macro_count, tabs, batch_size);
    info!("tab distribution: {:?} macros per tab", distribution);
    progress.emit(
        "STARTED",
        format!("Creating {} macros using {} tabs", macro_count, distribution.len()),
        ProgressFields::total(macro_count).with_tabs(distribution.len()),
    );

    let filler = FormFiller::new(&ctx.forms.create, timings);
    let shared = SharedProgress::new(macro_count);
    let orchestrator = TabOrchestrator::new(ctx.browser.clone(), report_id);
    let results = orchestrator
        .run(macro_count, distribution.len(), &asset_url, |slot| {
            create_in_tab(ctx, slot, &asset_url, template, batch_size, &filler, &shared, &progress, token)
        })
        .await?;

    let outcome = finalize(results, macro_count, token, started_at);
    info!(
        "📊 report {}: created {}/{} macros - {}",
        report_id,
        outcome.collected.len(),
        macro_count,
        outcome.status.as_str()
    );
    progress.emit(
        outcome.status.as_str(),
        format!("Created {} macros", outcome.collected.len()),
        ProgressFields::from_snapshot(shared.snapshot().await),
    );
    Ok(outcome)
}

#[allow(clippy::too_many_arguments)]
async fn create_in_tab(
    ctx: &WorkerContext,
    slot: WorkerSlot,
    asset_url: &str,
    template: &JsonValue,
    batch_size: usize,
    filler: &FormFiller<'_>,
    shared: &SharedProgress,
    progress: &ProgressEmitter,
    token: &ControlToken,
) -> WorkerResult<usize> {
    let timings = &ctx.config.timings;
    let tab = slot.tab.as_ref();
    let mut result = WorkerResult::new(slot.worker_index);

    match wait_for_ready(tab, site::ASSET_FORM_ANCHOR, READY_ATTEMPTS, timings.poll_interval(), token).await {
        Ok(true) => {}
        Ok(false) => warn!("{} asset form not ready, filling anyway", slot.ctx),
        Err(_) => {
            result.end = WorkerEnd::Stopped;
            return result;
        }
    }

    let chunks: Vec<&[usize]> = slot.units.chunks(batch_size).collect();
    for (i, chunk) in chunks.iter().enumerate() {
        if token.check().await.is_err() {
            result.end = WorkerEnd::Stopped;
            break;
        }
        if i > 0 {
            match navigate_with_retry(tab, asset_url, timings, token).await {
                Ok(()) => {}
                Err(e) if e.is_stopped() => {
                    result.end = WorkerEnd::Stopped;
                    break;
                }
                Err(e) => {
                    error!("{} cannot reload asset form: {}", slot.ctx, e);
                    result.failed += remaining(&chunks[i..]);
                    break;
                }
            }
            if token.sleep(timings.poll_interval()).await.is_err() {
                result.end = WorkerEnd::Stopped;
                break;
            }
        }

        let first = chunk[0];
        info!(
            "{} processing batch: {} to {}",
            slot.ctx,
            first,
            first + chunk.len() - 1
        );
        let data = batch_form_data(template, first - 1, chunk.len());
        match filler.fill_and_submit(tab, &data, token).await {
            Ok(FormOutcome::Saved) => {
                result.completed += chunk.len();
                result.collected.extend_from_slice(chunk);
                let snapshot = shared.add(chunk.len()).await;
                progress.emit(
                    "PROCESSING",
                    format!("{}/{} macros created", snapshot.completed, snapshot.total),
                    ProgressFields::from_snapshot(snapshot),
                );
            }
            Ok(FormOutcome::Failed(reason)) => {
                error!("{} failed to save batch: {}", slot.ctx, reason);
                progress.emit(
                    "ERROR",
                    format!("Failed to save batch starting at macro {}", first),
                    ProgressFields::error(&reason),
                );
                result.failed += remaining(&chunks[i..]);
                break;
            }
            Err(_) => {
                result.end = WorkerEnd::Stopped;
                break;
            }
        }
    }
    result
}

fn remaining(chunks: &[&[usize]]) -> usize {
    chunks.iter().map(|c| c.len()).sum()
}
