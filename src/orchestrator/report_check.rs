//! Report existence check
//!
//! Single tab. Tells apart a missing/forbidden report, an empty report and a
//! report that already has macros. For the last case the exact asset count
//! is derived from the last outer page: `(last_page - 1) * 15 + ids_on_it`.

use serde::Serialize;
use tracing::{info, warn};

use crate::browser::Tab;
use crate::context::WorkerContext;
use crate::control::ControlToken;
use crate::error::AppResult;
use crate::infrastructure::{navigate_with_retry, wait_for_table_rows, JsExecutor};
use crate::site;

/// Clicks the last enabled numeric outer page link and returns its number.
const LAST_PAGE_SCRIPT: &str = r#"(() => {
    const isDisabled = (li) => {
        if (!li) return true;
        if (li.classList.contains('disabled')) return true;
        if (li.getAttribute('aria-disabled') === 'true') return true;
        const a = li.querySelector('a,button');
        return !!(a && (a.getAttribute('aria-disabled') === 'true' || a.classList.contains('disabled')));
    };
    let ul = null;
    for (const sel of ['nav ul', '.dataTables_paginate ul', 'ul.pagination']) {
        const el = document.querySelector(sel);
        if (el && el.querySelectorAll('li').length > 0) { ul = el; break; }
    }
    if (!ul) return null;
    const numeric = Array.from(ul.querySelectorAll('li'))
        .filter(li => /^\d+$/.test(li.textContent.trim()) && !isDisabled(li));
    if (numeric.length === 0) return null;
    const last = numeric[numeric.length - 1];
    const page = parseInt(last.textContent.trim(), 10);
    try { (last.querySelector('a,button') || last).click(); } catch (_) {}
    return page;
})()"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    NotFound,
    /// Report exists and has no macros
    Success,
    MacrosExist,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportValidation {
    pub status: ValidationStatus,
    pub message: String,
    pub report_id: String,
    pub exists: bool,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_macros: Option<bool>,
    /// `last_page * 15`, the upper bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macros_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets_exact: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub last_page_macro_ids: Vec<u64>,
}

pub fn exact_asset_count(last_page: usize, ids_on_last_page: usize) -> usize {
    last_page.saturating_sub(1) * site::ROWS_PER_PAGE + ids_on_last_page
}

pub async fn validate_report(
    ctx: &WorkerContext,
    report_id: &str,
    token: &ControlToken,
) -> AppResult<ReportValidation> {
    let timings = &ctx.config.timings;
    let url = site::report_url(report_id);
    info!("[VALIDATION] checking report {}", report_id);

    let tab = ctx.browser.primary_tab().await?;
    let tab = tab.as_ref();
    navigate_with_retry(tab, &url, timings, token).await?;
    token.sleep(timings.render_delay()).await?;

    let mut validation = ReportValidation {
        status: ValidationStatus::NotFound,
        message: "Report not accessible or does not exist".to_string(),
        report_id: report_id.to_string(),
        exists: false,
        url,
        has_macros: None,
        macros_count: None,
        assets_exact: None,
        last_page_macro_ids: Vec::new(),
    };

    let html = tab.content().await?;
    if site::is_missing_page(&html) {
        return Ok(validation);
    }
    validation.exists = true;

    let has_rows = wait_for_table_rows(
        tab,
        site::MACRO_ID_CELLS,
        timings.next_button_timeout(),
        timings.poll_interval(),
        token,
    )
    .await?;
    if !has_rows {
        validation.status = ValidationStatus::Success;
        validation.message = "Report appears to exist and is accessible".to_string();
        validation.has_macros = Some(false);
        return Ok(validation);
    }

    validation.status = ValidationStatus::MacrosExist;
    validation.has_macros = Some(true);

    let last_page = match JsExecutor::new(tab).eval_as::<Option<usize>>(LAST_PAGE_SCRIPT).await {
        Ok(Some(page)) if page >= 1 => Some(page),
        Ok(_) => {
            warn!("[VALIDATION] could not find last page number");
            None
        }
        Err(e) => {
            warn!("[VALIDATION] last page lookup failed: {}", e);
            None
        }
    };

    if let Some(last_page) = last_page {
        token.sleep(timings.poll_interval()).await?;
        wait_for_table_rows(
            tab,
            site::MACRO_ID_CELLS,
            timings.redraw_timeout(),
            timings.poll_interval(),
            token,
        )
        .await?;
        let ids = macro_ids_on_page(tab).await;
        validation.assets_exact = Some(exact_asset_count(last_page, ids.len()));
        validation.macros_count = Some(last_page * site::ROWS_PER_PAGE);
        info!(
            "[VALIDATION] page={}, ids_on_last={}, exact_assets={}",
            last_page,
            ids.len(),
            exact_asset_count(last_page, ids.len())
        );
        validation.last_page_macro_ids = ids;
    }

    validation.message = format!(
        "Only works with empty reports - last page #{}, ids on last page: {}, exact assets: {}",
        last_page.map_or("unknown".to_string(), |p| p.to_string()),
        validation.last_page_macro_ids.len(),
        validation
            .assets_exact
            .map_or("unknown".to_string(), |n| n.to_string()),
    );
    Ok(validation)
}

/// Ids of the rows currently shown, from the row link or its numeric text.
async fn macro_ids_on_page(tab: &dyn Tab) -> Vec<u64> {
    let cells = match tab.find_all(site::MACRO_ID_CELLS).await {
        Ok(cells) => cells,
        Err(e) => {
            warn!("[VALIDATION] cannot read rows: {}", e);
            return Vec::new();
        }
    };
    let mut ids = Vec::with_capacity(cells.len());
    for cell in cells {
        let from_href = match cell.attribute("href").await {
            Ok(Some(href)) => site::macro_id_from_href(&href),
            _ => None,
        };
        let id = match from_href {
            Some(id) => Some(id),
            None => match cell.text().await {
                Ok(Some(text)) => text.trim().parse().ok(),
                _ => None,
            },
        };
        ids.extend(id);
    }
    ids
}
