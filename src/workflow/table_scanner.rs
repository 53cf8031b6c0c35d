//! Paginated table scanner
//!
//! Drives one tab through one outer page and every DataTables sub-page of it:
//!
//! ```text
//! NAVIGATING -> WAITING_FOR_ROWS -> EXTRACTING -> CHECK_NEXT_SUBPAGE
//!                      ^                                  |
//!                      +---------- next changed ----------+--> DONE
//! ```
//!
//! A row-wait timeout ends the page quietly; a navigation failure aborts only
//! this page. The control token is checked before every navigation, click
//! and poll.

use std::collections::BTreeMap;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::browser::{Element, Tab};
use crate::config::Timings;
use crate::control::ControlToken;
use crate::error::{AppError, AppResult, TaskStopped};
use crate::infrastructure::{navigate_with_retry, wait_for_element, wait_for_table_rows};
use crate::site;
use crate::workflow::tab_ctx::TabCtx;

/// An extra column read next to the id cell
#[derive(Debug, Clone)]
pub struct Column {
    pub name: &'static str,
    pub selector: String,
}

/// Selectors of the table being scanned
#[derive(Debug, Clone)]
pub struct TableLayout {
    pub id_cells: String,
    pub columns: Vec<Column>,
    pub next_control: String,
}

impl TableLayout {
    /// Macro table, ids only
    pub fn macros() -> Self {
        Self {
            id_cells: site::MACRO_ID_CELLS.to_string(),
            columns: Vec::new(),
            next_control: site::SUBPAGE_NEXT.to_string(),
        }
    }

    /// Macro table with the status column
    pub fn macros_with_status() -> Self {
        Self {
            columns: vec![Column {
                name: "status",
                selector: site::STATUS_CELLS.to_string(),
            }],
            ..Self::macros()
        }
    }
}

/// One extracted row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannedRow {
    pub macro_id: u64,
    pub page_number: usize,
    pub sub_page: usize,
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    /// Walked every sub-page that had rows
    Complete,
    /// Rows never appeared before the readiness timeout
    NoRows,
    /// Navigation or table query failed
    Aborted(String),
}

/// Outcome of scanning one outer page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanOutcome {
    pub page_number: usize,
    pub rows: Vec<ScannedRow>,
    /// Rows with a blank or non-numeric id cell, or unreadable
    pub skipped_rows: usize,
    pub sub_pages: usize,
    pub status: ScanStatus,
}

impl ScanOutcome {
    fn new(page_number: usize) -> Self {
        Self {
            page_number,
            rows: Vec::new(),
            skipped_rows: 0,
            sub_pages: 0,
            status: ScanStatus::Complete,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.status, ScanStatus::Aborted(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Navigating,
    WaitingForRows,
    Extracting,
    CheckNextSubpage,
    Done,
}

/// Parsed identifier cell
#[derive(Debug, PartialEq, Eq)]
pub enum RowId {
    Id(u64),
    Blank,
    Invalid(String),
}

pub fn parse_row_id(text: Option<&str>) -> RowId {
    let text = match text.map(str::trim) {
        None | Some("") => return RowId::Blank,
        Some(text) => text,
    };
    match text.parse::<u64>() {
        Ok(id) => RowId::Id(id),
        Err(_) => RowId::Invalid(text.to_string()),
    }
}

pub struct TableScanner<'a> {
    tab: &'a dyn Tab,
    token: &'a ControlToken,
    timings: &'a Timings,
    layout: &'a TableLayout,
    ctx: &'a TabCtx,
}

impl<'a> TableScanner<'a> {
    pub fn new(
        tab: &'a dyn Tab,
        token: &'a ControlToken,
        timings: &'a Timings,
        layout: &'a TableLayout,
        ctx: &'a TabCtx,
    ) -> Self {
        Self {
            tab,
            token,
            timings,
            layout,
            ctx,
        }
    }

    /// Scan outer page `page_number` at `url` and all of its sub-pages.
    ///
    /// Only a stop escapes as an error; everything else is folded into the
    /// returned [`ScanStatus`].
    pub async fn scan_page(&self, url: &str, page_number: usize) -> Result<ScanOutcome, TaskStopped> {
        let mut scan = ScanOutcome::new(page_number);
        let mut state = ScanState::Navigating;
        info!("{} processing page {}", self.ctx, page_number);

        while state != ScanState::Done {
            state = match state {
                ScanState::Navigating => {
                    match navigate_with_retry(self.tab, url, self.timings, self.token).await {
                        Ok(()) => {
                            self.token.sleep(self.timings.settle_delay()).await?;
                            ScanState::WaitingForRows
                        }
                        Err(AppError::Stopped(stop)) => return Err(stop),
                        Err(e) => {
                            error!("{} error opening page {}: {}", self.ctx, page_number, e);
                            scan.status = ScanStatus::Aborted(e.to_string());
                            ScanState::Done
                        }
                    }
                }
                ScanState::WaitingForRows => {
                    // the first render may take long, redraws after "next" are quick
                    let timeout = if scan.sub_pages == 0 {
                        self.timings.table_ready_timeout()
                    } else {
                        self.timings.redraw_timeout()
                    };
                    let ready = wait_for_table_rows(
                        self.tab,
                        &self.layout.id_cells,
                        timeout,
                        self.timings.poll_interval(),
                        self.token,
                    )
                    .await?;
                    if ready {
                        self.token.sleep(self.timings.render_delay()).await?;
                        ScanState::Extracting
                    } else {
                        if scan.sub_pages == 0 {
                            info!("{} no table rows on page {}", self.ctx, page_number);
                            scan.status = ScanStatus::NoRows;
                        }
                        ScanState::Done
                    }
                }
                ScanState::Extracting => match self.extract(&mut scan).await {
                    Ok(found) => {
                        scan.sub_pages += 1;
                        info!(
                            "{} page {} sub-page {}: found {} macro ids",
                            self.ctx, page_number, scan.sub_pages, found
                        );
                        if scan.sub_pages >= self.timings.max_sub_pages {
                            warn!("{} sub-page cap reached on page {}", self.ctx, page_number);
                            ScanState::Done
                        } else {
                            ScanState::CheckNextSubpage
                        }
                    }
                    Err(AppError::Stopped(stop)) => return Err(stop),
                    Err(e) => {
                        error!("{} cannot read table on page {}: {}", self.ctx, page_number, e);
                        scan.status = ScanStatus::Aborted(e.to_string());
                        ScanState::Done
                    }
                },
                ScanState::CheckNextSubpage => {
                    if self.advance_sub_page().await? {
                        ScanState::WaitingForRows
                    } else {
                        debug!("{} no more sub-pages on page {}", self.ctx, page_number);
                        ScanState::Done
                    }
                }
                ScanState::Done => ScanState::Done,
            };
        }
        Ok(scan)
    }

    /// Read every row of the current sub-page. Returns the number of ids found.
    async fn extract(&self, scan: &mut ScanOutcome) -> AppResult<usize> {
        self.token.check().await?;
        let id_cells = self.tab.find_all(&self.layout.id_cells).await?;
        let mut columns = Vec::with_capacity(self.layout.columns.len());
        for column in &self.layout.columns {
            columns.push((column.name, self.tab.find_all(&column.selector).await?));
        }

        let sub_page = scan.sub_pages + 1;
        let mut found = 0;
        for (i, cell) in id_cells.iter().enumerate() {
            let text = match cell.text().await {
                Ok(text) => text,
                Err(e) => {
                    error!("{} error reading row {}: {}", self.ctx, i, e);
                    scan.skipped_rows += 1;
                    continue;
                }
            };
            let macro_id = match parse_row_id(text.as_deref()) {
                RowId::Id(id) => id,
                RowId::Blank => {
                    scan.skipped_rows += 1;
                    continue;
                }
                RowId::Invalid(raw) => {
                    warn!("{} invalid macro id on row {}: {:?}", self.ctx, i, raw);
                    scan.skipped_rows += 1;
                    continue;
                }
            };

            let mut fields = BTreeMap::new();
            for (name, cells) in &columns {
                if let Some(cell) = cells.get(i) {
                    match cell.text().await {
                        Ok(Some(value)) => {
                            fields.insert(name.to_string(), value.trim().to_string());
                        }
                        Ok(None) => {}
                        Err(e) => debug!("{} row {} column {} unreadable: {}", self.ctx, i, name, e),
                    }
                }
            }

            scan.rows.push(ScannedRow {
                macro_id,
                page_number: scan.page_number,
                sub_page,
                fields,
            });
            found += 1;
        }
        Ok(found)
    }

    /// Click the sub-page "next" control.
    ///
    /// `true` only when the control exists, is enabled and the click changed
    /// the table content fingerprint within the redraw timeout.
    pub async fn advance_sub_page(&self) -> Result<bool, TaskStopped> {
        let Some(next) = wait_for_element(
            self.tab,
            &self.layout.next_control,
            self.timings.next_button_timeout(),
            self.timings.poll_interval(),
            self.token,
        )
        .await?
        else {
            debug!("{} next control not found", self.ctx);
            return Ok(false);
        };

        if is_disabled(next.as_ref()).await {
            debug!("{} next control disabled", self.ctx);
            return Ok(false);
        }

        let before = self.fingerprint().await;
        self.token.check().await?;
        if let Err(e) = next.click().await {
            warn!("{} next click failed: {}", self.ctx, e);
            return Ok(false);
        }

        let deadline = Instant::now() + self.timings.redraw_timeout();
        loop {
            self.token.sleep(self.timings.poll_interval()).await?;
            let after = self.fingerprint().await;
            if !after.is_empty() && after != before {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                info!("{} next click produced no redraw", self.ctx);
                return Ok(false);
            }
        }
    }

    /// Row ids of the current sub-page joined with `|`; empty when no rows.
    async fn fingerprint(&self) -> String {
        let cells = match self.tab.find_all(&self.layout.id_cells).await {
            Ok(cells) => cells,
            Err(_) => return "sig-error".to_string(),
        };
        let mut parts = Vec::with_capacity(cells.len());
        for cell in &cells {
            match cell.text().await {
                Ok(text) => parts.push(text.unwrap_or_default().trim().to_string()),
                Err(_) => parts.push("err".to_string()),
            }
        }
        parts.join("|")
    }
}

async fn is_disabled(element: &dyn Element) -> bool {
    let class = element
        .attribute("class")
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
        .to_lowercase();
    let aria = element
        .attribute("aria-disabled")
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
        .to_lowercase();
    class.split_whitespace().any(|c| c == "disabled") || aria == "true" || aria == "1"
}

/// Highest page number in the outer pagination; 1 when there is none.
pub async fn count_outer_pages(
    tab: &dyn Tab,
    timings: &Timings,
    token: &ControlToken,
) -> Result<usize, TaskStopped> {
    wait_for_element(
        tab,
        site::PAGINATION_ITEM,
        timings.element_timeout(),
        timings.poll_interval(),
        token,
    )
    .await?;

    let links = match tab.find_all(site::PAGINATION_LINKS).await {
        Ok(links) => links,
        Err(e) => {
            warn!("cannot read pagination: {}", e);
            return Ok(1);
        }
    };
    let mut highest = None;
    for link in links {
        if let Ok(Some(text)) = link.text().await {
            if let Ok(n) = text.trim().parse::<usize>() {
                highest = highest.max(Some(n));
            }
        }
    }
    Ok(highest.unwrap_or(1).max(1))
}
