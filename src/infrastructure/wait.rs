//! Timeout-bounded polling waits
//!
//! Every wait polls at a fixed interval, checks the control token between
//! polls and gives up at its deadline. Query errors during a poll are treated
//! as "not there yet".

use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::browser::{Element, Tab};
use crate::control::ControlToken;
use crate::error::TaskStopped;

/// Wait for `selector` to match; `None` on timeout.
pub async fn wait_for_element(
    tab: &dyn Tab,
    selector: &str,
    timeout: Duration,
    interval: Duration,
    token: &ControlToken,
) -> Result<Option<Box<dyn Element>>, TaskStopped> {
    let deadline = Instant::now() + timeout;
    loop {
        token.check().await?;
        match tab.find_element(selector).await {
            Ok(Some(element)) => return Ok(Some(element)),
            Ok(None) => {}
            Err(e) => trace!("query {} failed while waiting: {}", selector, e),
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        token.sleep(interval).await?;
    }
}

/// Wait until at least one id cell holds a numeric macro id.
pub async fn wait_for_table_rows(
    tab: &dyn Tab,
    id_cell_selector: &str,
    timeout: Duration,
    interval: Duration,
    token: &ControlToken,
) -> Result<bool, TaskStopped> {
    let deadline = Instant::now() + timeout;
    loop {
        token.check().await?;
        if has_numeric_cell(tab, id_cell_selector).await {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        token.sleep(interval).await?;
    }
}

async fn has_numeric_cell(tab: &dyn Tab, selector: &str) -> bool {
    let cells = match tab.find_all(selector).await {
        Ok(cells) => cells,
        Err(e) => {
            trace!("row poll failed: {}", e);
            return false;
        }
    };
    for cell in cells {
        if let Ok(Some(text)) = cell.text().await {
            let text = text.trim();
            if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
                return true;
            }
        }
    }
    false
}

/// Wait for `document.readyState == "complete"` and `anchor` to exist.
pub async fn wait_for_ready(
    tab: &dyn Tab,
    anchor: &str,
    attempts: usize,
    interval: Duration,
    token: &ControlToken,
) -> Result<bool, TaskStopped> {
    for _ in 0..attempts {
        token.check().await?;
        let complete = matches!(
            tab.evaluate("document.readyState").await,
            Ok(serde_json::Value::String(state)) if state == "complete"
        );
        let anchored = matches!(tab.find_element(anchor).await, Ok(Some(_)));
        if complete && anchored {
            return Ok(true);
        }
        token.sleep(interval).await?;
    }
    Ok(false)
}
