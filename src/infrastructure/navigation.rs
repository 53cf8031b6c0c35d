//! Navigation with one fallback retry

use tracing::warn;

use crate::browser::Tab;
use crate::config::Timings;
use crate::control::ControlToken;
use crate::error::{AppError, AppResult};

/// Navigate `tab` to `url`.
///
/// On a transport failure waits `navigation_backoff` and retries once by
/// assigning `location` from script; the second error is returned.
pub async fn navigate_with_retry(
    tab: &dyn Tab,
    url: &str,
    timings: &Timings,
    token: &ControlToken,
) -> AppResult<()> {
    token.check().await?;
    let first = match tab.navigate(url).await {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    warn!("navigation to {} failed ({}), retrying via location.assign", url, first);

    token.sleep(timings.navigation_backoff()).await?;
    let script = format!("window.location.assign({})", serde_json::to_string(url)?);
    tab.evaluate(&script).await.map_err(|e| match e {
        AppError::Browser(_) => e,
        other => AppError::navigation(url, other),
    })?;
    token.sleep(timings.settle_delay()).await?;
    Ok(())
}
