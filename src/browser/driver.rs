//! Browser driver seam
//!
//! The orchestrator only talks to these traits; `chromium` implements them on
//! top of chromiumoxide, tests implement them with a scripted site.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::AppResult;

/// A live browser with one primary tab and any number of secondary tabs.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// The tab that survives every task (reused as worker 0).
    async fn primary_tab(&self) -> AppResult<Arc<dyn Tab>>;

    /// Open a new tab on `url`.
    async fn open_tab(&self, url: &str) -> AppResult<Arc<dyn Tab>>;

    /// Close everything except the primary tab; returns how many were closed.
    /// Individual close failures are logged by the implementation.
    async fn close_secondary_tabs(&self) -> AppResult<usize>;

    async fn shutdown(&self) -> AppResult<()>;
}

/// One independent page context. Owned by exactly one worker at a time.
#[async_trait]
pub trait Tab: Send + Sync {
    async fn navigate(&self, url: &str) -> AppResult<()>;

    /// Evaluate a script; `undefined` comes back as `Null`.
    async fn evaluate(&self, script: &str) -> AppResult<JsonValue>;

    /// First element matching `selector`, right now, without waiting.
    async fn find_element(&self, selector: &str) -> AppResult<Option<Box<dyn Element>>>;

    async fn find_all(&self, selector: &str) -> AppResult<Vec<Box<dyn Element>>>;

    async fn current_url(&self) -> AppResult<String>;

    async fn content(&self) -> AppResult<String>;

    async fn close(&self) -> AppResult<()>;
}

#[async_trait]
pub trait Element: Send + Sync {
    async fn text(&self) -> AppResult<Option<String>>;

    async fn attribute(&self, name: &str) -> AppResult<Option<String>>;

    async fn click(&self) -> AppResult<()>;
}
