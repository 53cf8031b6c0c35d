//! chromiumoxide implementation of the driver traits

use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::element::Element as CdpElement;
use chromiumoxide::{Browser, Page};
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::browser::driver::{BrowserDriver, Element, Tab};
use crate::error::{AppError, AppResult, BrowserError};

/// Browser handle plus the tab opened (or found) at startup
pub struct ChromiumBrowser {
    browser: Mutex<Browser>,
    primary: Arc<ChromiumTab>,
    handler: JoinHandle<()>,
}

impl ChromiumBrowser {
    pub fn new(browser: Browser, primary: Page, handler: JoinHandle<()>) -> Self {
        Self {
            browser: Mutex::new(browser),
            primary: Arc::new(ChromiumTab::new(primary)),
            handler,
        }
    }
}

#[async_trait]
impl BrowserDriver for ChromiumBrowser {
    async fn primary_tab(&self) -> AppResult<Arc<dyn Tab>> {
        Ok(self.primary.clone() as Arc<dyn Tab>)
    }

    async fn open_tab(&self, url: &str) -> AppResult<Arc<dyn Tab>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page(url)
            .await
            .map_err(|e| {
                AppError::Browser(BrowserError::TabOpenFailed {
                    source: Box::new(e),
                })
            })?;
        debug!("opened tab on {}", url);
        Ok(Arc::new(ChromiumTab::new(page)) as Arc<dyn Tab>)
    }

    async fn close_secondary_tabs(&self) -> AppResult<usize> {
        let pages = self.browser.lock().await.pages().await?;
        let primary_id = self.primary.page.target_id().clone();
        let mut closed = 0;
        for page in pages {
            if *page.target_id() == primary_id {
                continue;
            }
            match page.close().await {
                Ok(()) => closed += 1,
                Err(e) => warn!("failed to close tab: {}", e),
            }
        }
        if closed > 0 {
            info!("closed {} additional tabs", closed);
        }
        Ok(closed)
    }

    async fn shutdown(&self) -> AppResult<()> {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            warn!("error closing browser: {}", e);
        }
        self.handler.abort();
        Ok(())
    }
}

pub struct ChromiumTab {
    page: Page,
}

impl ChromiumTab {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }
}

#[async_trait]
impl Tab for ChromiumTab {
    async fn navigate(&self, url: &str) -> AppResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| AppError::navigation(url, e))?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> AppResult<JsonValue> {
        let result = self.page.evaluate(script.to_string()).await.map_err(AppError::script)?;
        Ok(result.value().cloned().unwrap_or(JsonValue::Null))
    }

    async fn find_element(&self, selector: &str) -> AppResult<Option<Box<dyn Element>>> {
        Ok(self.find_all(selector).await?.into_iter().next())
    }

    async fn find_all(&self, selector: &str) -> AppResult<Vec<Box<dyn Element>>> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| AppError::query(selector, e))?;
        Ok(elements
            .into_iter()
            .map(|element| Box::new(ChromiumElement(element)) as Box<dyn Element>)
            .collect())
    }

    async fn current_url(&self) -> AppResult<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn content(&self) -> AppResult<String> {
        Ok(self.page.content().await?)
    }

    async fn close(&self) -> AppResult<()> {
        // Page::close consumes the handle; the clone shares the same target
        self.page.clone().close().await?;
        Ok(())
    }
}

struct ChromiumElement(CdpElement);

#[async_trait]
impl Element for ChromiumElement {
    async fn text(&self) -> AppResult<Option<String>> {
        Ok(self.0.inner_text().await?)
    }

    async fn attribute(&self, name: &str) -> AppResult<Option<String>> {
        Ok(self.0.attribute(name).await?)
    }

    async fn click(&self) -> AppResult<()> {
        self.0.click().await?;
        Ok(())
    }
}
