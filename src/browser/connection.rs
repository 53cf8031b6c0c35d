use chromiumoxide::{Browser, BrowserConfig, Handler};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info};

use crate::browser::chromium::ChromiumBrowser;
use crate::config::Config;
use crate::error::{AppError, AppResult, BrowserError};

/// Connect to a running browser (DevTools port) or launch a headless one,
/// then open the primary tab on `config.start_url`.
pub async fn open_browser(config: &Config) -> AppResult<ChromiumBrowser> {
    let (browser, handler) = match config.browser_debug_port {
        Some(port) => connect(port).await?,
        None => launch(config).await?,
    };

    // pump CDP events in the background
    let handler = spawn_handler(handler);

    // give the browser a moment to sync its target list
    sleep(Duration::from_millis(300)).await;

    let primary = match browser.pages().await?.into_iter().next() {
        Some(page) => {
            debug!("reusing existing page as primary tab");
            page.goto(config.start_url.as_str())
                .await
                .map_err(|e| AppError::navigation(&config.start_url, e))?;
            page
        }
        None => browser.new_page(config.start_url.as_str()).await.map_err(|e| {
            error!("failed to create primary page: {}", e);
            AppError::Browser(BrowserError::TabOpenFailed { source: Box::new(e) })
        })?,
    };
    info!("✓ primary tab on {}", config.start_url);

    Ok(ChromiumBrowser::new(browser, primary, handler))
}

async fn connect(port: u16) -> AppResult<(Browser, Handler)> {
    let endpoint = format!("http://localhost:{}", port);
    info!("connecting to browser: {}", endpoint);

    Browser::connect(&endpoint).await.map_err(|e| {
        error!("failed to connect to browser: {}", e);
        AppError::Browser(BrowserError::ConnectionFailed {
            endpoint,
            source: Box::new(e),
        })
    })
}

async fn launch(config: &Config) -> AppResult<(Browser, Handler)> {
    info!("🚀 launching headless browser...");

    let mut builder = BrowserConfig::builder().new_headless_mode().args(vec![
        "--disable-gpu",
        "--no-sandbox",
        "--disable-dev-shm-usage",
    ]);
    if let Some(path) = &config.chrome_executable {
        builder = builder.chrome_executable(path);
    }
    let browser_config = builder.build().map_err(|e| {
        error!("invalid browser configuration: {}", e);
        AppError::Browser(BrowserError::LaunchFailed(e))
    })?;

    Browser::launch(browser_config).await.map_err(|e| {
        error!("failed to launch browser: {}", e);
        AppError::Browser(BrowserError::LaunchFailed(e.to_string()))
    })
}

fn spawn_handler(mut handler: Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
        debug!("browser event handler finished");
    })
}
