use std::sync::Arc;
use std::time::Duration;

use taqeem_worker::browser::{open_browser, BrowserDriver, Tab};
use taqeem_worker::config::Config;
use taqeem_worker::context::WorkerContext;
use taqeem_worker::control::{BatchId, ControlToken};
use taqeem_worker::models::{FormSpecs, MemoryStore};
use taqeem_worker::orchestrator::validate_report;
use taqeem_worker::services::OutputChannel;
use taqeem_worker::utils::logging;

#[tokio::test]
#[ignore] // needs a logged-in browser: BROWSER_DEBUG_PORT=9222 REPORT_ID=... cargo test -- --ignored
async fn test_validate_real_report() {
    logging::init("debug");

    let config = Config::from_env().expect("config from env");
    let report_id = std::env::var("REPORT_ID").expect("REPORT_ID must be set");

    let browser = open_browser(&config).await.expect("browser should open");
    let browser: Arc<dyn BrowserDriver> = Arc::new(browser);
    let (output, _records) = OutputChannel::new();
    let ctx = WorkerContext::new(
        config,
        browser.clone(),
        Arc::new(MemoryStore::new()),
        output,
        FormSpecs::default(),
    );
    let token = ControlToken::new(BatchId::new(&report_id), Duration::from_millis(500));

    let validation = validate_report(&ctx, &report_id, &token)
        .await
        .expect("validation should run");
    println!("{}", serde_json::to_string_pretty(&validation).unwrap());
    assert!(validation.exists);

    browser.shutdown().await.expect("browser should close");
}

#[tokio::test]
#[ignore]
async fn test_browser_connection() {
    logging::init("debug");

    let config = Config::from_env().expect("config from env");
    let browser = open_browser(&config).await.expect("browser should open");

    let tab = browser.primary_tab().await.expect("primary tab");
    let url = tab.current_url().await.expect("current url");
    println!("primary tab on {}", url);

    let extra = browser.open_tab("about:blank").await.expect("second tab");
    extra.navigate(&config.start_url).await.expect("navigation");
    assert!(browser.close_secondary_tabs().await.expect("close tabs") >= 1);

    browser.shutdown().await.expect("browser should close");
}
