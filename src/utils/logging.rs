//! Logging setup and banner helpers
//!
//! stdout carries the JSON protocol, so every log line goes to stderr.

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;

/// Install the global subscriber. `RUST_LOG` wins over `default_filter`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 taqeem worker starting");
    match config.browser_debug_port {
        Some(port) => info!("🌐 browser: DevTools port {}", port),
        None => info!("🌐 browser: headless launch"),
    }
    info!("📊 default tabs: {}, create batch size: {}", config.default_tabs, config.create_batch_size);
    match &config.store_dir {
        Some(dir) => info!("💾 store: {}", dir.display()),
        None => info!("💾 store: in memory"),
    }
    info!("{}", "=".repeat(60));
}

pub fn log_task_start(task_id: &str, report_id: &str, tabs: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 [TASK {}] report {} on {} tabs", task_id, report_id, tabs);
    info!("{}", "=".repeat(60));
}

pub fn log_task_end(task_id: &str, status: &str) {
    info!("{}", "─".repeat(60));
    info!("🏁 [TASK {}] finished: {}", task_id, status);
    info!("{}", "─".repeat(60));
}

pub fn log_shutdown(stopped: usize) {
    info!("\n{}", "=".repeat(60));
    info!("👋 shutting down, {} running tasks stopped", stopped);
    info!("{}", "=".repeat(60));
}
