//! Explicit worker context
//!
//! Everything a command handler or workflow needs, created once at startup
//! and passed down. Nothing lives in module-level state.

use std::sync::Arc;

use crate::browser::BrowserDriver;
use crate::config::Config;
use crate::control::{TabLease, TaskRegistry};
use crate::models::{DocumentStore, FormSpecs};
use crate::services::OutputChannel;

#[derive(Clone)]
pub struct WorkerContext {
    pub config: Arc<Config>,
    pub browser: Arc<dyn BrowserDriver>,
    pub store: Arc<dyn DocumentStore>,
    pub registry: TaskRegistry,
    /// Taken by each long-running task for its whole run
    pub tab_lease: TabLease,
    pub output: OutputChannel,
    pub forms: Arc<FormSpecs>,
}

impl WorkerContext {
    pub fn new(
        config: Config,
        browser: Arc<dyn BrowserDriver>,
        store: Arc<dyn DocumentStore>,
        output: OutputChannel,
        forms: FormSpecs,
    ) -> Self {
        let registry = TaskRegistry::new(config.timings.control_poll());
        Self {
            config: Arc::new(config),
            browser,
            store,
            registry,
            tab_lease: TabLease::new(),
            output,
            forms: Arc::new(forms),
        }
    }

    /// Tabs to use when a command does not say
    pub fn tabs_or_default(&self, requested: Option<usize>) -> usize {
        requested.filter(|n| *n > 0).unwrap_or(self.config.default_tabs).max(1)
    }
}
