//! Per-tab processing context
//!
//! Carries "which task, which tab, which report" for log prefixes

use std::fmt::Display;

#[derive(Debug, Clone)]
pub struct TabCtx {
    /// Report being processed
    pub report_id: String,
    /// Worker / tab index (0 is the primary tab)
    pub tab_index: usize,
}

impl TabCtx {
    pub fn new(report_id: impl Into<String>, tab_index: usize) -> Self {
        Self {
            report_id: report_id.into(),
            tab_index,
        }
    }
}

impl Display for TabCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[TAB-{} report {}]", self.tab_index, self.report_id)
    }
}
