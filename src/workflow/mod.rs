pub mod form_filler;
pub mod retention;
pub mod tab_ctx;
pub mod table_scanner;

pub use form_filler::{FormFiller, FormOutcome};
pub use retention::{plan_retention, RetentionPlan, RetentionPolicy};
pub use tab_ctx::TabCtx;
pub use table_scanner::{count_outer_pages, ScanOutcome, ScanStatus, ScannedRow, TableLayout, TableScanner};
