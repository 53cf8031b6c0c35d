//! Orchestration layer
//!
//! ## Modules
//!
//! ### `partition` - workload partitioner
//! - balanced contiguous buckets of 1-based units
//! - tab sizing for asset creation
//!
//! ### `tab_runner` - parallel tab orchestrator
//! - one worker per non-empty bucket, worker 0 on the primary tab
//! - structured join, teardown of the tabs it opened
//!
//! ### task workflows
//! - `macro_ids` - collect macro ids of a report
//! - `macro_status` - full / half status check
//! - `macro_edit` - re-submit every stored asset
//! - `asset_create` - create assets in batches
//! - `report_check` - report existence check
//!
//! ## Layering
//!
//! ```text
//! app (command dispatch, task registry)
//!     ↓
//! orchestrator (task workflows → tab_runner → partition)
//!     ↓
//! workflow (TableScanner / FormFiller per tab)
//!     ↓
//! infrastructure (JsExecutor, waits, navigation)
//!     ↓
//! browser (driver traits)
//! ```

pub mod asset_create;
pub mod macro_edit;
pub mod macro_ids;
pub mod macro_status;
pub mod partition;
pub mod report_check;
pub mod tab_runner;

pub use asset_create::create_assets;
pub use macro_edit::edit_macros;
pub use macro_ids::collect_macro_ids;
pub use macro_status::{check_macro_status, CheckMode, StatusCheck};
pub use partition::{partition, tab_batch_sizes, Partition};
pub use report_check::{validate_report, ReportValidation, ValidationStatus};
pub use tab_runner::{drive_units, TabOrchestrator, UnitOutcome, WorkerSlot};
