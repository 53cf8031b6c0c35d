//! # Taqeem Worker
//!
//! Headless-browser worker that collects, checks, edits and creates macro
//! assets on the taqeem.sa portal, spreading each job across several tabs.
//!
//! ## Layers
//!
//! ### ① Infrastructure
//! - `browser/` - driver traits, chromiumoxide implementation
//! - `infrastructure/` - `JsExecutor`, bounded waits, navigation with retry
//!
//! ### ② Control and services
//! - `control/` - `ControlToken` (pause/stop), `TaskRegistry` and the primary-tab `TabLease`
//! - `services/` - progress records and outcome aggregation
//! - `models/` - report records, document stores, form specs
//!
//! ### ③ Workflow (one tab)
//! - `TableScanner` - paginated table scan with sub-pages
//! - `FormFiller` - field injection and submit
//!
//! ### ④ Orchestration
//! - `orchestrator/` - partitioner, `TabOrchestrator`, task workflows
//! - `app` - line protocol command loop
//!
//! ## Module layout

pub mod api;
pub mod app;
pub mod browser;
pub mod config;
pub mod context;
pub mod control;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod site;
pub mod utils;
pub mod workflow;

pub use app::App;
pub use config::Config;
pub use context::WorkerContext;
pub use control::{BatchId, ControlToken, TabLease, TaskRegistry};
pub use error::{AppError, AppResult, TaskStopped};
pub use infrastructure::JsExecutor;
pub use orchestrator::TabOrchestrator;
pub use services::{BatchOutcome, BatchStatus};
pub use workflow::{FormFiller, TableScanner};
