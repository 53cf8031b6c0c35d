//! Infrastructure: script evaluation, waits and navigation over a [`Tab`](crate::browser::Tab)

pub mod js_executor;
pub mod navigation;
pub mod wait;

pub use js_executor::JsExecutor;
pub use navigation::navigate_with_retry;
pub use wait::{wait_for_element, wait_for_ready, wait_for_table_rows};
