//! Typed script evaluation on top of a tab

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::browser::Tab;
use crate::error::AppResult;

/// JS executor
///
/// Borrows the tab of the worker that uses it; knows nothing about reports or
/// macros, only how to run a script and decode its result.
pub struct JsExecutor<'a> {
    tab: &'a dyn Tab,
}

impl<'a> JsExecutor<'a> {
    pub fn new(tab: &'a dyn Tab) -> Self {
        Self { tab }
    }

    /// Run a script and return its JSON result
    pub async fn eval(&self, js_code: impl AsRef<str>) -> AppResult<JsonValue> {
        self.tab.evaluate(js_code.as_ref()).await
    }

    /// Run a script and deserialize its result
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl AsRef<str>) -> AppResult<T> {
        let json_value = self.eval(js_code).await?;
        Ok(serde_json::from_value(json_value)?)
    }
}
