//! Form filling
//!
//! Every value is injected with one script call, then the page's submit
//! button is clicked. Field names map to selectors through a [`FormSpec`].
//!
//! Date fields accept `dd-mm-yyyy` (converted) or `yyyy-mm-dd` (kept); any
//! other date text is dropped with a warning.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};

use crate::browser::Tab;
use crate::config::Timings;
use crate::control::ControlToken;
use crate::error::{AppResult, TaskStopped};
use crate::infrastructure::{wait_for_element, JsExecutor};
use crate::models::{FieldType, FormSpec};
use crate::site;

/// Value injected into one form control
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldValue {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub value: String,
}

/// Result of one fill + submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormOutcome {
    Saved,
    Failed(String),
}

impl FormOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, FormOutcome::Saved)
    }
}

/// Selector -> value for every field of `data` known to `spec`.
pub fn build_injection(data: &Map<String, JsonValue>, spec: &FormSpec) -> BTreeMap<String, FieldValue> {
    let mut injection = BTreeMap::new();
    for (key, selector) in &spec.field_map {
        let Some(raw) = data.get(key) else {
            continue;
        };
        let field_type = spec.field_type(key);
        let mut value = value_text(raw);

        if field_type == FieldType::Date && !value.is_empty() {
            match normalize_date(&value) {
                Some(date) => value = date,
                None => {
                    warn!("invalid date format for {}: {}", key, value);
                    continue;
                }
            }
        }

        injection.insert(selector.clone(), FieldValue { field_type, value });
    }
    injection
}

fn value_text(raw: &JsonValue) -> String {
    match raw {
        JsonValue::Null => String::new(),
        JsonValue::Bool(true) => "true".to_string(),
        JsonValue::Bool(false) => String::new(),
        JsonValue::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// `dd-mm-yyyy` -> `yyyy-mm-dd`; `yyyy-mm-dd` passes through.
pub fn normalize_date(value: &str) -> Option<String> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%d-%m-%Y") {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|_| value.to_string())
}

/// Script that writes `injection` into the page and fires input/change events.
pub fn injection_script(injection: &BTreeMap<String, FieldValue>) -> AppResult<String> {
    let data = serde_json::to_string(injection)?;
    Ok(format!(
        r#"(function() {{
    const data = {data};
    let filled = 0;
    for (const [selector, meta] of Object.entries(data)) {{
        const el = document.querySelector(selector);
        if (!el) continue;
        switch (meta.type) {{
            case "checkbox":
                el.checked = Boolean(meta.value);
                el.dispatchEvent(new Event("change", {{ bubbles: true }}));
                break;
            case "select": {{
                let found = false;
                for (const opt of el.options) {{
                    if (opt.value == meta.value || opt.text == meta.value) {{
                        el.value = opt.value;
                        found = true;
                        break;
                    }}
                }}
                if (!found && el.options.length) el.selectedIndex = 0;
                el.dispatchEvent(new Event("change", {{ bubbles: true }}));
                break;
            }}
            default:
                el.value = meta.value ?? "";
                el.dispatchEvent(new Event("input", {{ bubbles: true }}));
                el.dispatchEvent(new Event("change", {{ bubbles: true }}));
        }}
        filled += 1;
    }}
    return filled;
}})()"#
    ))
}

/// Fills one form on one tab
pub struct FormFiller<'a> {
    spec: &'a FormSpec,
    timings: &'a Timings,
}

impl<'a> FormFiller<'a> {
    pub fn new(spec: &'a FormSpec, timings: &'a Timings) -> Self {
        Self { spec, timings }
    }

    /// Inject `data` into the current page and click submit.
    ///
    /// Browser failures become [`FormOutcome::Failed`]; only a stop escapes.
    pub async fn fill_and_submit(
        &self,
        tab: &dyn Tab,
        data: &Map<String, JsonValue>,
        token: &ControlToken,
    ) -> Result<FormOutcome, TaskStopped> {
        token.check().await?;

        let injection = build_injection(data, self.spec);
        let script = match injection_script(&injection) {
            Ok(script) => script,
            Err(e) => return Ok(FormOutcome::Failed(e.to_string())),
        };
        match JsExecutor::new(tab).eval(&script).await {
            Ok(filled) => debug!("filled {} of {} fields", filled, injection.len()),
            Err(e) => return Ok(FormOutcome::Failed(e.to_string())),
        }

        token.check().await?;
        let Some(submit) = wait_for_element(
            tab,
            site::SUBMIT_BUTTON,
            self.timings.submit_timeout(),
            self.timings.poll_interval(),
            token,
        )
        .await?
        else {
            return Ok(FormOutcome::Failed("Save button not found".to_string()));
        };

        token.sleep(self.timings.poll_interval()).await?;
        if let Err(e) = submit.click().await {
            return Ok(FormOutcome::Failed(e.to_string()));
        }
        token.sleep(self.timings.submit_settle()).await?;
        Ok(FormOutcome::Saved)
    }
}
