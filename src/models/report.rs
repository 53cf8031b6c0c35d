use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Completion state of one macro on the portal (stored as 0 / 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum SubmitState {
    #[default]
    Incomplete,
    Complete,
}

impl From<u8> for SubmitState {
    fn from(value: u8) -> Self {
        if value == 0 {
            SubmitState::Incomplete
        } else {
            SubmitState::Complete
        }
    }
}

impl From<SubmitState> for u8 {
    fn from(state: SubmitState) -> Self {
        match state {
            SubmitState::Incomplete => 0,
            SubmitState::Complete => 1,
        }
    }
}

/// One asset (macro) of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Macro id on the portal; empty until the macro exists
    #[serde(default)]
    pub id: String,
    /// Outer page the macro was found on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pg_no: Option<String>,
    #[serde(rename = "submitState", default)]
    pub submit_state: SubmitState,
    /// Form values keyed by field name
    #[serde(flatten)]
    pub fields: Map<String, JsonValue>,
}

impl AssetRecord {
    pub fn has_id(&self) -> bool {
        !self.id.trim().is_empty()
    }

    /// Numeric macro id; `"0012"` and `12` are the same macro.
    pub fn macro_id(&self) -> Option<u64> {
        self.id.trim().parse().ok()
    }
}

/// Report document as kept in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub report_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub asset_data: Vec<AssetRecord>,
    #[serde(rename = "editStartTime", default, skip_serializing_if = "Option::is_none")]
    pub edit_start_time: Option<DateTime<Utc>>,
    #[serde(rename = "editEndTime", default, skip_serializing_if = "Option::is_none")]
    pub edit_end_time: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// A macro id and the outer page it was listed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroLocation {
    pub macro_id: u64,
    pub page_number: usize,
}

impl ReportRecord {
    pub fn new(report_id: impl Into<String>) -> Self {
        let report_id = report_id.into();
        let now = Utc::now();
        Self {
            title: format!("Report {}", report_id),
            report_id,
            checked: false,
            asset_data: Vec::new(),
            edit_start_time: None,
            edit_end_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record built from scraped macro ids, every asset incomplete.
    pub fn from_locations(report_id: impl Into<String>, locations: &[MacroLocation]) -> Self {
        let mut record = Self::new(report_id);
        record.asset_data = locations
            .iter()
            .map(|loc| {
                let mut fields = Map::new();
                fields.insert("serial_no".into(), format!("SN-{}", loc.macro_id).into());
                fields.insert("asset_name".into(), format!("Asset {}", loc.macro_id).into());
                AssetRecord {
                    id: loc.macro_id.to_string(),
                    pg_no: Some(loc.page_number.to_string()),
                    submit_state: SubmitState::Incomplete,
                    fields,
                }
            })
            .collect();
        record
    }

    /// Numeric ids of the incomplete assets; unparsable ids are skipped
    pub fn incomplete_ids(&self) -> Vec<u64> {
        self.asset_data
            .iter()
            .filter(|a| a.submit_state == SubmitState::Incomplete)
            .filter_map(AssetRecord::macro_id)
            .collect()
    }

    /// Indices of assets without a macro id
    pub fn assets_missing_ids(&self) -> Vec<usize> {
        self.asset_data
            .iter()
            .enumerate()
            .filter(|(_, a)| !a.has_id())
            .map(|(i, _)| i)
            .collect()
    }
}
