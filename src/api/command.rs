//! Inbound commands

use phf::phf_map;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::control::BatchId;
use crate::error::CommandError;

/// Every action the worker understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    GrabMacroIds,
    CheckMacroStatus,
    HalfCheckMacroStatus,
    EditMacros,
    CreateAssets,
    ValidateReport,
    Ping,
    Close,
    Pause,
    Resume,
    Stop,
}

/// Action names on the wire, legacy aliases included
static ACTIONS: phf::Map<&'static str, Action> = phf_map! {
    "grab_macro_ids" => Action::GrabMacroIds,
    "get_macro_ids" => Action::GrabMacroIds,
    "check_macro_status" => Action::CheckMacroStatus,
    "half_check_macro_status" => Action::HalfCheckMacroStatus,
    "edit_macros" => Action::EditMacros,
    "create_assets" => Action::CreateAssets,
    "create_macros" => Action::CreateAssets,
    "validate_report" => Action::ValidateReport,
    "validate_excel_data" => Action::ValidateReport,
    "ping" => Action::Ping,
    "close" => Action::Close,
    "pause" => Action::Pause,
    "resume" => Action::Resume,
    "stop" => Action::Stop,
};

/// Canonical names listed back to a caller that sent an unknown action
pub const SUPPORTED_ACTIONS: &[&str] = &[
    "grab_macro_ids",
    "check_macro_status",
    "half_check_macro_status",
    "edit_macros",
    "create_assets",
    "validate_report",
    "validate_excel_data",
    "ping",
    "close",
    "pause",
    "resume",
    "stop",
];

impl Action {
    pub fn from_name(name: &str) -> Option<Self> {
        ACTIONS.get(name.trim()).copied()
    }

    /// Canonical name, used in task ids
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::GrabMacroIds => "grab_macro_ids",
            Action::CheckMacroStatus => "check_macro_status",
            Action::HalfCheckMacroStatus => "half_check_macro_status",
            Action::EditMacros => "edit_macros",
            Action::CreateAssets => "create_assets",
            Action::ValidateReport => "validate_report",
            Action::Ping => "ping",
            Action::Close => "close",
            Action::Pause => "pause",
            Action::Resume => "resume",
            Action::Stop => "stop",
        }
    }

    /// Pause, resume and stop address a running task by batch id
    pub fn is_control(&self) -> bool {
        matches!(self, Action::Pause | Action::Resume | Action::Stop)
    }
}

/// One command line.
///
/// Ids are kept as raw JSON: callers send them as numbers or strings and
/// the reply must echo `commandId` back untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub command_id: JsonValue,
    #[serde(default)]
    pub batch_id: JsonValue,
    #[serde(default)]
    pub report_id: JsonValue,
    #[serde(default)]
    pub tabs_num: JsonValue,
    #[serde(default)]
    pub macro_count: JsonValue,
    #[serde(default)]
    pub macro_data: JsonValue,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        serde_json::from_str(line).map_err(|e| CommandError::InvalidJson(e.to_string()))
    }

    pub fn action(&self) -> Option<Action> {
        Action::from_name(&self.action)
    }

    /// Report id as text; numbers are accepted
    pub fn report_id(&self) -> Option<String> {
        BatchId::from_json(&self.report_id).map(|id| id.as_str().to_string())
    }

    /// Batch id, falling back to the report id
    pub fn batch_id(&self) -> Option<BatchId> {
        BatchId::from_json(&self.batch_id).or_else(|| BatchId::from_json(&self.report_id))
    }

    pub fn tabs(&self) -> Option<usize> {
        positive_count(&self.tabs_num)
    }

    /// `macroCount` as a positive integer; `"12"` is accepted too
    pub fn macro_count(&self) -> Option<usize> {
        positive_count(&self.macro_count)
    }
}

fn positive_count(value: &JsonValue) -> Option<usize> {
    let n = match value {
        JsonValue::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        JsonValue::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    usize::try_from(n).ok().filter(|n| *n > 0)
}
