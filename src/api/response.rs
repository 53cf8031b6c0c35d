//! Terminal replies, one per command, correlated by `commandId`

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::api::command::SUPPORTED_ACTIONS;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub status: String,
    #[serde(skip_serializing_if = "JsonValue::is_null")]
    pub command_id: JsonValue,
    #[serde(flatten)]
    pub body: Map<String, JsonValue>,
}

impl Reply {
    pub fn new(status: impl Into<String>, command_id: &JsonValue) -> Self {
        Self {
            status: status.into(),
            command_id: command_id.clone(),
            body: Map::new(),
        }
    }

    pub fn success(command_id: &JsonValue, message: &str) -> Self {
        Self::new("SUCCESS", command_id).with("message", message)
    }

    pub fn failed(command_id: &JsonValue, error: impl ToString) -> Self {
        Self::new("FAILED", command_id).with("error", error.to_string())
    }

    /// STOPPED for a stop signal, FAILED for everything else
    pub fn from_error(command_id: &JsonValue, err: &AppError) -> Self {
        if err.is_stopped() {
            Self::new("STOPPED", command_id).with("message", err.to_string())
        } else {
            Self::failed(command_id, err)
        }
    }

    pub fn unknown_action(command_id: &JsonValue, action: &str) -> Self {
        Self::failed(command_id, format!("Unknown action: {}", action))
            .with("supported_actions", SUPPORTED_ACTIONS)
    }

    /// Malformed input line; there is no command id to echo
    pub fn invalid_json(err: impl ToString, received: &str) -> Self {
        Self::failed(&JsonValue::Null, err).with("received", received)
    }

    /// Reply carrying a workflow result; its `status` field becomes the
    /// reply status, the other fields are copied into the body.
    pub fn from_payload<T: Serialize>(command_id: &JsonValue, payload: &T) -> AppResult<Self> {
        let mut body = match serde_json::to_value(payload)? {
            JsonValue::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                map
            }
        };
        let status = match body.remove("status") {
            Some(JsonValue::String(status)) => status,
            _ => "SUCCESS".to_string(),
        };
        Ok(Self {
            status,
            command_id: command_id.clone(),
            body,
        })
    }

    pub fn with(mut self, key: &str, value: impl Into<JsonValue>) -> Self {
        self.body.insert(key.to_string(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CommandError, TaskStopped};
    use serde_json::json;

    fn to_json(reply: &Reply) -> JsonValue {
        serde_json::to_value(reply).unwrap()
    }

    #[test]
    fn failed_reply_echoes_command_id() {
        let err = AppError::from(CommandError::MissingParameter("reportId"));
        let reply = Reply::from_error(&json!("c-1"), &err);
        assert_eq!(
            to_json(&reply),
            json!({"status": "FAILED", "commandId": "c-1", "error": "Missing required parameter: reportId"})
        );
    }

    #[test]
    fn stop_becomes_stopped_reply() {
        let reply = Reply::from_error(&json!(3), &AppError::from(TaskStopped));
        assert_eq!(reply.status, "STOPPED");
    }

    #[test]
    fn invalid_json_carries_received_line_and_no_id() {
        let value = to_json(&Reply::invalid_json("Invalid JSON: eof", "{oops"));
        assert_eq!(value["received"], json!("{oops"));
        assert!(value.get("commandId").is_none());
    }

    #[test]
    fn payload_status_is_lifted() {
        let reply = Reply::from_payload(&json!(1), &json!({"status": "PARTIAL", "completed": 3})).unwrap();
        assert_eq!(reply.status, "PARTIAL");
        assert_eq!(to_json(&reply), json!({"status": "PARTIAL", "commandId": 1, "completed": 3}));
    }
}
