//! Progress records and the stdout output channel
//!
//! Every JSON line the worker prints goes through [`OutputChannel`]: command
//! replies and progress records alike. One writer task drains the channel,
//! so lines from concurrent tasks never interleave.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::services::outcome::ProgressSnapshot;

/// Sender side of the JSON line output
#[derive(Debug, Clone)]
pub struct OutputChannel {
    tx: mpsc::UnboundedSender<JsonValue>,
}

impl OutputChannel {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<JsonValue>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue one record. Never blocks; a closed channel is only logged.
    pub fn send(&self, record: JsonValue) {
        if let Err(e) = self.tx.send(record) {
            warn!("output channel closed, dropping record: {}", e.0);
        }
    }

    pub fn send_serialized<T: Serialize>(&self, record: &T) {
        match serde_json::to_value(record) {
            Ok(value) => self.send(value),
            Err(e) => warn!("cannot serialize output record: {}", e),
        }
    }
}

/// Drain `rx` into `writer`, one JSON document per line.
///
/// Ends when every sender is dropped.
pub fn spawn_writer<W>(mut rx: mpsc::UnboundedReceiver<JsonValue>, mut writer: W) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
            let mut line = record.to_string();
            line.push('\n');
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                warn!("cannot write output line: {}", e);
                continue;
            }
            if let Err(e) = writer.flush().await {
                warn!("cannot flush output: {}", e);
            }
        }
        debug!("output writer finished");
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressType {
    MacroId,
    MacroStatus,
    MacroEdit,
    CreateAssets,
}

/// Optional numeric/detail fields of a progress record
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_records: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macro_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_tabs: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressFields {
    pub fn from_snapshot(snapshot: ProgressSnapshot) -> Self {
        Self {
            total: Some(snapshot.total),
            current: Some(snapshot.completed),
            percentage: Some(snapshot.percentage()),
            failed_records: Some(snapshot.failed),
            ..Default::default()
        }
    }

    pub fn total(total: usize) -> Self {
        Self {
            total: Some(total),
            ..Default::default()
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_macro(mut self, macro_id: impl ToString) -> Self {
        self.macro_id = Some(macro_id.to_string());
        self
    }

    pub fn with_page(mut self, page_number: usize) -> Self {
        self.page_number = Some(page_number);
        self
    }

    pub fn with_tabs(mut self, num_tabs: usize) -> Self {
        self.num_tabs = Some(num_tabs);
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressRecord<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    progress_type: ProgressType,
    status: &'a str,
    message: &'a str,
    batch_id: &'a str,
    timestamp: String,
    #[serde(flatten)]
    fields: &'a ProgressFields,
}

/// Emits progress records for one task
#[derive(Debug, Clone)]
pub struct ProgressEmitter {
    output: OutputChannel,
    progress_type: ProgressType,
    batch_id: String,
}

impl ProgressEmitter {
    pub fn new(output: OutputChannel, progress_type: ProgressType, batch_id: impl Into<String>) -> Self {
        Self {
            output,
            progress_type,
            batch_id: batch_id.into(),
        }
    }

    /// Queue one progress record. Never fails the caller.
    pub fn emit(&self, status: &str, message: impl AsRef<str>, fields: ProgressFields) {
        let record = ProgressRecord {
            kind: "PROGRESS",
            progress_type: self.progress_type,
            status,
            message: message.as_ref(),
            batch_id: &self.batch_id,
            timestamp: Utc::now().to_rfc3339(),
            fields: &fields,
        };
        self.output.send_serialized(&record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn progress_record_shape() {
        let (output, mut rx) = OutputChannel::new();
        let emitter = ProgressEmitter::new(output, ProgressType::MacroEdit, "77");
        emitter.emit(
            "PROCESSING",
            "Edited macro 5",
            ProgressFields::total(10).with_macro(5),
        );

        let record = rx.recv().await.unwrap();
        assert_eq!(record["type"], json!("PROGRESS"));
        assert_eq!(record["progressType"], json!("MACRO_EDIT"));
        assert_eq!(record["status"], json!("PROCESSING"));
        assert_eq!(record["batchId"], json!("77"));
        assert_eq!(record["total"], json!(10));
        assert_eq!(record["macroId"], json!("5"));
        assert!(record.get("percentage").is_none());
        assert!(record["timestamp"].is_string());
    }

    #[test]
    fn send_after_receiver_dropped_is_swallowed() {
        let (output, rx) = OutputChannel::new();
        drop(rx);
        output.send(json!({ "status": "SUCCESS" }));
    }

    #[tokio::test]
    async fn writer_prints_one_line_per_record() {
        let (output, rx) = OutputChannel::new();
        let (client, mut server) = tokio::io::duplex(1024);
        let writer = spawn_writer(rx, client);

        output.send(json!({ "a": 1 }));
        output.send(json!({ "b": 2 }));
        drop(output);
        writer.await.unwrap();

        let mut text = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut server, &mut text)
            .await
            .unwrap();
        assert_eq!(text, "{\"a\":1}\n{\"b\":2}\n");
    }
}
