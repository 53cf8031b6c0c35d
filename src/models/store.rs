//! Document store for report records

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{AppResult, StoreError};
use crate::models::report::{ReportRecord, SubmitState};

/// Outcome of an update, mirroring matched/modified counts of a document store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched: usize,
    pub modified: usize,
}

/// Timestamps set on a report around a macro edit run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStamp {
    EditStart,
    EditEnd,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_report(&self, report_id: &str) -> AppResult<Option<ReportRecord>>;

    async fn upsert_report(&self, record: ReportRecord) -> AppResult<()>;

    async fn update_asset_state(
        &self,
        report_id: &str,
        macro_id: u64,
        state: SubmitState,
    ) -> AppResult<UpdateResult>;

    async fn mark_all_complete(&self, report_id: &str) -> AppResult<UpdateResult>;

    async fn stamp(
        &self,
        report_id: &str,
        stamp: ReportStamp,
        at: DateTime<Utc>,
    ) -> AppResult<UpdateResult>;
}

// ========== pure record updates shared by both stores ==========

fn apply_asset_state(record: &mut ReportRecord, macro_id: u64, state: SubmitState) -> UpdateResult {
    let mut result = UpdateResult::default();
    if let Some(asset) = record
        .asset_data
        .iter_mut()
        .find(|a| a.macro_id() == Some(macro_id))
    {
        result.matched = 1;
        if asset.submit_state != state {
            asset.submit_state = state;
            result.modified = 1;
            record.updated_at = Utc::now();
        }
    }
    result
}

fn apply_all_complete(record: &mut ReportRecord) -> UpdateResult {
    let mut modified = 0;
    for asset in &mut record.asset_data {
        if asset.submit_state != SubmitState::Complete {
            asset.submit_state = SubmitState::Complete;
            modified += 1;
        }
    }
    if modified > 0 {
        record.updated_at = Utc::now();
    }
    UpdateResult { matched: 1, modified: usize::from(modified > 0) }
}

fn apply_stamp(record: &mut ReportRecord, stamp: ReportStamp, at: DateTime<Utc>) -> UpdateResult {
    match stamp {
        ReportStamp::EditStart => record.edit_start_time = Some(at),
        ReportStamp::EditEnd => record.edit_end_time = Some(at),
    }
    record.updated_at = at;
    UpdateResult { matched: 1, modified: 1 }
}

/// In-process store
#[derive(Default)]
pub struct MemoryStore {
    reports: Mutex<HashMap<String, ReportRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn update<F>(&self, report_id: &str, f: F) -> AppResult<UpdateResult>
    where
        F: FnOnce(&mut ReportRecord) -> UpdateResult + Send,
    {
        let mut reports = self.reports.lock().await;
        Ok(match reports.get_mut(report_id) {
            Some(record) => f(record),
            None => UpdateResult::default(),
        })
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_report(&self, report_id: &str) -> AppResult<Option<ReportRecord>> {
        Ok(self.reports.lock().await.get(report_id).cloned())
    }

    async fn upsert_report(&self, record: ReportRecord) -> AppResult<()> {
        self.reports
            .lock()
            .await
            .insert(record.report_id.clone(), record);
        Ok(())
    }

    async fn update_asset_state(
        &self,
        report_id: &str,
        macro_id: u64,
        state: SubmitState,
    ) -> AppResult<UpdateResult> {
        self.update(report_id, |r| apply_asset_state(r, macro_id, state)).await
    }

    async fn mark_all_complete(&self, report_id: &str) -> AppResult<UpdateResult> {
        self.update(report_id, apply_all_complete).await
    }

    async fn stamp(
        &self,
        report_id: &str,
        stamp: ReportStamp,
        at: DateTime<Utc>,
    ) -> AppResult<UpdateResult> {
        self.update(report_id, |r| apply_stamp(r, stamp, at)).await
    }
}

/// One pretty-printed JSON document per report under `dir`.
///
/// Read-modify-write cycles are serialised by a single lock.
pub struct JsonFileStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub async fn open(dir: impl Into<PathBuf>) -> AppResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|source| StoreError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        info!("📁 report store at {}", dir.display());
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    /// File of one report. Ids are used verbatim, so only `[A-Za-z0-9_-]` is accepted.
    fn path_for(&self, report_id: &str) -> Result<PathBuf, StoreError> {
        let valid = !report_id.is_empty()
            && report_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidReportId(report_id.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", report_id)))
    }

    async fn read(&self, path: &Path) -> AppResult<Option<ReportRecord>> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.display().to_string(),
                    source,
                }
                .into())
            }
        };
        let record = serde_json::from_str(&content).map_err(|source| StoreError::Malformed {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Some(record))
    }

    async fn write(&self, path: &Path, record: &ReportRecord) -> AppResult<()> {
        let json = serde_json::to_string_pretty(record)?;
        fs::write(path, json).await.map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        debug!("wrote {}", path.display());
        Ok(())
    }

    async fn update<F>(&self, report_id: &str, f: F) -> AppResult<UpdateResult>
    where
        F: FnOnce(&mut ReportRecord) -> UpdateResult + Send,
    {
        let _guard = self.lock.lock().await;
        let path = self.path_for(report_id)?;
        let Some(mut record) = self.read(&path).await? else {
            return Ok(UpdateResult::default());
        };
        let result = f(&mut record);
        if result.modified > 0 {
            self.write(&path, &record).await?;
        }
        Ok(result)
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn find_report(&self, report_id: &str) -> AppResult<Option<ReportRecord>> {
        let _guard = self.lock.lock().await;
        self.read(&self.path_for(report_id)?).await
    }

    async fn upsert_report(&self, record: ReportRecord) -> AppResult<()> {
        let _guard = self.lock.lock().await;
        let path = self.path_for(&record.report_id)?;
        self.write(&path, &record).await
    }

    async fn update_asset_state(
        &self,
        report_id: &str,
        macro_id: u64,
        state: SubmitState,
    ) -> AppResult<UpdateResult> {
        self.update(report_id, |r| apply_asset_state(r, macro_id, state)).await
    }

    async fn mark_all_complete(&self, report_id: &str) -> AppResult<UpdateResult> {
        self.update(report_id, apply_all_complete).await
    }

    async fn stamp(
        &self,
        report_id: &str,
        stamp: ReportStamp,
        at: DateTime<Utc>,
    ) -> AppResult<UpdateResult> {
        self.update(report_id, |r| apply_stamp(r, stamp, at)).await
    }
}
