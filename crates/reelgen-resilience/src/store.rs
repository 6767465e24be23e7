//! Health record storage.

use async_trait::async_trait;
use reelgen_models::ServiceHealthRecord;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use crate::error::ResilienceResult;

/// Append-only store of health records.
#[async_trait]
pub trait HealthRecordStore: Send + Sync {
    async fn append(&self, record: &ServiceHealthRecord) -> ResilienceResult<()>;

    /// All records, oldest first, optionally for one service.
    async fn records(&self, service: Option<&str>) -> ResilienceResult<Vec<ServiceHealthRecord>>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryHealthStore {
    records: RwLock<Vec<ServiceHealthRecord>>,
}

impl InMemoryHealthStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl HealthRecordStore for InMemoryHealthStore {
    async fn append(&self, record: &ServiceHealthRecord) -> ResilienceResult<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn records(&self, service: Option<&str>) -> ResilienceResult<Vec<ServiceHealthRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| service.map_or(true, |s| r.service == s))
            .cloned()
            .collect())
    }
}

/// One JSON object per line, appended to a file.
#[derive(Debug)]
pub struct JsonLinesHealthStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesHealthStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HealthRecordStore for JsonLinesHealthStore {
    async fn append(&self, record: &ServiceHealthRecord) -> ResilienceResult<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn records(&self, service: Option<&str>) -> ResilienceResult<Vec<ServiceHealthRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ServiceHealthRecord>(line) {
                Ok(record) if service.map_or(true, |s| record.service == s) => records.push(record),
                Ok(_) => {}
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping malformed health record"
                ),
            }
        }
        Ok(records)
    }
}
