//! Append-only JSONL checkpoint for evaluation records
//!
//! One record per line. Appends are serialized through a mutex and synced
//! before returning, so a crash loses at most the record being written.
//! A torn trailing line is tolerated on load and fenced off on open.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::errors::{PipelineError, Result};
use crate::evaluation::dataset::EvaluationRecord;

/// Single-writer checkpoint store
pub struct CheckpointStore {
    path: PathBuf,
    file: Mutex<File>,
}

impl CheckpointStore {
    /// Open (or create) the checkpoint at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        // Keep a torn last line from merging with the next append
        if let Ok(existing) = fs::read(&path).await {
            if existing.last().map_or(false, |b| *b != b'\n') {
                warn!(path = %path.display(), "checkpoint ends mid-record, fencing it off");
                let mut file = OpenOptions::new().append(true).open(&path).await?;
                file.write_all(b"\n").await?;
                file.sync_data().await?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and sync it to disk
    pub async fn append(&self, record: &EvaluationRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        file.sync_data().await?;

        debug!(id = %record.id, success = record.success, "record checkpointed");
        Ok(())
    }

    /// All readable records, in write order
    pub async fn load_records(&self) -> Result<Vec<EvaluationRecord>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(PipelineError::Checkpoint(format!(
                    "cannot read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let mut records = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<EvaluationRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(line = line_no + 1, error = %e, "skipping unreadable checkpoint line"),
            }
        }
        Ok(records)
    }

    /// Identifiers with a record, successful or not
    pub async fn completed_ids(&self) -> Result<HashSet<String>> {
        Ok(self
            .load_records()
            .await?
            .into_iter()
            .map(|record| record.id)
            .collect())
    }

    /// Drop every record
    pub async fn reset(&self) -> Result<()> {
        let file = self.file.lock().await;
        file.set_len(0).await?;
        file.sync_data().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::dataset::EvalQuestion;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn record(id: &str) -> EvaluationRecord {
        EvaluationRecord::failed(&EvalQuestion::new(id, "question"), "boom", 1)
    }

    #[tokio::test]
    async fn test_append_and_load() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open(dir.path().join("nested/run.jsonl")).await.unwrap();

        store.append(&record("a")).await.unwrap();
        store.append(&record("b")).await.unwrap();

        let records = store.load_records().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "a");
        let ids = store.completed_ids().await.unwrap();
        assert!(ids.contains("a") && ids.contains("b"));
    }

    #[tokio::test]
    async fn test_reopen_keeps_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.jsonl");
        {
            let store = CheckpointStore::open(&path).await.unwrap();
            store.append(&record("a")).await.unwrap();
        }
        let store = CheckpointStore::open(&path).await.unwrap();
        store.append(&record("b")).await.unwrap();
        assert_eq!(store.load_records().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_torn_line_is_skipped_and_fenced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.jsonl");
        let full = serde_json::to_string(&record("a")).unwrap();
        std::fs::write(&path, format!("{}\n{{\"id\": \"b\", \"quest", full)).unwrap();

        let store = CheckpointStore::open(&path).await.unwrap();
        store.append(&record("c")).await.unwrap();

        let ids: Vec<String> = store
            .load_records()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_boundaries() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(CheckpointStore::open(dir.path().join("run.jsonl")).await.unwrap());

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.append(&record(&format!("q{}", i))).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.completed_ids().await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_reset() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open(dir.path().join("run.jsonl")).await.unwrap();
        store.append(&record("a")).await.unwrap();
        store.reset().await.unwrap();
        assert!(store.load_records().await.unwrap().is_empty());
        store.append(&record("b")).await.unwrap();
        assert_eq!(store.load_records().await.unwrap().len(), 1);
    }
}
