// Copyright (c) 2025 - Cowboy AI, Inc.
//! Commit Journal
//!
//! Durable, append-only log of committed transactions. A transaction is
//! appended before it becomes visible; replaying the journal in sequence
//! order rebuilds the committed inventory.
//!
//! # Journal Requirements
//!
//! 1. **Append-Only**: records are never rewritten
//! 2. **Ordered**: `sequence` increases by one per commit
//! 3. **Atomic**: a record is either fully appended or the append fails
//! 4. **Replay**: records read back in append order
//!
//! # Example
//!
//! ```rust,no_run
//! use cim_inventory::store::{FileJournal, Journal};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let journal = FileJournal::new("/var/lib/inventory/journal.jsonl", true);
//!     let records = journal.replay().await?;
//!     println!("{} committed transactions", records.len());
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{Entity, EntityId};
use crate::errors::{InventoryError, InventoryResult};

/// One whole-record write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "record", rename_all = "snake_case")]
pub enum Change {
    Put(Entity),
    Delete(EntityId),
}

impl Change {
    pub fn id(&self) -> EntityId {
        match self {
            Change::Put(entity) => entity.id(),
            Change::Delete(id) => *id,
        }
    }
}

/// Writes of one committed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Position in the journal, starting at 1
    pub sequence: u64,
    pub commit_id: Uuid,
    pub committed_at: DateTime<Utc>,
    /// Operation that produced the writes, e.g. `create_host`
    pub operation: String,
    pub changes: Vec<Change>,
}

impl CommitRecord {
    pub fn new(sequence: u64, operation: impl Into<String>, changes: Vec<Change>) -> Self {
        Self {
            sequence,
            commit_id: Uuid::now_v7(),
            committed_at: Utc::now(),
            operation: operation.into(),
            changes,
        }
    }
}

/// Journal trait for persisting committed transactions
///
/// Implementations should ensure:
///
/// - **Atomicity**: a failed append leaves no partial record behind
/// - **Durability**: appended records survive restarts
#[async_trait]
pub trait Journal: Send + Sync {
    /// Append one committed transaction
    ///
    /// # Errors
    ///
    /// - `StorageError` if writing to storage fails
    async fn append(&self, record: &CommitRecord) -> InventoryResult<()>;

    /// Read every record in append order
    async fn replay(&self) -> InventoryResult<Vec<CommitRecord>>;
}

/// In-process journal; the default when no path is configured
#[derive(Debug, Default)]
pub struct MemoryJournal {
    records: Mutex<Vec<CommitRecord>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Journal for MemoryJournal {
    async fn append(&self, record: &CommitRecord) -> InventoryResult<()> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }

    async fn replay(&self) -> InventoryResult<Vec<CommitRecord>> {
        Ok(self.records.lock().await.clone())
    }
}

/// JSON-lines journal file, one record per line
#[derive(Debug)]
pub struct FileJournal {
    path: PathBuf,
    sync: bool,
    file: Mutex<Option<File>>,
    #[cfg(test)]
    fail_next_flush: std::sync::atomic::AtomicBool,
}

impl FileJournal {
    /// Journal at `path`; `sync` flushes to disk after every append
    pub fn new(path: impl Into<PathBuf>, sync: bool) -> Self {
        Self {
            path: path.into(),
            sync,
            file: Mutex::new(None),
            #[cfg(test)]
            fail_next_flush: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open for appending, cutting off a torn record left by a crash
    async fn open_for_append(&self) -> InventoryResult<File> {
        let handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        let raw = tokio::fs::read(&self.path).await?;
        let keep = raw.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);
        if keep < raw.len() {
            warn!(
                "Dropping {} bytes of torn record at the end of {}",
                raw.len() - keep,
                self.path.display()
            );
            handle.set_len(keep as u64).await?;
        }

        info!("Opened journal {}", self.path.display());
        Ok(handle)
    }

    async fn write_line(&self, handle: &mut File, line: &[u8]) -> std::io::Result<()> {
        handle.write_all(line).await?;
        handle.flush().await?;
        #[cfg(test)]
        if self
            .fail_next_flush
            .swap(false, std::sync::atomic::Ordering::SeqCst)
        {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected flush failure",
            ));
        }
        if self.sync {
            handle.sync_data().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Journal for FileJournal {
    async fn append(&self, record: &CommitRecord) -> InventoryResult<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        if file.is_none() {
            *file = Some(self.open_for_append().await?);
        }
        let Some(handle) = file.as_mut() else {
            return Err(InventoryError::StorageError(format!(
                "{} is not open",
                self.path.display()
            )));
        };

        // Anything past `start` belongs to this record until the write completes.
        let start = handle.metadata().await?.len();
        if let Err(err) = self.write_line(handle, &line).await {
            warn!(
                "Append of commit {} to {} failed, truncating to {} bytes: {}",
                record.sequence,
                self.path.display(),
                start,
                err
            );
            if let Err(rewind) = handle.set_len(start).await {
                error!("Could not truncate {}: {}", self.path.display(), rewind);
            }
            *file = None;
            return Err(err.into());
        }

        debug!(
            "Journaled commit {} ({}, {} changes)",
            record.sequence,
            record.operation,
            record.changes.len()
        );
        Ok(())
    }

    async fn replay(&self) -> InventoryResult<Vec<CommitRecord>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        // Only the final line can be torn, and only when it lacks its newline.
        let torn_tail = !raw.is_empty() && !raw.ends_with('\n');
        let lines: Vec<&str> = raw.lines().collect();
        let last = lines.len().saturating_sub(1);

        let mut records = Vec::with_capacity(lines.len());
        for (number, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(err) if torn_tail && number == last => {
                    warn!(
                        "Ignoring torn record at {} line {}: {}",
                        self.path.display(),
                        number + 1,
                        err
                    );
                }
                Err(err) => {
                    return Err(InventoryError::StorageError(format!(
                        "{} line {}: {}",
                        self.path.display(),
                        number + 1,
                        err
                    )))
                }
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Datacenter, DatacenterId};
    use pretty_assertions::assert_eq;

    fn record(sequence: u64) -> CommitRecord {
        let dc = Datacenter {
            id: DatacenterId::new(),
            name: format!("D{}", sequence),
            height: 42,
            rooms_count: 0,
            racks_count: 0,
            hosts_count: 0,
        };
        CommitRecord::new(
            sequence,
            "create_datacenter",
            vec![Change::Put(Entity::Datacenter(dc))],
        )
    }

    #[tokio::test]
    async fn test_memory_journal_replays_in_order() {
        let journal = MemoryJournal::new();
        journal.append(&record(1)).await.unwrap();
        journal.append(&record(2)).await.unwrap();

        let sequences: Vec<u64> = journal
            .replay()
            .await
            .unwrap()
            .iter()
            .map(|r| r.sequence)
            .collect();
        assert_eq!(sequences, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_file_journal_round_trip() {
        let path = std::env::temp_dir().join(format!("inventory-journal-{}.jsonl", Uuid::now_v7()));
        let journal = FileJournal::new(&path, true);
        assert!(journal.replay().await.unwrap().is_empty());

        let first = record(1);
        let second = record(2);
        journal.append(&first).await.unwrap();
        journal.append(&second).await.unwrap();

        let reopened = FileJournal::new(&path, false);
        assert_eq!(reopened.replay().await.unwrap(), vec![first, second]);

        let _ = std::fs::remove_file(&path);
    }

    fn journal_path() -> PathBuf {
        std::env::temp_dir().join(format!("inventory-journal-{}.jsonl", Uuid::now_v7()))
    }

    #[tokio::test]
    async fn test_failed_append_leaves_no_partial_record() {
        let path = journal_path();
        let journal = FileJournal::new(&path, true);
        let first = record(1);
        journal.append(&first).await.unwrap();

        journal
            .fail_next_flush
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let failed = journal.append(&record(2)).await;
        assert!(matches!(failed, Err(InventoryError::StorageError(_))));
        assert_eq!(journal.replay().await.unwrap(), vec![first.clone()]);

        // The same sequence is reused by the retried commit.
        let retried = record(2);
        journal.append(&retried).await.unwrap();
        let reopened = FileJournal::new(&path, false);
        assert_eq!(reopened.replay().await.unwrap(), vec![first, retried]);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_engine_reopens_after_failed_append() {
        use crate::domain::NewDatacenter;
        use crate::{EngineConfig, InventoryEngine};
        use std::sync::Arc;

        let path = journal_path();
        let journal = Arc::new(FileJournal::new(&path, true));
        let engine = InventoryEngine::open(EngineConfig::default(), journal.clone())
            .await
            .unwrap();
        engine.create_datacenter(NewDatacenter::new("D1")).await.unwrap();
        engine.create_datacenter(NewDatacenter::new("D2")).await.unwrap();

        journal
            .fail_next_flush
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let failed = engine.create_datacenter(NewDatacenter::new("D3")).await;
        assert!(matches!(failed, Err(InventoryError::StorageError(_))));
        assert_eq!(engine.version().await, 2);

        let reopened = InventoryEngine::open(
            EngineConfig::default(),
            Arc::new(FileJournal::new(&path, false)),
        )
        .await
        .unwrap();
        assert_eq!(reopened.snapshot().await, engine.snapshot().await);

        engine.create_datacenter(NewDatacenter::new("D3")).await.unwrap();
        let reopened = InventoryEngine::open(
            EngineConfig::default(),
            Arc::new(FileJournal::new(&path, false)),
        )
        .await
        .unwrap();
        assert_eq!(reopened.version().await, 3);
        assert_eq!(reopened.snapshot().await, engine.snapshot().await);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_torn_tail_is_dropped_and_overwritten() {
        let path = journal_path();
        let first = record(1);
        FileJournal::new(&path, false).append(&first).await.unwrap();

        let mut raw = std::fs::read(&path).unwrap();
        raw.extend_from_slice(br#"{"sequence":2,"commit_id":"#);
        std::fs::write(&path, &raw).unwrap();

        let journal = FileJournal::new(&path, false);
        assert_eq!(journal.replay().await.unwrap(), vec![first.clone()]);

        let second = record(2);
        journal.append(&second).await.unwrap();
        assert_eq!(journal.replay().await.unwrap(), vec![first, second]);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_corrupt_middle_line_is_still_an_error() {
        let path = journal_path();
        let mut raw = b"{broken}\n".to_vec();
        raw.extend_from_slice(&serde_json::to_vec(&record(1)).unwrap());
        raw.push(b'\n');
        std::fs::write(&path, &raw).unwrap();

        let result = FileJournal::new(&path, false).replay().await;
        assert!(matches!(result, Err(InventoryError::StorageError(_))));

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_corrupt_line_is_a_storage_error() {
        let path = std::env::temp_dir().join(format!("inventory-journal-{}.jsonl", Uuid::now_v7()));
        std::fs::write(&path, "{not json}\n").unwrap();

        let result = FileJournal::new(&path, false).replay().await;
        assert!(matches!(result, Err(InventoryError::StorageError(_))));

        let _ = std::fs::remove_file(&path);
    }
}
