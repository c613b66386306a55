//! Durable record of which facts are complete.
//!
//! The checkpoint directory holds three files:
//!
//! - `review.lock`: exclusive run lock, held for the lifetime of a [`CheckpointStore`].
//! - `checkpoint.log`: append-only, checksummed entries, `fsync`ed one by one.
//! - `checkpoint.json`: periodic snapshot, written to a temp file and renamed
//!   into place, after which the log is truncated.
//!
//! Loading replays the log on top of the snapshot. Replay is idempotent, so a crash
//! between writing a snapshot and truncating the log only replays entries twice.

pub mod error;
mod journal;

#[cfg(test)]
mod tests;

pub use error::{CheckpointError, CheckpointResult};

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::assessment::Assessment;
use crate::constants::DEFAULT_SNAPSHOT_INTERVAL;
use journal::LogEntry;

pub const LOCK_FILE: &str = "review.lock";
pub const LOG_FILE: &str = "checkpoint.log";
pub const SNAPSHOT_FILE: &str = "checkpoint.json";

/// Completed assessments and publish markers.
///
/// The completed id set is exactly the key set of `completed`, so an id can never
/// be complete without its assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub completed: BTreeMap<u32, Assessment>,
    pub published: BTreeSet<u32>,
    pub run_started_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl CheckpointRecord {
    fn empty(at: DateTime<Utc>) -> Self {
        Self {
            completed: BTreeMap::new(),
            published: BTreeSet::new(),
            run_started_at: at,
            last_updated_at: at,
        }
    }

    pub fn is_complete(&self, fact_id: u32) -> bool {
        self.completed.contains_key(&fact_id)
    }

    /// Committed ids without a publish marker, ascending.
    pub fn unpublished(&self) -> Vec<u32> {
        self.completed
            .keys()
            .filter(|id| !self.published.contains(id))
            .copied()
            .collect()
    }

    fn apply(&mut self, entry: LogEntry) {
        self.last_updated_at = entry.at();
        match entry {
            LogEntry::Started { at } => self.run_started_at = at,
            LogEntry::Commit { assessment, .. } => {
                self.completed
                    .entry(assessment.fact_id)
                    .or_insert(assessment);
            }
            LogEntry::Published { fact_id, .. } => {
                if self.completed.contains_key(&fact_id) {
                    self.published.insert(fact_id);
                }
            }
            LogEntry::Reset { fact_id, .. } => {
                self.completed.remove(&fact_id);
                self.published.remove(&fact_id);
            }
        }
    }
}

/// Exclusive, writable handle on a checkpoint directory.
#[derive(Debug)]
pub struct CheckpointStore {
    dir: PathBuf,
    record: CheckpointRecord,
    log: File,
    snapshot_interval: u32,
    commits_since_snapshot: u32,
    _lock: File,
}

impl CheckpointStore {
    /// Opens (creating if needed) the checkpoint in `dir` and takes the run lock.
    pub fn open(dir: impl AsRef<Path>) -> CheckpointResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let lock_path = dir.join(LOCK_FILE);
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)?;
        match lock.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                return Err(CheckpointError::Locked { path: lock_path });
            }
            Err(TryLockError::Error(e)) => return Err(e.into()),
        }

        let log_path = dir.join(LOG_FILE);
        let mut log = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&log_path)?;

        let snapshot = read_snapshot(&dir)?;
        let mut bytes = Vec::new();
        log.read_to_end(&mut bytes)?;
        let replay = journal::parse(&bytes, &log_path)?;

        if replay.torn {
            warn!(
                path = %log_path.display(),
                kept_bytes = replay.valid_len,
                dropped_bytes = bytes.len() as u64 - replay.valid_len,
                "Discarding torn checkpoint log tail"
            );
            log.set_len(replay.valid_len)?;
            log.sync_data()?;
        }

        let fresh = snapshot.is_none() && replay.entries.is_empty();
        let now = Utc::now();
        let mut record = snapshot.unwrap_or_else(|| CheckpointRecord::empty(now));
        let replayed = replay.entries.len();
        for entry in replay.entries {
            record.apply(entry);
        }

        let mut store = Self {
            dir,
            record,
            log,
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            commits_since_snapshot: 0,
            _lock: lock,
        };

        if fresh {
            store.append(LogEntry::Started { at: now })?;
        }

        info!(
            dir = %store.dir.display(),
            completed = store.record.completed.len(),
            published = store.record.published.len(),
            replayed,
            "Checkpoint opened"
        );
        Ok(store)
    }

    /// Reads the checkpoint in `dir` without taking the lock or repairing the log.
    pub fn load(dir: impl AsRef<Path>) -> CheckpointResult<CheckpointRecord> {
        let dir = dir.as_ref();
        let log_path = dir.join(LOG_FILE);
        let mut record =
            read_snapshot(dir)?.unwrap_or_else(|| CheckpointRecord::empty(Utc::now()));

        if log_path.exists() {
            let bytes = fs::read(&log_path)?;
            for entry in journal::parse(&bytes, &log_path)?.entries {
                record.apply(entry);
            }
        }
        Ok(record)
    }

    /// Commits between automatic snapshots. Clamped to at least 1.
    pub fn with_snapshot_interval(mut self, interval: u32) -> Self {
        self.snapshot_interval = interval.max(1);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record(&self) -> &CheckpointRecord {
        &self.record
    }

    pub fn is_complete(&self, fact_id: u32) -> bool {
        self.record.is_complete(fact_id)
    }

    pub fn assessment(&self, fact_id: u32) -> Option<&Assessment> {
        self.record.completed.get(&fact_id)
    }

    pub fn completed_count(&self) -> usize {
        self.record.completed.len()
    }

    pub fn unpublished(&self) -> Vec<u32> {
        self.record.unpublished()
    }

    /// Durably marks `fact_id` complete with `assessment`.
    ///
    /// Committing an id that is already complete changes nothing and returns the
    /// assessment stored first.
    pub fn commit(
        &mut self,
        fact_id: u32,
        assessment: Assessment,
    ) -> CheckpointResult<Assessment> {
        if assessment.fact_id != fact_id {
            return Err(CheckpointError::FactMismatch {
                expected: fact_id,
                actual: assessment.fact_id,
            });
        }
        if let Some(prior) = self.record.completed.get(&fact_id) {
            debug!(fact_id, "Fact already committed, keeping prior assessment");
            return Ok(prior.clone());
        }

        self.append(LogEntry::Commit {
            at: Utc::now(),
            assessment: assessment.clone(),
        })?;
        debug!(fact_id, score = assessment.score, "Committed assessment");

        self.commits_since_snapshot += 1;
        if self.commits_since_snapshot >= self.snapshot_interval {
            self.snapshot()?;
        }
        Ok(assessment)
    }

    pub fn mark_published(&mut self, fact_id: u32) -> CheckpointResult<()> {
        if !self.record.is_complete(fact_id) {
            return Err(CheckpointError::NotCommitted { fact_id });
        }
        if self.record.published.contains(&fact_id) {
            return Ok(());
        }
        self.append(LogEntry::Published {
            at: Utc::now(),
            fact_id,
        })
    }

    /// Forgets the completion and publish marker of `fact_id`. Returns whether it was complete.
    pub fn reset(&mut self, fact_id: u32) -> CheckpointResult<bool> {
        if !self.record.is_complete(fact_id) {
            return Ok(false);
        }
        self.append(LogEntry::Reset {
            at: Utc::now(),
            fact_id,
        })?;
        info!(fact_id, "Reset fact for re-review");
        Ok(true)
    }

    /// Writes the full record to `checkpoint.json` and truncates the log.
    pub fn snapshot(&mut self) -> CheckpointResult<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer_pretty(&mut tmp, &self.record)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.dir.join(SNAPSHOT_FILE)).map_err(|e| e.error)?;
        sync_dir(&self.dir)?;

        self.log.set_len(0)?;
        self.log.sync_data()?;
        self.commits_since_snapshot = 0;

        info!(
            completed = self.record.completed.len(),
            published = self.record.published.len(),
            "Checkpoint snapshot written"
        );
        Ok(())
    }

    /// Persists `entry`, then applies it in memory.
    fn append(&mut self, entry: LogEntry) -> CheckpointResult<()> {
        let line = journal::encode(&entry)?;
        self.log.write_all(line.as_bytes())?;
        self.log.sync_data()?;
        self.record.apply(entry);
        Ok(())
    }
}

fn read_snapshot(dir: &Path) -> CheckpointResult<Option<CheckpointRecord>> {
    let path = dir.join(SNAPSHOT_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(&path)?;
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| CheckpointError::CorruptSnapshot {
            path,
            reason: e.to_string(),
        })
}

fn sync_dir(dir: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    File::open(dir)?.sync_all()?;
    #[cfg(not(unix))]
    let _ = dir;
    Ok(())
}
