//! Durable failure store
//!
//! An append-only, deduplicated JSON collection of `FailureRecord`s, safe
//! under concurrent appends from parallel test workers. Writes take an
//! exclusive file lock for the duration of a read-modify-write cycle, with
//! bounded retry before surfacing `StoreError::Unavailable`.
//!
//! The persisted shape is a pretty-printed JSON array with stable field
//! names so artifact tooling can consume it without coupling to locheal.

use crate::config::{DedupScope, HealConfig};
use crate::record::FailureRecord;
use crate::util::write_atomic;
use fs2::FileExt;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Lock acquisition attempts before giving up.
const LOCK_ATTEMPTS: u32 = 5;
/// Initial backoff between attempts; doubles each retry.
const LOCK_BACKOFF_MS: u64 = 50;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failure store busy after {0} lock attempts")]
    Unavailable(u32),
    #[error("failure store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failure store is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

/// Outcome of an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Accepted,
    /// A record with the same (locator, file, line) key is already stored.
    Duplicate,
}

pub struct FailureStore {
    path: PathBuf,
}

struct StoreLock {
    file: fs::File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl FailureStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Open the store at the start of a test session, honoring the
    /// configured dedup scope: per-run suppression truncates the file so
    /// keys from earlier runs cannot suppress fresh captures.
    pub fn open_session(config: &HealConfig) -> Result<Self, StoreError> {
        let store = Self::new(config.store_path.clone());
        if config.dedup_scope == DedupScope::PerRun {
            store.reset()?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record unless its dedup key is already present.
    ///
    /// Holds the exclusive lock only for the read-modify-write cycle; any
    /// slow work (oracle calls, source resolution) must happen before this
    /// is invoked.
    pub fn append(&self, record: &FailureRecord) -> Result<AppendOutcome, StoreError> {
        let _lock = self.lock()?;

        let mut records = self.read_unlocked()?;
        let keys: HashSet<_> = records.iter().map(FailureRecord::dedup_key).collect();
        if keys.contains(&record.dedup_key()) {
            return Ok(AppendOutcome::Duplicate);
        }

        records.push(record.clone());
        self.write_unlocked(&records)?;
        Ok(AppendOutcome::Accepted)
    }

    /// Read every persisted record in append order.
    pub fn read_all(&self) -> Result<Vec<FailureRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let _lock = self.lock()?;
        self.read_unlocked()
    }

    /// Truncate the store. Called once at session start when duplicate
    /// suppression is scoped to a single run.
    pub fn reset(&self) -> Result<(), StoreError> {
        let _lock = self.lock()?;
        self.write_unlocked(&[])
    }

    fn read_unlocked(&self) -> Result<Vec<FailureRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_unlocked(&self, records: &[FailureRecord]) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(records)?;
        write_atomic(&self.path, &content).map_err(|e| StoreError::Other(e.to_string()))
    }

    /// Acquire the exclusive store lock with bounded exponential backoff.
    ///
    /// The lock lives on a sibling `.lock` file rather than the store file
    /// itself: atomic writes replace the store via rename, which would
    /// silently drop a lock held on the old inode.
    fn lock(&self) -> Result<StoreLock, StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        let mut backoff = Duration::from_millis(LOCK_BACKOFF_MS);
        for attempt in 1..=LOCK_ATTEMPTS {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => return Ok(StoreLock { file }),
                Err(err) => {
                    if err.kind() != ErrorKind::WouldBlock {
                        return Err(err.into());
                    }
                    if attempt == LOCK_ATTEMPTS {
                        break;
                    }
                    std::thread::sleep(backoff);
                    backoff *= 2;
                }
            }
        }
        Err(StoreError::Unavailable(LOCK_ATTEMPTS))
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store".to_string());
        name.push_str(".lock");
        self.path.with_file_name(name)
    }
}
