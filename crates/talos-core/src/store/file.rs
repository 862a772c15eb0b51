//! File-backed store
//!
//! The whole state is held in memory and rewritten to a JSON file after
//! every mutation (temporary file + rename, so readers never observe a torn
//! write). A sibling `.lock` file is held with an exclusive lock for the
//! lifetime of the store, so two daemons cannot share one state file.

use super::state::StoreState;
use super::Store;
use crate::error::{Error, Result};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use fs4::fs_std::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// Store persisted as a single JSON document
pub struct FileStore {
    path: Utf8PathBuf,
    state: Mutex<StoreState>,
    // Held for the exclusive lock; released on drop
    _lock: File,
}

impl FileStore {
    /// Open (or create) the store at `path`, waiting for the exclusive lock
    pub fn open(path: impl Into<Utf8PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock_path = Utf8PathBuf::from(format!("{}.lock", path));
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        lock.lock_exclusive()
            .map_err(|e| Error::store(format!("Failed to lock {}: {}", lock_path, e)))?;

        let state = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                StoreState::default()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            StoreState::default()
        };

        debug!("Opened file store at {}", path);

        Ok(Self {
            path,
            state: Mutex::new(state),
            _lock: lock,
        })
    }

    /// Location of the state file
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn state(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| Error::store("file store mutex poisoned"))
    }

    /// Apply a mutation and persist the resulting state
    fn mutate<T>(&self, op: impl FnOnce(&mut StoreState) -> T) -> Result<T> {
        let mut state = self.state()?;
        let result = op(&mut state);
        state.purge_expired(Utc::now());
        self.persist(&state)?;
        Ok(result)
    }

    fn persist(&self, state: &StoreState) -> Result<()> {
        let dir = self.path.parent().unwrap_or(Utf8Path::new("."));
        let json = serde_json::to_vec(state)?;
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(&json)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path)
            .map_err(|e| Error::store(format!("Failed to persist {}: {}", self.path, e)))?;
        Ok(())
    }
}

#[async_trait]
impl Store for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.state()?.get(key, Utc::now()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.mutate(|s| s.set(key, value, ttl, Utc::now()))
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool> {
        self.mutate(|s| s.set_if_absent(key, value, ttl, Utc::now()))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.mutate(|s| s.delete(key, Utc::now()))
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        self.mutate(|s| s.set_add(key, member))
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool> {
        self.mutate(|s| s.set_remove(key, member))
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        Ok(self.state()?.set_members(key))
    }

    async fn sorted_add(&self, key: &str, member: &str, score: f64) -> Result<()> {
        self.mutate(|s| s.sorted_add(key, member, score))
    }

    async fn sorted_count_by_score(&self, key: &str, min: f64, max: f64) -> Result<u64> {
        Ok(self.state()?.sorted_count_by_score(key, min, max))
    }

    async fn sorted_remove_by_score(&self, key: &str, min: f64, max: f64) -> Result<u64> {
        self.mutate(|s| s.sorted_remove_by_score(key, min, max))
    }
}
