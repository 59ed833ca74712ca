mod config;
pub mod database;

pub use config::{Config, LoggingConfig, NotificationsConfig, SchedulerConfig};
pub use database::Database;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::error::StoreError;

/// Key holding the serialized [`Settings`](crate::settings::Settings) record.
pub const SETTINGS_KEY: &str = "beetminder-settings";
/// Key holding the serialized reminder ledger.
pub const EVENTS_KEY: &str = "beetminder-events";

/// Minimal string key-value contract the engine persists through.
///
/// Backends may fail; callers in this crate go through [`read_best_effort`]
/// and [`write_best_effort`], which log and swallow the error.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

pub type SharedStore = Arc<dyn KvStore>;

/// Read `key`, treating any backend failure as absence.
pub fn read_best_effort(store: &dyn KvStore, key: &str) -> Option<String> {
    match store.get(key) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, error = %e, "store read failed, continuing without persisted value");
            None
        }
    }
}

/// Write `key`, logging any backend failure. Returns whether the write landed.
pub fn write_best_effort(store: &dyn KvStore, key: &str, value: &str) -> bool {
    match store.set(key, value) {
        Ok(()) => {
            tracing::debug!(key, bytes = value.len(), "persisted");
            true
        }
        Err(e) => {
            tracing::warn!(key, error = %e, "store write failed, keeping in-memory state only");
            false
        }
    }
}

/// In-process store. Nothing survives the process; used by tests and as a
/// fallback when the on-disk database cannot be opened.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|e| StoreError::ReadFailed {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|e| StoreError::WriteFailed {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Returns the data directory, creating it if needed.
///
/// `BEETMINDER_DATA_DIR` overrides the location outright. Otherwise this is
/// `~/.config/beetminder[-dev]/`, with `BEETMINDER_ENV=dev` selecting the
/// development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, StoreError> {
    let dir = data_dir_path();
    std::fs::create_dir_all(&dir)
        .map_err(|e| StoreError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

/// Where [`data_dir`] points, without creating it.
pub fn data_dir_path() -> PathBuf {
    match std::env::var_os("BEETMINDER_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("BEETMINDER_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("beetminder-dev")
            } else {
                base_dir.join("beetminder")
            }
        }
    }
}
