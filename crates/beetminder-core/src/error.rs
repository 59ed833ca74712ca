//! Core error types for beetminder-core.
//!
//! Most failures in this crate are recovered locally: store errors are
//! logged and swallowed, malformed records are skipped. Only settings
//! validation and debounced reports reach the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for beetminder-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Key-value store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Rejected report
    #[error("Report rejected: {0}")]
    Report(#[from] ReportError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by a [`KvStore`](crate::storage::KvStore) backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the backing database
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Read failed
    #[error("Read of '{key}' failed: {message}")]
    ReadFailed { key: String, message: String },

    /// Write failed
    #[error("Write of '{key}' failed: {message}")]
    WriteFailed { key: String, message: String },

    /// Database is locked
    #[error("Store is locked")]
    Locked,

    /// Could not resolve the data directory
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Settings validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Field did not parse as a finite number
    #[error("'{field}' is not a finite number: {input:?}")]
    NotANumber { field: &'static str, input: String },

    /// Reminder delay must be strictly positive
    #[error("reminder delay must be greater than zero hours (got {0})")]
    NonPositiveDelay(f64),

    /// Cooldown must not be negative
    #[error("cooldown must be zero or more minutes (got {0})")]
    NegativeCooldown(f64),

    /// Value beyond the supported range
    #[error("'{field}' is too large (got {value})")]
    TooLarge { field: &'static str, value: f64 },
}

/// Outcome of a report that the debounce gate refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportError {
    /// Still inside the cooldown window
    #[error("still cooling down, {remaining_ms} ms left")]
    Debounced { remaining_ms: u64 },

    /// Fire time not representable
    #[error("fire time out of range")]
    OutOfRange,
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
