//! # Beetminder Core Library
//!
//! Core logic for Beetminder, a personal reminder engine: report an event,
//! get reminded a configurable number of hours later. Repeat reports inside
//! a cooldown window are refused, and all state survives restarts.
//!
//! ## Architecture
//!
//! - **Engine**: a wall-clock state machine; every operation takes `now` and
//!   the caller invokes `tick()` about once per second
//! - **Scheduler**: cancellable tokio task that drives `tick()`
//! - **Storage**: abstract key-value store with SQLite and in-memory
//!   backends, plus TOML application configuration
//!
//! ## Key Components
//!
//! - [`ReminderEngine`]: settings, ledger, debounce and alert in one context
//! - [`EventLedger`]: persisted list of scheduled reminders
//! - [`TickScheduler`]: periodic driver with deterministic shutdown
//! - [`KvStore`]: persistence contract

pub mod debounce;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod scheduler;
pub mod settings;
pub mod storage;
pub mod trigger;

pub use debounce::DebounceState;
pub use engine::ReminderEngine;
pub use error::{ConfigError, CoreError, ReportError, StoreError, ValidationError};
pub use events::{Event, ReminderView};
pub use ledger::{EventLedger, ReminderEvent, RestoreReport, TickResult};
pub use scheduler::{SharedEngine, TickHandle, TickScheduler};
pub use settings::{Settings, SettingsCandidate, SettingsStore};
pub use storage::{Config, Database, KvStore, MemoryStore, SharedStore};
pub use trigger::{AlertState, AlertText, LogTrigger, ReminderTrigger};
