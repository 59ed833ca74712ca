pub mod config;
pub mod reminder;
pub mod run;
pub mod settings;

use std::sync::Arc;

use beetminder_core::error::Result;
use beetminder_core::{Config, Database, MemoryStore, ReminderEngine, SharedStore};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::terminal::TerminalTrigger;

/// Open the on-disk store, falling back to memory so commands still work
/// when the database is unavailable.
pub fn open_store() -> SharedStore {
    match Database::open() {
        Ok(db) => Arc::new(db),
        Err(e) => {
            tracing::warn!(error = %e, "database unavailable, state will not persist");
            Arc::new(MemoryStore::new())
        }
    }
}

pub fn open_engine(config: &Config, now: DateTime<Utc>) -> ReminderEngine {
    let trigger = TerminalTrigger::new(config.notifications.clone());
    let text = trigger.alert_text();
    ReminderEngine::init(open_store(), Box::new(trigger), now).with_alert_text(text)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
