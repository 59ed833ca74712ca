//! The reminder ledger.
//!
//! An ordered list of scheduled reminders, persisted as one JSON array
//! whenever its membership changes. The ledger is the only owner of
//! [`ReminderEvent`] values; everything else sees clones.
//!
//! ## Lifecycle of an entry
//!
//! ```text
//! append -> (tick: remaining > 0)* -> tick: remaining == 0 -> removed, reported once
//!                                  \-> accelerate -> next tick -> removed, reported once
//!                                  \-> clear_all -> removed, reported only if accelerated
//! ```

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{read_best_effort, write_best_effort, SharedStore, EVENTS_KEY};

/// A scheduled reminder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderEvent {
    pub id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub report_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds", alias = "alertTime")]
    pub fire_time: DateTime<Utc>,
    /// Milliseconds left as of the last recompute. Snapshot only.
    #[serde(rename = "remaining", alias = "timeLeft", default)]
    pub remaining_ms: u64,
    #[serde(rename = "delayHoursUsed", alias = "totalHours")]
    pub delay_hours_used: f64,
    /// Set by an accelerate override; the next tick expires the event.
    #[serde(skip)]
    forced_expiry: bool,
}

impl ReminderEvent {
    /// Schedule a reminder `delay` after `report_time`.
    ///
    /// Returns `None` if `delay` is not positive or the fire time is out of
    /// range.
    pub fn schedule(report_time: DateTime<Utc>, delay: TimeDelta, delay_hours_used: f64) -> Option<Self> {
        if delay <= TimeDelta::zero() {
            return None;
        }
        let fire_time = report_time.checked_add_signed(delay)?;
        Some(Self {
            id: format!("reminder-{}", uuid::Uuid::new_v4()),
            report_time,
            fire_time,
            remaining_ms: delay.num_milliseconds().max(0) as u64,
            delay_hours_used,
            forced_expiry: false,
        })
    }

    /// `max(0, fire_time - now)`, or zero once forced to expire.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> TimeDelta {
        if self.forced_expiry {
            return TimeDelta::zero();
        }
        (self.fire_time - now).max(TimeDelta::zero())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.remaining_at(now) == TimeDelta::zero()
    }

    pub fn is_forced(&self) -> bool {
        self.forced_expiry
    }

    fn refresh(&mut self, now: DateTime<Utc>) {
        self.remaining_ms = self.remaining_at(now).num_milliseconds().max(0) as u64;
    }

    fn is_well_formed(&self) -> bool {
        !self.id.is_empty()
            && self.fire_time > self.report_time
            && self.delay_hours_used.is_finite()
            && self.delay_hours_used > 0.0
    }
}

/// Result of one ledger tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickResult {
    /// Entries still live after this tick, in creation order.
    pub updated: Vec<ReminderEvent>,
    /// Entries that reached zero during this tick. Each appears exactly once
    /// across the ledger's lifetime.
    pub just_expired: Vec<ReminderEvent>,
}

/// Outcome of restoring the persisted ledger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoreReport {
    pub restored: usize,
    /// Entries whose fire time passed while the process was not running.
    /// Dropped without firing.
    pub expired_while_down: usize,
    pub malformed: usize,
}

pub struct EventLedger {
    store: SharedStore,
    events: Vec<ReminderEvent>,
}

impl EventLedger {
    /// An empty ledger that will persist into `store`.
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            events: Vec::new(),
        }
    }

    /// Load the persisted ledger, keeping only entries that fire after `now`.
    ///
    /// Malformed entries are skipped one by one; an unreadable record yields
    /// an empty ledger. Never fails.
    pub fn restore(store: SharedStore, now: DateTime<Utc>) -> (Self, RestoreReport) {
        let mut report = RestoreReport::default();
        let mut events = Vec::new();

        if let Some(raw) = read_best_effort(store.as_ref(), EVENTS_KEY) {
            match serde_json::from_str::<Vec<serde_json::Value>>(&raw) {
                Ok(entries) => {
                    for entry in entries {
                        match serde_json::from_value::<ReminderEvent>(entry) {
                            Ok(event) if event.is_well_formed() => {
                                if event.fire_time > now {
                                    events.push(event);
                                } else {
                                    report.expired_while_down += 1;
                                }
                            }
                            Ok(_) | Err(_) => report.malformed += 1,
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "reminder ledger record unreadable, starting empty");
                }
            }
        }

        // Ids must stay unique within the ledger; keep the first occurrence.
        let mut seen = std::collections::HashSet::new();
        events.retain(|e| {
            let fresh = seen.insert(e.id.clone());
            if !fresh {
                report.malformed += 1;
            }
            fresh
        });

        for event in &mut events {
            event.refresh(now);
        }
        report.restored = events.len();

        if report.malformed > 0 {
            tracing::warn!(skipped = report.malformed, "skipped malformed reminder entries");
        }
        if report.expired_while_down > 0 {
            tracing::info!(
                count = report.expired_while_down,
                "reminders expired while not running, dropped without firing"
            );
        }
        tracing::debug!(restored = report.restored, "reminder ledger restored");

        (Self { store, events }, report)
    }

    pub fn events(&self) -> &[ReminderEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Report time of the newest entry.
    pub fn latest_report_time(&self) -> Option<DateTime<Utc>> {
        self.events.iter().map(|e| e.report_time).max()
    }

    /// Add an entry at the end and persist the full set.
    pub fn append(&mut self, event: ReminderEvent) {
        self.events.push(event);
        self.persist();
    }

    /// Recompute every entry at `now` and remove those that reached zero.
    ///
    /// Persists only when membership changed, including the transition to
    /// empty.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickResult {
        if self.events.is_empty() {
            return TickResult::default();
        }

        let mut updated = Vec::with_capacity(self.events.len());
        let mut just_expired = Vec::new();
        for mut event in std::mem::take(&mut self.events) {
            event.refresh(now);
            if event.is_expired_at(now) {
                just_expired.push(event);
            } else {
                updated.push(event);
            }
        }
        self.events = updated.clone();

        if !just_expired.is_empty() {
            tracing::debug!(
                expired = just_expired.len(),
                live = self.events.len(),
                "ledger tick removed entries"
            );
            self.persist();
        }

        TickResult {
            updated,
            just_expired,
        }
    }

    /// Force every entry to expire on the next tick. Returns how many were
    /// marked.
    ///
    /// The persisted record is emptied right away so a restart before the
    /// next tick does not resurrect the entries.
    pub fn force_expire_all(&mut self) -> usize {
        for event in &mut self.events {
            event.forced_expiry = true;
            event.remaining_ms = 0;
        }
        write_best_effort(self.store.as_ref(), EVENTS_KEY, "[]");
        self.events.len()
    }

    /// Drop every entry and persist the empty ledger. Returns the removed
    /// entries in creation order.
    pub fn clear_all(&mut self) -> Vec<ReminderEvent> {
        let removed = std::mem::take(&mut self.events);
        self.persist();
        removed
    }

    fn persist(&self) {
        let persisted: Vec<&ReminderEvent> = self.events.iter().filter(|e| !e.forced_expiry).collect();
        match serde_json::to_string(&persisted) {
            Ok(json) => {
                write_best_effort(self.store.as_ref(), EVENTS_KEY, &json);
            }
            Err(e) => tracing::warn!(error = %e, "ledger serialization failed"),
        }
    }
}
