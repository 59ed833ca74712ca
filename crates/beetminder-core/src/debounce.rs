//! Debounce gate.
//!
//! Decides whether a new report may be accepted. The gate itself is a pair
//! of pure functions over `(now, settings, last accepted report)`; the only
//! state is [`DebounceState`], which the engine derives from the ledger.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::settings::Settings;

/// Whether a report at `now` would be accepted.
pub fn can_accept(now: DateTime<Utc>, settings: &Settings, last: Option<DateTime<Utc>>) -> bool {
    match last {
        None => true,
        Some(_) if !settings.debounce_enabled() => true,
        Some(last) => now - last >= settings.cooldown(),
    }
}

/// Time left before the gate reopens; zero when open.
pub fn remaining_cooldown(now: DateTime<Utc>, settings: &Settings, last: Option<DateTime<Utc>>) -> TimeDelta {
    if can_accept(now, settings, last) {
        return TimeDelta::zero();
    }
    match last {
        Some(last) => (settings.cooldown() - (now - last)).max(TimeDelta::zero()),
        None => TimeDelta::zero(),
    }
}

/// Whole seconds left, rounded up so a nearly-open gate never shows zero.
pub fn remaining_cooldown_secs(now: DateTime<Utc>, settings: &Settings, last: Option<DateTime<Utc>>) -> u64 {
    let ms = remaining_cooldown(now, settings, last).num_milliseconds().max(0) as u64;
    ms.div_ceil(1000)
}

/// "One report every N minute(s)", or `None` when debounce is off.
pub fn cooldown_hint(settings: &Settings) -> Option<String> {
    if !settings.debounce_enabled() {
        return None;
    }
    let minutes = settings.cooldown_minutes;
    let unit = if minutes == 1.0 { "minute" } else { "minutes" };
    Some(format!("One report every {minutes} {unit}"))
}

/// Most recent accepted report, while its cooldown is still pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebounceState {
    last_accepted: Option<DateTime<Utc>>,
}

impl DebounceState {
    /// Restore from the newest live report, keeping it only if the cooldown
    /// window is still open at `now`.
    pub fn restore(latest_report: Option<DateTime<Utc>>, now: DateTime<Utc>, settings: &Settings) -> Self {
        let last_accepted = latest_report.filter(|t| now - *t < settings.cooldown());
        Self { last_accepted }
    }

    pub fn last_accepted(&self) -> Option<DateTime<Utc>> {
        self.last_accepted
    }

    pub fn is_pending(&self) -> bool {
        self.last_accepted.is_some()
    }

    pub fn can_accept(&self, now: DateTime<Utc>, settings: &Settings) -> bool {
        can_accept(now, settings, self.last_accepted)
    }

    pub fn remaining(&self, now: DateTime<Utc>, settings: &Settings) -> TimeDelta {
        remaining_cooldown(now, settings, self.last_accepted)
    }

    pub fn record(&mut self, at: DateTime<Utc>) {
        self.last_accepted = Some(at);
    }

    pub fn clear(&mut self) {
        self.last_accepted = None;
    }

    /// Drop the pending cooldown once it has elapsed. Returns `true` on the
    /// transition; never re-arms.
    pub fn refresh(&mut self, now: DateTime<Utc>, settings: &Settings) -> bool {
        if self.last_accepted.is_some() && remaining_cooldown(now, settings, self.last_accepted).is_zero() {
            self.last_accepted = None;
            return true;
        }
        false
    }
}
