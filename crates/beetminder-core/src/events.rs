use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::settings::Settings;
use crate::trigger::AlertState;

/// Every state change in the engine produces an Event.
/// Front ends print or forward them; nothing in the core consumes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    ReminderScheduled {
        id: String,
        number: usize,
        fire_time: DateTime<Utc>,
        delay_hours: f64,
        at: DateTime<Utc>,
    },
    /// Report refused by the debounce gate; nothing changed.
    ReportDebounced {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// Report refused for a reason other than debounce.
    ReportRejected {
        reason: String,
        at: DateTime<Utc>,
    },
    ReminderFired {
        id: String,
        report_time: DateTime<Utc>,
        fire_time: DateTime<Utc>,
        /// `true` when expiry was forced by an accelerate override.
        accelerated: bool,
        at: DateTime<Utc>,
    },
    AllAccelerated {
        count: usize,
        at: DateTime<Utc>,
    },
    LedgerCleared {
        dropped: usize,
        at: DateTime<Utc>,
    },
    /// The cooldown window after the last accepted report has closed.
    CooldownElapsed {
        at: DateTime<Utc>,
    },
    SettingsSaved {
        settings: Settings,
        at: DateTime<Utc>,
    },
    AlertDismissed {
        fires: u32,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        reminders: Vec<ReminderView>,
        can_report: bool,
        cooldown_remaining_secs: u64,
        cooldown_hint: Option<String>,
        settings: Settings,
        alert: Option<AlertState>,
        at: DateTime<Utc>,
    },
}

/// One live reminder as shown to the user, numbered in creation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderView {
    pub number: usize,
    pub id: String,
    pub fire_time: DateTime<Utc>,
    pub remaining_ms: u64,
    pub remaining: String,
    pub delay_hours: f64,
}

/// `Hh Mm Ss`, `Mm Ss` or `Ss`, dropping leading zero units.
pub fn format_remaining(ms: u64) -> String {
    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_remaining_drops_leading_units() {
        assert_eq!(format_remaining(0), "0s");
        assert_eq!(format_remaining(999), "0s");
        assert_eq!(format_remaining(59_000), "59s");
        assert_eq!(format_remaining(60_000), "1m 0s");
        assert_eq!(format_remaining(3_599_000), "59m 59s");
        assert_eq!(format_remaining(36_000_000), "10h 0m 0s");
        assert_eq!(format_remaining(90_061_000), "25h 1m 1s");
    }

    #[test]
    fn events_are_tagged() {
        let event = Event::CooldownElapsed {
            at: chrono::DateTime::from_timestamp(0, 0).unwrap(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "CooldownElapsed");
    }
}
