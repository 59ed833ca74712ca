//! User-tunable reminder settings.
//!
//! Two numbers: how long after a report the reminder fires, and how long
//! after an accepted report further reports are refused. Loaded once at
//! startup, replaced wholesale by [`SettingsStore::save`], never partially
//! mutated.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::storage::{read_best_effort, write_best_effort, SharedStore, SETTINGS_KEY};

pub const DEFAULT_REMINDER_DELAY_HOURS: f64 = 10.0;
pub const DEFAULT_COOLDOWN_MINUTES: f64 = 30.0;

/// Upper bound on either setting; keeps instant arithmetic in range.
const MAX_HOURS: f64 = 24.0 * 366.0 * 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub reminder_delay_hours: f64,
    pub cooldown_minutes: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reminder_delay_hours: DEFAULT_REMINDER_DELAY_HOURS,
            cooldown_minutes: DEFAULT_COOLDOWN_MINUTES,
        }
    }
}

impl Settings {
    /// Build settings from numbers, enforcing `delay > 0` and `cooldown >= 0`.
    pub fn new(reminder_delay_hours: f64, cooldown_minutes: f64) -> Result<Self, ValidationError> {
        validate_delay(reminder_delay_hours)?;
        validate_cooldown(cooldown_minutes)?;
        Ok(Self {
            reminder_delay_hours,
            cooldown_minutes,
        })
    }

    pub fn reminder_delay(&self) -> TimeDelta {
        TimeDelta::milliseconds((self.reminder_delay_hours * 3_600_000.0).round() as i64)
    }

    pub fn cooldown(&self) -> TimeDelta {
        TimeDelta::milliseconds((self.cooldown_minutes * 60_000.0).round() as i64)
    }

    pub fn debounce_enabled(&self) -> bool {
        self.cooldown() > TimeDelta::zero()
    }

    /// Decode a persisted record field by field.
    ///
    /// Each missing, mistyped or out-of-range field falls back to its own
    /// default; a record that is not a JSON object yields full defaults.
    pub fn from_record(raw: &str) -> Self {
        let defaults = Self::default();
        let value: serde_json::Value = match serde_json::from_str(raw) {
            Ok(v @ serde_json::Value::Object(_)) => v,
            Ok(_) | Err(_) => {
                tracing::warn!("settings record is malformed, using defaults");
                return defaults;
            }
        };

        let field = |names: &[&str]| names.iter().find_map(|n| value.get(*n)?.as_f64());

        let reminder_delay_hours = match field(&["reminderDelayHours", "reminderHours"]) {
            Some(h) if validate_delay(h).is_ok() => h,
            Some(h) => {
                tracing::warn!(value = h, "stored reminder delay invalid, using default");
                defaults.reminder_delay_hours
            }
            None => defaults.reminder_delay_hours,
        };
        let cooldown_minutes = match field(&["cooldownMinutes", "debounceMinutes"]) {
            Some(m) if validate_cooldown(m).is_ok() => m,
            Some(m) => {
                tracing::warn!(value = m, "stored cooldown invalid, using default");
                defaults.cooldown_minutes
            }
            None => defaults.cooldown_minutes,
        };

        Self {
            reminder_delay_hours,
            cooldown_minutes,
        }
    }
}

fn validate_delay(hours: f64) -> Result<(), ValidationError> {
    if !hours.is_finite() {
        return Err(ValidationError::NotANumber {
            field: "reminderDelayHours",
            input: hours.to_string(),
        });
    }
    if hours <= 0.0 {
        return Err(ValidationError::NonPositiveDelay(hours));
    }
    if hours > MAX_HOURS {
        return Err(ValidationError::TooLarge {
            field: "reminderDelayHours",
            value: hours,
        });
    }
    Ok(())
}

fn validate_cooldown(minutes: f64) -> Result<(), ValidationError> {
    if !minutes.is_finite() {
        return Err(ValidationError::NotANumber {
            field: "cooldownMinutes",
            input: minutes.to_string(),
        });
    }
    if minutes < 0.0 {
        return Err(ValidationError::NegativeCooldown(minutes));
    }
    if minutes > MAX_HOURS * 60.0 {
        return Err(ValidationError::TooLarge {
            field: "cooldownMinutes",
            value: minutes,
        });
    }
    Ok(())
}

fn parse_field(field: &'static str, text: &str) -> Result<f64, ValidationError> {
    let not_a_number = || ValidationError::NotANumber {
        field,
        input: text.to_string(),
    };
    let value: f64 = text.trim().parse().map_err(|_| not_a_number())?;
    if !value.is_finite() {
        return Err(not_a_number());
    }
    Ok(value)
}

/// Raw form input for a settings save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsCandidate {
    pub reminder_delay_text: String,
    pub cooldown_text: String,
}

impl SettingsCandidate {
    pub fn new(reminder_delay_text: impl Into<String>, cooldown_text: impl Into<String>) -> Self {
        Self {
            reminder_delay_text: reminder_delay_text.into(),
            cooldown_text: cooldown_text.into(),
        }
    }

    /// Candidate pre-filled with the active values, as a settings form opens.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.reminder_delay_hours.to_string(),
            settings.cooldown_minutes.to_string(),
        )
    }

    pub fn parse(&self) -> Result<Settings, ValidationError> {
        let hours = parse_field("reminderDelayHours", &self.reminder_delay_text)?;
        let minutes = parse_field("cooldownMinutes", &self.cooldown_text)?;
        Settings::new(hours, minutes)
    }
}

/// Owns the active [`Settings`] and their persisted record.
pub struct SettingsStore {
    store: SharedStore,
    active: Settings,
}

impl SettingsStore {
    /// Read the persisted record; absent or unreadable records give defaults.
    pub fn load(store: SharedStore) -> Self {
        let active = match read_best_effort(store.as_ref(), SETTINGS_KEY) {
            Some(raw) => Settings::from_record(&raw),
            None => Settings::default(),
        };
        tracing::debug!(
            delay_hours = active.reminder_delay_hours,
            cooldown_minutes = active.cooldown_minutes,
            "settings loaded"
        );
        Self { store, active }
    }

    pub fn active(&self) -> &Settings {
        &self.active
    }

    /// Validate, replace and persist. On error nothing changes.
    pub fn save(&mut self, candidate: &SettingsCandidate) -> Result<Settings, ValidationError> {
        let next = candidate.parse()?;
        self.active = next;
        match serde_json::to_string(&next) {
            Ok(json) => {
                write_best_effort(self.store.as_ref(), SETTINGS_KEY, &json);
            }
            Err(e) => tracing::warn!(error = %e, "settings serialization failed"),
        }
        tracing::info!(
            delay_hours = next.reminder_delay_hours,
            cooldown_minutes = next.cooldown_minutes,
            "settings saved"
        );
        Ok(next)
    }
}
