//! Reminder trigger: the outward effect of a fire.
//!
//! The engine calls a [`ReminderTrigger`] once per expired reminder and once
//! per accelerate override. What the trigger does (sound, desktop
//! notification, terminal bell) belongs to the front end. The engine also
//! keeps an [`AlertState`] so a UI can show a banner until dismissed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::ReminderEvent;

pub trait ReminderTrigger: Send {
    /// A reminder reached zero. Called exactly once per reminder.
    fn on_fire(&self, event: &ReminderEvent);

    /// Every live reminder was forced to expire.
    fn on_accelerate_all(&self, count: usize);
}

/// Trigger that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTrigger;

impl ReminderTrigger for LogTrigger {
    fn on_fire(&self, event: &ReminderEvent) {
        tracing::info!(id = %event.id, fire_time = %event.fire_time, "reminder fired");
    }

    fn on_accelerate_all(&self, count: usize) {
        tracing::info!(count, "all reminders accelerated");
    }
}

/// Raised alert, pending user acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertState {
    pub title: String,
    pub body: String,
    pub raised_at: DateTime<Utc>,
    /// Fires folded into this alert since it was raised.
    pub fires: u32,
}

/// Title and body used when an alert is raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertText {
    pub title: String,
    pub body: String,
}

impl Default for AlertText {
    fn default() -> Self {
        Self {
            title: "Beetminder".into(),
            body: "Don't panic! You're not dying. It's just beets.".into(),
        }
    }
}

/// At most one alert is showing; further fires bump its count.
#[derive(Debug, Clone, Default)]
pub struct Alerts {
    text: AlertText,
    current: Option<AlertState>,
}

impl Alerts {
    pub fn new(text: AlertText) -> Self {
        Self { text, current: None }
    }

    pub fn raise(&mut self, at: DateTime<Utc>, fires: u32) {
        match self.current.as_mut() {
            Some(alert) => alert.fires = alert.fires.saturating_add(fires),
            None => {
                self.current = Some(AlertState {
                    title: self.text.title.clone(),
                    body: self.text.body.clone(),
                    raised_at: at,
                    fires,
                })
            }
        }
    }

    pub fn current(&self) -> Option<&AlertState> {
        self.current.as_ref()
    }

    pub fn dismiss(&mut self) -> Option<AlertState> {
        self.current.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alerts_fold_and_dismiss() {
        let t0 = DateTime::from_timestamp(100, 0).unwrap();
        let t1 = DateTime::from_timestamp(200, 0).unwrap();
        let mut alerts = Alerts::new(AlertText::default());
        assert!(alerts.current().is_none());

        alerts.raise(t0, 1);
        alerts.raise(t1, 2);
        let alert = alerts.current().unwrap();
        assert_eq!(alert.fires, 3);
        assert_eq!(alert.raised_at, t0);
        assert_eq!(alert.title, "Beetminder");

        assert_eq!(alerts.dismiss().unwrap().fires, 3);
        assert!(alerts.dismiss().is_none());
    }
}
