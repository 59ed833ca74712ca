//! Integration tests for the reminder engine: scheduling, debounce,
//! single-fire expiry and survive-restart behaviour.

use std::sync::{Arc, Mutex};

use beetminder_core::storage::{KvStore, EVENTS_KEY};
use beetminder_core::{
    Database, Event, MemoryStore, ReminderEngine, ReminderEvent, ReminderTrigger, ReportError,
    SettingsCandidate, ValidationError,
};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use tempfile::TempDir;

#[derive(Clone, Default)]
struct Fires(Arc<Mutex<Vec<String>>>);

impl Fires {
    fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

impl ReminderTrigger for Fires {
    fn on_fire(&self, event: &ReminderEvent) {
        self.0.lock().unwrap().push(event.id.clone());
    }

    fn on_accelerate_all(&self, _count: usize) {}
}

fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn engine(delay: &str, cooldown: &str) -> (ReminderEngine, Fires) {
    let fires = Fires::default();
    let mut engine = ReminderEngine::init(MemoryStore::shared(), Box::new(fires.clone()), t(0));
    engine
        .save_settings(&SettingsCandidate::new(delay, cooldown), t(0))
        .unwrap();
    (engine, fires)
}

fn fired_ids(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::ReminderFired { id, .. } => Some(id.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_one_hour_delay_thirty_minute_cooldown_scenario() {
    let (mut engine, fires) = engine("1", "30");

    let e1 = engine.report_event(t(0)).unwrap();
    assert_eq!(e1.fire_time, t(3600));

    let rejected = engine.report_event(t(900)).unwrap_err();
    assert_eq!(rejected, ReportError::Debounced { remaining_ms: 900_000 });
    assert_eq!(engine.remaining_cooldown(t(900)), TimeDelta::seconds(900));

    // Drive the clock second by second like the scheduler would.
    let mut fired = Vec::new();
    for s in 1..=1801 {
        fired.extend(fired_ids(&engine.tick(t(s))));
    }
    assert!(fired.is_empty());

    let e2 = engine.report_event(t(1801)).unwrap();
    assert_eq!(e2.fire_time, t(1801 + 3600));

    for s in 1802..=3600 {
        fired.extend(fired_ids(&engine.tick(t(s))));
    }
    assert_eq!(fired, vec![e1.id.clone()]);

    for s in 3601..=(1801 + 3600) {
        fired.extend(fired_ids(&engine.tick(t(s))));
    }
    assert_eq!(fired, vec![e1.id, e2.id]);
    assert_eq!(fires.count(), 2);
    assert!(engine.reminders().is_empty());
}

#[test]
fn test_zero_cooldown_accepts_every_report() {
    let (mut engine, _) = engine("1", "0");
    for _ in 0..5 {
        engine.report_event(t(0)).unwrap();
    }
    assert_eq!(engine.reminders().len(), 5);
    let ids: std::collections::HashSet<_> = engine.reminders().iter().map(|e| &e.id).collect();
    assert_eq!(ids.len(), 5);
}

#[test]
fn test_accelerate_all_with_two_live_events() {
    let (mut engine, fires) = engine("1", "30");
    engine.report_event(t(0)).unwrap();
    engine.report_event(t(1800)).unwrap();

    engine.accelerate_all(t(1810)).unwrap();
    let events = engine.tick(t(1811));
    assert_eq!(fired_ids(&events).len(), 2);
    assert_eq!(fires.count(), 2);
    assert!(engine.reminders().is_empty());
    assert!(engine.can_report(t(1811)));

    assert!(fired_ids(&engine.tick(t(1812))).is_empty());
    assert!(fired_ids(&engine.tick(t(99_999))).is_empty());
}

#[test]
fn test_invalid_settings_keep_prior_values() {
    let (mut engine, _) = engine("2", "10");
    let err = engine
        .save_settings(&SettingsCandidate::new("4", "-1"), t(1))
        .unwrap_err();
    assert_eq!(err, ValidationError::NegativeCooldown(-1.0));
    assert_eq!(engine.settings().reminder_delay_hours, 2.0);
    assert_eq!(engine.settings().cooldown_minutes, 10.0);

    let event = engine.report_event(t(2)).unwrap();
    assert_eq!(event.fire_time, t(2 + 7200));
}

#[test]
fn test_tick_is_idempotent_for_same_instant() {
    let (mut engine, fires) = engine("1", "0");
    engine.report_event(t(0)).unwrap();
    engine.report_event(t(10)).unwrap();

    let first = engine.tick(t(3600));
    let second = engine.tick(t(3600));
    assert_eq!(fired_ids(&first).len(), 1);
    assert!(fired_ids(&second).is_empty());
    assert_eq!(fires.count(), 1);
    assert_eq!(engine.reminders().len(), 1);
}

#[test]
fn test_fire_boundary_is_exact() {
    let (mut engine, _) = engine("1", "0");
    engine.report_event(t(0)).unwrap();
    let almost = t(3600) - TimeDelta::milliseconds(1);
    assert!(fired_ids(&engine.tick(almost)).is_empty());
    assert_eq!(fired_ids(&engine.tick(t(3600))).len(), 1);
}

#[test]
fn test_report_and_tick_in_same_instant() {
    let (mut engine, _) = engine("1", "0");
    let event = engine.report_event(t(50)).unwrap();
    assert!(fired_ids(&engine.tick(t(50))).is_empty());
    assert_eq!(engine.reminders()[0].id, event.id);
}

#[test]
fn test_sqlite_restart_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("beetminder.db");

    let (a, b) = {
        let store = Arc::new(Database::open_at(&path).unwrap());
        let mut engine = ReminderEngine::init(store, Box::new(Fires::default()), t(0));
        engine
            .save_settings(&SettingsCandidate::new("1", "30"), t(0))
            .unwrap();
        let a = engine.report_event(t(0)).unwrap();
        let b = engine.report_event(t(1800)).unwrap();
        engine.shutdown();
        (a, b)
    };

    let store = Arc::new(Database::open_at(&path).unwrap());
    let restarted = ReminderEngine::init(store, Box::new(Fires::default()), t(2000));
    assert_eq!(restarted.settings().cooldown_minutes, 30.0);
    let live = restarted.reminders();
    assert_eq!(live.len(), 2);
    assert_eq!((live[0].id.as_str(), live[0].fire_time), (a.id.as_str(), a.fire_time));
    assert_eq!((live[1].id.as_str(), live[1].fire_time), (b.id.as_str(), b.fire_time));
    assert_eq!(live[1].delay_hours_used, 1.0);
    assert_eq!(restarted.debounce().last_accepted(), Some(t(1800)));
    assert!(!restarted.can_report(t(2000)));
}

#[test]
fn test_restart_after_expiry_drops_silently() {
    let store = MemoryStore::shared();
    let fires = Fires::default();
    {
        let mut engine = ReminderEngine::init(store.clone(), Box::new(fires.clone()), t(0));
        engine
            .save_settings(&SettingsCandidate::new("1", "30"), t(0))
            .unwrap();
        engine.report_event(t(0)).unwrap();
    }

    let mut restarted = ReminderEngine::init(store.clone(), Box::new(fires.clone()), t(7200));
    assert!(restarted.reminders().is_empty());
    assert_eq!(restarted.restore_report().expired_while_down, 1);
    assert!(restarted.can_report(t(7200)));
    assert!(restarted.tick(t(7201)).is_empty());
    assert_eq!(fires.count(), 0);
}

#[test]
fn test_natural_emptying_persists_empty_ledger() {
    let store = MemoryStore::shared();
    let mut engine = ReminderEngine::init(store.clone(), Box::new(Fires::default()), t(0));
    engine
        .save_settings(&SettingsCandidate::new("1", "0"), t(0))
        .unwrap();
    engine.report_event(t(0)).unwrap();
    engine.tick(t(3600));
    assert_eq!(store.get(EVENTS_KEY).unwrap().as_deref(), Some("[]"));

    // A restart while the entry is still "in the past" must not resurrect it.
    let restarted = ReminderEngine::init(store, Box::new(Fires::default()), t(10));
    assert!(restarted.reminders().is_empty());
}
