//! Reminder engine.
//!
//! The single mutable context that owns settings, the ledger, debounce
//! state, the alert and the trigger. Like a wall-clock timer it has no
//! internal thread: the caller supplies `now` to every operation and drives
//! [`ReminderEngine::tick`] periodically (see [`crate::scheduler`]).
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = ReminderEngine::init(store, Box::new(LogTrigger), Utc::now());
//! engine.report_event(Utc::now())?;
//! // once per second:
//! for event in engine.tick(Utc::now()) { /* render */ }
//! ```

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};

use crate::debounce::{self, DebounceState};
use crate::error::{ReportError, ValidationError};
use crate::events::{format_remaining, Event, ReminderView};
use crate::ledger::{EventLedger, ReminderEvent, RestoreReport};
use crate::settings::{Settings, SettingsCandidate, SettingsStore};
use crate::storage::SharedStore;
use crate::trigger::{AlertState, AlertText, Alerts, ReminderTrigger};

pub struct ReminderEngine {
    settings: SettingsStore,
    ledger: EventLedger,
    debounce: DebounceState,
    alerts: Alerts,
    trigger: Box<dyn ReminderTrigger>,
    restore_report: RestoreReport,
}

impl ReminderEngine {
    /// Load settings, restore the ledger as of `now`, and derive debounce
    /// state from the newest surviving reminder.
    pub fn init(store: SharedStore, trigger: Box<dyn ReminderTrigger>, now: DateTime<Utc>) -> Self {
        let settings = SettingsStore::load(store.clone());
        let (ledger, restore_report) = EventLedger::restore(store, now);
        let debounce = DebounceState::restore(ledger.latest_report_time(), now, settings.active());
        tracing::info!(
            live = ledger.len(),
            cooldown_pending = debounce.is_pending(),
            "reminder engine initialized"
        );
        Self {
            settings,
            ledger,
            debounce,
            alerts: Alerts::default(),
            trigger,
            restore_report,
        }
    }

    pub fn with_alert_text(mut self, text: AlertText) -> Self {
        self.alerts = Alerts::new(text);
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn settings(&self) -> &Settings {
        self.settings.active()
    }

    pub fn reminders(&self) -> &[ReminderEvent] {
        self.ledger.events()
    }

    pub fn debounce(&self) -> &DebounceState {
        &self.debounce
    }

    pub fn alert(&self) -> Option<&AlertState> {
        self.alerts.current()
    }

    pub fn restore_report(&self) -> &RestoreReport {
        &self.restore_report
    }

    pub fn can_report(&self, now: DateTime<Utc>) -> bool {
        self.debounce.can_accept(now, self.settings.active())
    }

    pub fn remaining_cooldown(&self, now: DateTime<Utc>) -> TimeDelta {
        self.debounce.remaining(now, self.settings.active())
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Event {
        let settings = *self.settings.active();
        let reminders = self
            .ledger
            .events()
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let remaining_ms = e.remaining_at(now).num_milliseconds().max(0) as u64;
                ReminderView {
                    number: i + 1,
                    id: e.id.clone(),
                    fire_time: e.fire_time,
                    remaining_ms,
                    remaining: format_remaining(remaining_ms),
                    delay_hours: e.delay_hours_used,
                }
            })
            .collect();
        Event::StateSnapshot {
            reminders,
            can_report: self.can_report(now),
            cooldown_remaining_secs: debounce::remaining_cooldown_secs(
                now,
                &settings,
                self.debounce.last_accepted(),
            ),
            cooldown_hint: debounce::cooldown_hint(&settings),
            settings,
            alert: self.alerts.current().cloned(),
            at: now,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Accept a report at `now` unless the debounce gate is closed.
    ///
    /// The fire time is computed from `now` alone, so a tick running at the
    /// same instant can never expire the new reminder. `now` is truncated to
    /// whole milliseconds to match the persisted record.
    pub fn report_event(&mut self, now: DateTime<Utc>) -> Result<ReminderEvent, ReportError> {
        let now = now.trunc_subsecs(3);
        let settings = *self.settings.active();
        if !self.debounce.can_accept(now, &settings) {
            let remaining_ms = self.debounce.remaining(now, &settings).num_milliseconds().max(0) as u64;
            tracing::debug!(remaining_ms, "report debounced");
            return Err(ReportError::Debounced { remaining_ms });
        }

        let event = ReminderEvent::schedule(now, settings.reminder_delay(), settings.reminder_delay_hours)
            .ok_or(ReportError::OutOfRange)?;
        self.ledger.append(event.clone());
        self.debounce.record(now);
        tracing::info!(id = %event.id, fire_time = %event.fire_time, "reminder scheduled");
        Ok(event)
    }

    /// [`report_event`](Self::report_event) rendered as an [`Event`].
    pub fn report(&mut self, now: DateTime<Utc>) -> Event {
        match self.report_event(now) {
            Ok(event) => Event::ReminderScheduled {
                number: self.ledger.len(),
                id: event.id,
                fire_time: event.fire_time,
                delay_hours: event.delay_hours_used,
                at: now,
            },
            Err(ReportError::Debounced { remaining_ms }) => Event::ReportDebounced {
                remaining_secs: remaining_ms.div_ceil(1000),
                at: now,
            },
            Err(e @ ReportError::OutOfRange) => Event::ReportRejected {
                reason: e.to_string(),
                at: now,
            },
        }
    }

    /// One evaluation pass. Call about once per second.
    ///
    /// Fires the trigger exactly once per reminder that reached zero and
    /// closes an elapsed cooldown. An idle engine returns no events.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        if self.ledger.is_empty() && !self.debounce.is_pending() {
            return Vec::new();
        }

        let mut events = Vec::new();
        let result = self.ledger.tick(now);

        let natural = result.just_expired.iter().filter(|e| !e.is_forced()).count();
        if natural > 0 {
            self.alerts.raise(now, natural as u32);
        }
        for expired in &result.just_expired {
            self.trigger.on_fire(expired);
            events.push(Event::ReminderFired {
                id: expired.id.clone(),
                report_time: expired.report_time,
                fire_time: expired.fire_time,
                accelerated: expired.is_forced(),
                at: now,
            });
        }

        if self.debounce.refresh(now, self.settings.active()) {
            tracing::debug!("cooldown elapsed");
            events.push(Event::CooldownElapsed { at: now });
        }
        events
    }

    /// Force every live reminder to fire on the next tick and reopen the
    /// gate. Returns `None` when there is nothing to accelerate.
    pub fn accelerate_all(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.ledger.is_empty() {
            return None;
        }
        let count = self.ledger.force_expire_all();
        self.debounce.clear();
        self.alerts.raise(now, count as u32);
        self.trigger.on_accelerate_all(count);
        tracing::info!(count, "accelerated all reminders");
        Some(Event::AllAccelerated { count, at: now })
    }

    /// Drop every reminder and reopen the gate.
    ///
    /// Reminders already accelerated but not yet ticked still fire once;
    /// the rest are dropped silently. The returned events end with
    /// [`Event::LedgerCleared`].
    pub fn clear_all(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        let removed = self.ledger.clear_all();
        self.debounce.clear();

        let mut events = Vec::new();
        let mut dropped = 0;
        for event in &removed {
            if event.is_forced() {
                self.trigger.on_fire(event);
                events.push(Event::ReminderFired {
                    id: event.id.clone(),
                    report_time: event.report_time,
                    fire_time: event.fire_time,
                    accelerated: true,
                    at: now,
                });
            } else {
                dropped += 1;
            }
        }
        tracing::info!(dropped, flushed = removed.len() - dropped, "reminder ledger cleared");
        events.push(Event::LedgerCleared { dropped, at: now });
        events
    }

    /// Replace settings. Affects future reports only; on error nothing
    /// changes.
    pub fn save_settings(
        &mut self,
        candidate: &SettingsCandidate,
        now: DateTime<Utc>,
    ) -> Result<Event, ValidationError> {
        let settings = self.settings.save(candidate)?;
        Ok(Event::SettingsSaved { settings, at: now })
    }

    pub fn dismiss_alert(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let alert = self.alerts.dismiss()?;
        Some(Event::AlertDismissed {
            fires: alert.fires,
            at: now,
        })
    }

    /// Consume the engine. The ledger is already persisted on every change,
    /// so this only records the final state.
    pub fn shutdown(self) {
        tracing::info!(live = self.ledger.len(), "reminder engine shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KvStore, MemoryStore, EVENTS_KEY};
    use chrono::TimeZone;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct Recorder {
        fired: Arc<Mutex<Vec<String>>>,
        accelerated: Arc<Mutex<Vec<usize>>>,
    }

    impl ReminderTrigger for Recorder {
        fn on_fire(&self, event: &ReminderEvent) {
            self.fired.lock().unwrap().push(event.id.clone());
        }

        fn on_accelerate_all(&self, count: usize) {
            self.accelerated.lock().unwrap().push(count);
        }
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn engine_with(delay: &str, cooldown: &str) -> (ReminderEngine, Recorder, Arc<MemoryStore>) {
        let store = MemoryStore::shared();
        let recorder = Recorder::default();
        let mut engine = ReminderEngine::init(store.clone(), Box::new(recorder.clone()), t(0));
        engine
            .save_settings(&SettingsCandidate::new(delay, cooldown), t(0))
            .unwrap();
        (engine, recorder, store)
    }

    #[test]
    fn report_schedules_from_now() {
        let (mut engine, _, _) = engine_with("1", "30");
        let event = engine.report_event(t(0)).unwrap();
        assert_eq!(event.fire_time, t(3600));
        assert_eq!(event.report_time, t(0));
        assert_eq!(engine.debounce().last_accepted(), Some(t(0)));
        assert_eq!(engine.reminders().len(), 1);
    }

    #[test]
    fn debounced_report_mutates_nothing() {
        let (mut engine, _, store) = engine_with("1", "30");
        engine.report_event(t(0)).unwrap();
        let persisted = store.get(EVENTS_KEY).unwrap();

        let err = engine.report_event(t(900)).unwrap_err();
        assert_eq!(err, ReportError::Debounced { remaining_ms: 900_000 });
        assert_eq!(engine.reminders().len(), 1);
        assert_eq!(engine.debounce().last_accepted(), Some(t(0)));
        assert_eq!(store.get(EVENTS_KEY).unwrap(), persisted);
    }

    #[test]
    fn report_renders_debounce_event() {
        let (mut engine, _, _) = engine_with("1", "30");
        assert!(matches!(engine.report(t(0)), Event::ReminderScheduled { number: 1, .. }));
        assert_eq!(
            engine.report(t(900)),
            Event::ReportDebounced {
                remaining_secs: 900,
                at: t(900)
            }
        );
    }

    #[test]
    fn settings_change_is_not_retroactive() {
        let (mut engine, _, _) = engine_with("1", "0");
        let first = engine.report_event(t(0)).unwrap();
        engine.save_settings(&SettingsCandidate::new("2", "0"), t(1)).unwrap();
        let second = engine.report_event(t(1)).unwrap();
        assert_eq!(engine.reminders()[0].fire_time, first.fire_time);
        assert_eq!(second.fire_time, t(1 + 7200));
        assert_eq!(second.delay_hours_used, 2.0);
    }

    #[test]
    fn tick_fires_once_and_raises_alert() {
        let (mut engine, recorder, _) = engine_with("1", "30");
        let event = engine.report_event(t(0)).unwrap();

        assert!(engine.tick(t(3599)).iter().all(|e| !matches!(e, Event::ReminderFired { .. })));
        let events = engine.tick(t(3600));
        assert!(events.iter().any(|e| matches!(e, Event::ReminderFired { accelerated: false, .. })));
        assert!(engine.tick(t(3600)).is_empty());

        assert_eq!(*recorder.fired.lock().unwrap(), vec![event.id]);
        assert_eq!(engine.alert().unwrap().fires, 1);
        assert!(matches!(engine.dismiss_alert(t(3601)), Some(Event::AlertDismissed { fires: 1, .. })));
        assert!(engine.alert().is_none());
    }

    #[test]
    fn tick_reports_cooldown_elapsed_once() {
        let (mut engine, _, _) = engine_with("1", "30");
        engine.report_event(t(0)).unwrap();
        assert!(engine.tick(t(1000)).is_empty());
        assert_eq!(engine.tick(t(1800)), vec![Event::CooldownElapsed { at: t(1800) }]);
        assert!(engine.tick(t(1801)).is_empty());
        assert!(engine.can_report(t(1801)));
    }

    #[test]
    fn idle_tick_is_noop() {
        let (mut engine, recorder, _) = engine_with("1", "30");
        assert!(engine.tick(t(10)).is_empty());
        assert!(recorder.fired.lock().unwrap().is_empty());
    }

    #[test]
    fn accelerate_fires_each_once_on_next_tick() {
        let (mut engine, recorder, store) = engine_with("1", "0");
        engine.report_event(t(0)).unwrap();
        engine.report_event(t(1)).unwrap();

        assert_eq!(
            engine.accelerate_all(t(2)),
            Some(Event::AllAccelerated { count: 2, at: t(2) })
        );
        assert_eq!(store.get(EVENTS_KEY).unwrap().as_deref(), Some("[]"));
        assert_eq!(*recorder.accelerated.lock().unwrap(), vec![2]);

        let events = engine.tick(t(3));
        let fired = events
            .iter()
            .filter(|e| matches!(e, Event::ReminderFired { accelerated: true, .. }))
            .count();
        assert_eq!(fired, 2);
        assert_eq!(recorder.fired.lock().unwrap().len(), 2);
        assert!(engine.reminders().is_empty());
        assert!(engine.can_report(t(3)));
        assert!(engine.tick(t(4)).is_empty());
        assert_eq!(engine.alert().unwrap().fires, 2);
    }

    #[test]
    fn accelerate_reopens_gate_immediately() {
        let (mut engine, _, _) = engine_with("1", "30");
        engine.report_event(t(0)).unwrap();
        assert!(!engine.can_report(t(10)));
        engine.accelerate_all(t(10)).unwrap();
        assert!(engine.can_report(t(10)));
    }

    #[test]
    fn accelerate_on_empty_ledger_does_nothing() {
        let (mut engine, recorder, _) = engine_with("1", "30");
        assert!(engine.accelerate_all(t(0)).is_none());
        assert!(recorder.accelerated.lock().unwrap().is_empty());
        assert!(engine.alert().is_none());
    }

    #[test]
    fn clear_all_drops_without_firing() {
        let (mut engine, recorder, store) = engine_with("1", "30");
        engine.report_event(t(0)).unwrap();
        assert_eq!(engine.clear_all(t(5)), vec![Event::LedgerCleared { dropped: 1, at: t(5) }]);
        assert!(engine.can_report(t(5)));
        assert_eq!(store.get(EVENTS_KEY).unwrap().as_deref(), Some("[]"));
        assert!(engine.tick(t(3600)).is_empty());
        assert!(recorder.fired.lock().unwrap().is_empty());
    }

    #[test]
    fn clear_after_accelerate_still_fires_accelerated_once() {
        let (mut engine, recorder, store) = engine_with("1", "30");
        let first = engine.report_event(t(0)).unwrap();
        engine.accelerate_all(t(1)).unwrap();
        let events = engine.clear_all(t(2));

        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            Event::ReminderFired { id, accelerated: true, .. } if *id == first.id
        ));
        assert_eq!(events[1], Event::LedgerCleared { dropped: 0, at: t(2) });
        assert_eq!(*recorder.fired.lock().unwrap(), vec![first.id]);
        assert_eq!(store.get(EVENTS_KEY).unwrap().as_deref(), Some("[]"));

        assert!(engine.tick(t(3)).is_empty());
        assert_eq!(recorder.fired.lock().unwrap().len(), 1);
    }

    #[test]
    fn report_time_is_truncated_to_milliseconds() {
        let (mut engine, recorder, store) = engine_with("1", "0");
        let now = t(0) + TimeDelta::microseconds(400);
        let event = engine.report_event(now).unwrap();
        assert_eq!(event.report_time, t(0));
        assert_eq!(event.fire_time, t(3600));

        assert!(engine.tick(event.fire_time - TimeDelta::microseconds(300)).is_empty());
        assert!(recorder.fired.lock().unwrap().is_empty());

        let restarted = ReminderEngine::init(store, Box::new(Recorder::default()), t(1));
        assert_eq!(restarted.reminders()[0].fire_time, event.fire_time);
    }

    #[test]
    fn restart_restores_debounce_within_window() {
        let (mut engine, _, store) = engine_with("1", "30");
        engine.report_event(t(0)).unwrap();
        engine.shutdown();

        let restarted = ReminderEngine::init(store.clone(), Box::new(Recorder::default()), t(600));
        assert_eq!(restarted.reminders().len(), 1);
        assert_eq!(restarted.debounce().last_accepted(), Some(t(0)));
        assert!(!restarted.can_report(t(600)));

        let later = ReminderEngine::init(store, Box::new(Recorder::default()), t(1900));
        assert_eq!(later.reminders().len(), 1);
        assert!(!later.debounce().is_pending());
    }

    #[test]
    fn snapshot_numbers_reminders() {
        let (mut engine, _, _) = engine_with("1", "30");
        engine.report_event(t(0)).unwrap();
        match engine.snapshot(t(60)) {
            Event::StateSnapshot {
                reminders,
                can_report,
                cooldown_remaining_secs,
                cooldown_hint,
                ..
            } => {
                assert_eq!(reminders.len(), 1);
                assert_eq!(reminders[0].number, 1);
                assert_eq!(reminders[0].remaining, "59m 0s");
                assert!(!can_report);
                assert_eq!(cooldown_remaining_secs, 1740);
                assert_eq!(cooldown_hint.as_deref(), Some("One report every 30 minutes"));
            }
            other => panic!("Expected StateSnapshot, got {other:?}"),
        }
    }
}
