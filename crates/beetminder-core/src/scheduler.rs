//! Periodic tick driver.
//!
//! Runs [`ReminderEngine::tick`] on a tokio interval. The task is owned by a
//! [`TickHandle`]; [`TickHandle::shutdown`] stops it and waits for it, so no
//! tick can touch the engine afterwards. Dropping the handle aborts the task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::ReminderEngine;
use crate::events::Event;

pub type SharedEngine = Arc<Mutex<ReminderEngine>>;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

pub struct TickScheduler {
    interval: Duration,
    clock: Clock,
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_INTERVAL)
    }
}

impl TickScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock, e.g. with a manually advanced one in tests.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Start ticking `engine`. Non-empty event batches go to `on_events`,
    /// called outside the engine lock.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(self, engine: SharedEngine, mut on_events: F) -> TickHandle
    where
        F: FnMut(Vec<Event>) + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let ticks = Arc::new(AtomicU64::new(0));
        let counter = ticks.clone();
        let Self { interval, clock } = self;

        let join = tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::debug!(interval_ms = interval.as_millis() as u64, "tick scheduler started");

            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = timer.tick() => {
                        let now = clock();
                        let events = {
                            let mut guard = match engine.lock() {
                                Ok(guard) => guard,
                                Err(poisoned) => {
                                    tracing::warn!("engine lock poisoned, continuing with inner state");
                                    poisoned.into_inner()
                                }
                            };
                            guard.tick(now)
                        };
                        counter.fetch_add(1, Ordering::Relaxed);
                        if !events.is_empty() {
                            on_events(events);
                        }
                    }
                }
            }
            tracing::debug!("tick scheduler stopped");
        });

        TickHandle {
            stop: Some(stop_tx),
            join: Some(join),
            ticks,
        }
    }
}

/// Handle to a running tick task.
pub struct TickHandle {
    stop: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
    ticks: Arc<AtomicU64>,
}

impl TickHandle {
    /// Ticks completed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|j| !j.is_finished())
    }

    /// Stop the task and wait until it has exited. Returns the tick count.
    pub async fn shutdown(mut self) -> u64 {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                tracing::warn!(error = %e, "tick task ended abnormally");
            }
        }
        self.ticks()
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}
