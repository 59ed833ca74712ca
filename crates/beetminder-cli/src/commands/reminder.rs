use beetminder_core::error::Result;
use beetminder_core::{Config, Event};
use chrono::Utc;

use super::{open_engine, print_json};

/// One-shot reminder operations. Each invocation restores the ledger,
/// applies the action and exits; state lives in the store between runs.
///
/// Reminders that come due between invocations are dropped on the next
/// restore without firing. Only `beetminder run` delivers natural fires.
pub enum ReminderAction {
    Report,
    Status,
    Accelerate,
    Clear,
}

/// Exit status for a report refused by the cooldown.
const EXIT_DEBOUNCED: i32 = 2;

pub fn run(action: ReminderAction) -> Result<()> {
    let config = Config::load_or_default();
    let now = Utc::now();
    let mut engine = open_engine(&config, now);

    match action {
        ReminderAction::Report => {
            let event = engine.report(now);
            print_json(&event)?;
            if matches!(event, Event::ReportDebounced { .. } | Event::ReportRejected { .. }) {
                engine.shutdown();
                std::process::exit(EXIT_DEBOUNCED);
            }
        }
        ReminderAction::Status => {
            print_json(&engine.snapshot(now))?;
        }
        ReminderAction::Accelerate => {
            // Nothing ticks after this process exits, so fire right away.
            let mut events: Vec<Event> = engine.accelerate_all(now).into_iter().collect();
            events.extend(engine.tick(now));
            print_json(&events)?;
        }
        ReminderAction::Clear => {
            print_json(&engine.clear_all(now))?;
        }
    }

    engine.shutdown();
    Ok(())
}
