use std::io::Write;

use beetminder_core::storage::NotificationsConfig;
use beetminder_core::{AlertText, ReminderEvent, ReminderTrigger};

/// Announces fires on stderr and optionally rings the terminal bell.
pub struct TerminalTrigger {
    config: NotificationsConfig,
}

impl TerminalTrigger {
    pub fn new(config: NotificationsConfig) -> Self {
        Self { config }
    }

    pub fn alert_text(&self) -> AlertText {
        AlertText {
            title: self.config.title.clone(),
            body: self.config.body.clone(),
        }
    }

    fn announce(&self, line: &str) {
        if !self.config.enabled {
            return;
        }
        let mut err = std::io::stderr().lock();
        let bell = if self.config.bell { "\x07" } else { "" };
        let _ = writeln!(err, "{bell}[{}] {line}", self.config.title);
        let _ = err.flush();
    }
}

impl ReminderTrigger for TerminalTrigger {
    fn on_fire(&self, event: &ReminderEvent) {
        tracing::info!(id = %event.id, "reminder fired");
        self.announce(&self.config.body);
    }

    fn on_accelerate_all(&self, count: usize) {
        tracing::info!(count, "reminders accelerated");
        let plural = if count == 1 { "" } else { "s" };
        self.announce(&format!("{count} reminder{plural} accelerated. {}", self.config.body));
    }
}
