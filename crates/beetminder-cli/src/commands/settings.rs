use beetminder_core::error::Result;
use beetminder_core::{SettingsCandidate, SettingsStore};
use chrono::Utc;
use clap::Subcommand;

use super::{open_engine, open_store, print_json};

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print the active reminder delay and cooldown
    Show,
    /// Replace both settings at once
    Save {
        /// Hours between a report and its reminder (> 0)
        #[arg(allow_negative_numbers = true)]
        delay_hours: String,
        /// Minutes before another report is accepted (>= 0, 0 disables)
        #[arg(allow_negative_numbers = true)]
        cooldown_minutes: String,
    },
}

pub fn run(action: SettingsAction) -> Result<()> {
    match action {
        SettingsAction::Show => {
            let settings = SettingsStore::load(open_store());
            print_json(settings.active())?;
        }
        SettingsAction::Save {
            delay_hours,
            cooldown_minutes,
        } => {
            let config = beetminder_core::Config::load_or_default();
            let now = Utc::now();
            let mut engine = open_engine(&config, now);
            let candidate = SettingsCandidate::new(delay_hours, cooldown_minutes);
            let event = engine.save_settings(&candidate, now)?;
            print_json(&event)?;
            engine.shutdown();
        }
    }
    Ok(())
}
