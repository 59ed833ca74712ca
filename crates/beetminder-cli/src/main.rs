use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod terminal;

#[derive(Parser)]
#[command(name = "beetminder", version, about = "Beetminder reminder CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report an event and schedule its reminder
    Report,
    /// Print current reminders and cooldown as JSON
    Status,
    /// Fire every live reminder now
    Accelerate,
    /// Drop every reminder without firing
    Clear,
    /// Reminder delay and cooldown
    Settings {
        #[command(subcommand)]
        action: commands::settings::SettingsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Stay in the foreground, ticking once per interval and reading
    /// commands from stdin
    Run,
}

/// `RUST_LOG` wins; otherwise `logging.filter` from an existing config file.
fn init_logging() {
    let fallback = beetminder_core::Config::peek()
        .map(|config| config.logging.filter)
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging();
    let result = match cli.command {
        Commands::Report => commands::reminder::run(commands::reminder::ReminderAction::Report),
        Commands::Status => commands::reminder::run(commands::reminder::ReminderAction::Status),
        Commands::Accelerate => {
            commands::reminder::run(commands::reminder::ReminderAction::Accelerate)
        }
        Commands::Clear => commands::reminder::run(commands::reminder::ReminderAction::Clear),
        Commands::Settings { action } => commands::settings::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Run => commands::run::run(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
