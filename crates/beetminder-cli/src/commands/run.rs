//! Foreground mode: owns the tick scheduler and reads single-word commands
//! from stdin. Events are printed to stdout as JSON lines.

use std::sync::{Arc, Mutex, MutexGuard};

use beetminder_core::error::Result;
use beetminder_core::{Config, Event, ReminderEngine, SharedEngine, TickScheduler};
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::open_engine;

const HELP: &str = "commands: report | status | accelerate | clear | dismiss | help | quit";

enum Input {
    Report,
    Status,
    Accelerate,
    Clear,
    Dismiss,
    Help,
    Quit,
    Unknown,
}

impl Input {
    fn parse(line: &str) -> Option<Self> {
        let input = match line.trim().to_ascii_lowercase().as_str() {
            "" => return None,
            "r" | "report" => Input::Report,
            "s" | "status" => Input::Status,
            "a" | "accelerate" => Input::Accelerate,
            "c" | "clear" => Input::Clear,
            "d" | "dismiss" => Input::Dismiss,
            "h" | "help" | "?" => Input::Help,
            "q" | "quit" | "exit" => Input::Quit,
            _ => Input::Unknown,
        };
        Some(input)
    }
}

fn print_event(event: &Event) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::warn!(error = %e, "could not render event"),
    }
}

fn lock(engine: &SharedEngine) -> MutexGuard<'_, ReminderEngine> {
    engine.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Apply one input line. Returns `false` when the user asked to quit.
fn handle(engine: &SharedEngine, input: Input) -> bool {
    let now = Utc::now();
    let mut engine = lock(engine);
    match input {
        Input::Report => print_event(&engine.report(now)),
        Input::Status => print_event(&engine.snapshot(now)),
        Input::Accelerate => match engine.accelerate_all(now) {
            Some(event) => print_event(&event),
            None => eprintln!("no reminders to accelerate"),
        },
        Input::Clear => {
            for event in engine.clear_all(now) {
                print_event(&event);
            }
        }
        Input::Dismiss => match engine.dismiss_alert(now) {
            Some(event) => print_event(&event),
            None => eprintln!("no alert showing"),
        },
        Input::Help => eprintln!("{HELP}"),
        Input::Quit => return false,
        Input::Unknown => eprintln!("unknown command; {HELP}"),
    }
    true
}

async fn foreground(config: Config) -> Result<()> {
    let engine: SharedEngine = Arc::new(Mutex::new(open_engine(&config, Utc::now())));
    print_event(&lock(&engine).snapshot(Utc::now()));

    let handle = TickScheduler::new(config.tick_interval()).spawn(engine.clone(), |events| {
        for event in &events {
            print_event(event);
        }
    });
    eprintln!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let result = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Some(input) = Input::parse(&line) {
                        if !self::handle(&engine, input) {
                            break Ok(());
                        }
                    }
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            },
        }
    };

    let ticks = handle.shutdown().await;
    tracing::debug!(ticks, "scheduler stopped");
    match Arc::try_unwrap(engine) {
        Ok(mutex) => mutex
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .shutdown(),
        Err(_) => tracing::warn!("engine still shared at shutdown"),
    }
    result.map_err(Into::into)
}

pub fn run() -> Result<()> {
    let config = Config::load_or_default();
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(foreground(config))
}
