//! Operator commands read from standard input while monitoring runs.

use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::monitoring::StatusTracker;

const HELP: &str = "commands: status, end";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleAction {
    Shutdown,
    Reply(String),
    Ignore,
}

/// Interpret one line typed by the operator
pub fn handle_command(line: &str, tracker: &StatusTracker) -> ConsoleAction {
    match line.trim().to_ascii_lowercase().as_str() {
        "" => ConsoleAction::Ignore,
        "end" | "stop" | "quit" => ConsoleAction::Shutdown,
        "status" => {
            let lines: Vec<String> = tracker
                .snapshot()
                .into_iter()
                .map(|(name, status)| format!("  {name}: {status}"))
                .collect();
            if lines.is_empty() {
                ConsoleAction::Reply("no services configured".into())
            } else {
                ConsoleAction::Reply(lines.join("\n"))
            }
        }
        other => ConsoleAction::Reply(format!("unknown command `{other}` ({HELP})")),
    }
}

/// Forward lines typed on standard input to the returned channel
///
/// Reads on a plain OS thread, not the runtime's blocking pool, so a pending read cannot hold
/// the runtime open at shutdown.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);

    let spawned = thread::Builder::new().name("console-stdin".into()).spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    if let Err(e) = spawned {
        warn!("Console unavailable, could not start stdin reader: {}", e);
    }

    rx
}

/// Act on commands until `end` is typed or input closes
///
/// Closing the input (EOF) does not stop monitoring, so the tracker keeps
/// running when started without a terminal.
pub async fn run_console(
    mut lines: mpsc::Receiver<String>,
    tracker: Arc<StatusTracker>,
    shutdown: watch::Sender<bool>,
) {
    while let Some(line) = lines.recv().await {
        match handle_command(&line, &tracker) {
            ConsoleAction::Shutdown => {
                info!("Shutting down, hopefully your servers don't too!");
                let _ = shutdown.send(true);
                return;
            }
            ConsoleAction::Reply(text) => println!("{text}"),
            ConsoleAction::Ignore => {}
        }
    }
    debug!("Console input closed");
}
