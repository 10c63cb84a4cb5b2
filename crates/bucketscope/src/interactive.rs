//! Interactive visualizer loop for `bscope visualize`.
//!
//! A printer task redraws the gauge on every published snapshot and prints
//! log entries as they arrive; the foreground reads commands from stdin.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use bucketscope_core::{AlgorithmProfile, ReconciliationClient, Session};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::http::HttpRemote;
use crate::render;

/// One line of user input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Act,
    Configure { capacity: f64, rate: f64 },
    Status,
    Help,
    Quit,
    Unknown(String),
}

pub fn parse_command(line: &str) -> Command {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Command::Act;
    };
    match head.to_ascii_lowercase().as_str() {
        "r" | "a" | "act" | "request" => Command::Act,
        "s" | "status" => Command::Status,
        "h" | "help" | "?" => Command::Help,
        "q" | "quit" | "exit" => Command::Quit,
        "c" | "configure" => {
            let args: Vec<&str> = words.collect();
            match args.as_slice() {
                [capacity, rate] => match (capacity.parse(), rate.parse()) {
                    (Ok(capacity), Ok(rate)) => Command::Configure { capacity, rate },
                    _ => Command::Unknown(line.trim().to_string()),
                },
                _ => Command::Unknown(line.trim().to_string()),
            }
        }
        _ => Command::Unknown(line.trim().to_string()),
    }
}

pub fn help_text(profile: &AlgorithmProfile) -> String {
    format!(
        "{title} visualizer\n  <enter> | r        {action}\n  c <CAP> <RATE>     configure capacity and rate\n  s                  show status\n  q                  quit",
        title = profile.labels.title,
        action = profile.labels.action,
    )
}

fn redraw(line: &str) {
    let mut stdout = std::io::stdout().lock();
    let _ = write!(stdout, "\r\x1b[2K{line}");
    let _ = stdout.flush();
}

async fn print_stream(session: Arc<Session>) {
    let profile = session.profile();
    let mut log_rx = session.subscribe_log();
    let mut snapshots = session.subscribe_snapshots();
    loop {
        tokio::select! {
            entry = log_rx.recv() => match entry {
                Ok(entry) => {
                    redraw(&render::local_log(&entry));
                    println!();
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "log printer lagged");
                }
                Err(RecvError::Closed) => break,
            },
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if let Some(snapshot) = snapshot {
                    redraw(&render::local_gauge(profile, &snapshot));
                }
            }
        }
    }
}

/// Run until the user quits, stdin closes, or Ctrl-C.
pub async fn run(
    client: ReconciliationClient<HttpRemote>,
    initial: Option<(f64, f64)>,
) -> Result<()> {
    let profile = client.profile();
    for entry in client.session().recent_log().iter().rev() {
        println!("{}", render::local_log(entry));
    }
    println!("{}", help_text(profile));

    let printer = tokio::spawn(print_stream(Arc::clone(client.session())));

    if let Some((capacity, rate)) = initial {
        if let Err(err) = client.configure(capacity, rate).await {
            tracing::debug!(error = %err, "initial configuration failed");
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        match parse_command(&line) {
            Command::Act => {
                if let Err(err) = client.perform_action().await {
                    tracing::debug!(error = %err, "action failed");
                }
            }
            Command::Configure { capacity, rate } => {
                if let Err(err) = client.configure(capacity, rate).await {
                    tracing::debug!(error = %err, "configuration failed");
                }
            }
            Command::Status => {
                let status = serde_json::json!({
                    "algorithm": profile.kind,
                    "phase": client.session().phase(),
                    "generation": client.session().generation(),
                    "snapshot": client.session().snapshot(),
                });
                redraw(&serde_json::to_string(&status)?);
                println!();
            }
            Command::Help => {
                redraw(&help_text(profile));
                println!();
            }
            Command::Quit => break,
            Command::Unknown(input) => {
                redraw(&format!("unrecognized command: {input:?} (h for help)"));
                println!();
            }
        }
    }

    client.shutdown();
    printer.abort();
    println!();
    Ok(())
}
