//! Console – line commands read from stdin while the panel runs.
//!
//! Supported commands:
//!   /detect       – toggle face detection
//!   /status       – list the pipelines still running
//!   /help         – show this list
//!   /quit | /exit – stop the panel

use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// What the operator asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ToggleDetection,
    Status,
    Quit,
}

/// Parse one input line.  `Ok(None)` for blank lines and `/help`, which is
/// answered here; `Err` carries the unrecognised input.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    match line.trim() {
        "" => Ok(None),
        "/detect" => Ok(Some(Command::ToggleDetection)),
        "/status" => Ok(Some(Command::Status)),
        "/quit" | "/exit" => Ok(Some(Command::Quit)),
        "/help" => {
            print_help();
            Ok(None)
        }
        other => Err(other.to_string()),
    }
}

pub fn print_help() {
    println!();
    println!("{}", "Panel Commands".bold().underline());
    println!("  {}       – toggle face detection", "/detect".bold().cyan());
    println!("  {}       – list running pipelines", "/status".bold().cyan());
    println!("  {}  – stop the panel", "/quit  /exit".bold().cyan());
    println!();
}

/// Forward commands from stdin until EOF or `/quit`.  EOF stops reading but
/// does not stop the panel.
pub async fn run(commands: UnboundedSender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        };

        match parse_command(&line) {
            Ok(Some(command)) => {
                if commands.send(command).is_err() || command == Command::Quit {
                    break;
                }
            }
            Ok(None) => {}
            Err(other) => println!(
                "{} '{}'. Type {} for available commands.",
                "Unknown command:".red(),
                other.yellow(),
                "/help".bold()
            ),
        }
    }
    debug!("console closed");
}
