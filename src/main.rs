//! Binary entry point: parse options, run the session, print the
//! selection to stdout, and map the outcome onto the exit code.

use std::io::{IsTerminal, Write};
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;

use sift_rs::cli::{Cli, Options, filter};
use sift_rs::error::EXIT_ERROR;
use sift_rs::orchestrator;
use sift_rs::terminal::Outcome;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();
    match run(&cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            let _ = writeln!(std::io::stderr(), "sift: {e}");
            ExitCode::from(u8::try_from(EXIT_ERROR).unwrap_or(2))
        }
    }
}

fn run(cli: &Cli) -> sift_rs::Result<i32> {
    let options = Options::from_cli(cli)?;

    if let Some(query) = options.filter.clone() {
        let (lines, code) = if std::io::stdin().is_terminal() {
            // Filter mode over a TTY has nothing to read.
            (Vec::new(), sift_rs::error::EXIT_NO_MATCH)
        } else {
            filter::run(&options, &query, std::io::stdin().lock())?
        };
        emit(lines.iter().map(String::as_str), options.output_delimiter())?;
        return Ok(code);
    }

    let output = orchestrator::run(options.clone())?;
    let emitted = !output.selected.is_empty();
    if output.outcome == Outcome::Accept {
        let mut lines: Vec<String> = Vec::new();
        if options.print_query {
            lines.push(output.query.clone());
        }
        if !options.expect.is_empty() {
            lines.push(output.pressed.clone().unwrap_or_default());
        }
        for item in &output.selected {
            lines.push(item.text().to_string());
        }
        emit(lines.iter().map(String::as_str), options.output_delimiter())?;
    }
    Ok(output.outcome.exit_code(emitted))
}

/// Writes output records to locked stdout with the configured
/// terminator.
fn emit<'a>(lines: impl Iterator<Item = &'a str>, delimiter: u8) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    for line in lines {
        stdout.write_all(line.as_bytes())?;
        stdout.write_all(&[delimiter])?;
    }
    stdout.flush()
}

/// Logging goes to a file (the TUI owns the terminal): enabled only
/// when `SIFT_LOG_FILE` is set, filtered by `SIFT_LOG`.
fn init_tracing() {
    let Ok(path) = std::env::var("SIFT_LOG_FILE") else {
        return;
    };
    let Ok(file) = std::fs::File::create(&path) else {
        return;
    };
    let filter = tracing_subscriber::EnvFilter::try_from_env("SIFT_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
}
