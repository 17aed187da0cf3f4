use std::io::{self, Write};

use serde::Serialize;
use tracing::info;

use crate::app::{ProgressEvent, ProgressSink, RunResult};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_run(result: &RunResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct LogOutput;

impl ProgressSink for LogOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => info!("{}", event.message),
        }
    }
}

pub fn print_summary(result: &RunResult) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    println!(
        "{cyan}vision-trades summary ({} {} .. {}){reset}",
        result.trading_type,
        result.window.start(),
        result.window.end()
    );
    for (label, reports) in [("monthly", &result.monthly), ("daily", &result.daily)] {
        if reports.is_empty() {
            continue;
        }
        let downloaded: usize = reports.iter().map(|report| report.downloaded).sum();
        let present: usize = reports.iter().map(|report| report.already_present).sum();
        let failed: usize = reports.iter().map(|report| report.failed).sum();
        let absent: usize = reports.iter().map(|report| report.confirmed_absent).sum();
        println!(
            "{green}{label}: {downloaded} downloaded, {present} already present, {absent} absent{reset}"
        );
        if failed > 0 {
            println!("{yellow}{label}: {failed} downloads failed (retried next run){reset}");
        }
    }
    for symbol in result.failed_symbols() {
        println!("{red}{symbol}: pass aborted{reset}");
    }
}
