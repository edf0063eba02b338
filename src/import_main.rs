mod config;
mod importer;
mod paths;
mod pipeline;
mod sink;

use std::path::PathBuf;

use log::info;
use miette::{IntoDiagnostic, miette};

use crate::config::ArenalogConfig;
use crate::importer::import_log;
use crate::pipeline::Dispatcher;
use crate::sink::{EventSink, JsonlSink, LogSink};

/// Replays historical logs through the same parser pipeline the live daemon
/// uses. Paths come from the command line; with none given, every
/// `Player.log` / `Player-prev.log` / `UTC_Log*.log` in the platform's
/// default directories is imported, newest first.
#[tokio::main]
async fn main() -> miette::Result<()> {
    env_logger::init();

    let config = ArenalogConfig::config().into_diagnostic()?;

    let args: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    let targets = if args.is_empty() {
        let mut found = Vec::new();
        for dir in paths::default_log_dirs() {
            if let Ok(logs) = paths::discover_historical_logs(&dir) {
                found.extend(logs);
            }
        }
        found
    } else {
        args
    };

    if targets.is_empty() {
        return Err(miette!(
            "no historical logs found; pass log file paths as arguments"
        ));
    }

    let mut sinks: Vec<Box<dyn EventSink>> = vec![Box::new(LogSink)];
    if let Some(path) = &config.sink.jsonl_path {
        sinks.push(Box::new(JsonlSink::new(path)));
    }
    let mut dispatcher = Dispatcher::new(sinks);

    for path in &targets {
        let summary = import_log(
            path,
            &mut dispatcher,
            config.import.batch_size,
            config.idle_timeout(),
        )
        .await
        .into_diagnostic()?;
        info!(
            "{}: {} entries, {} batches",
            path.display(),
            summary.entries,
            summary.batches
        );
    }

    let totals = dispatcher.totals();
    info!(
        "import finished: {} entries, {} records, {} plays, {} match results",
        totals.entries, totals.records, totals.plays, totals.match_results
    );
    Ok(())
}
