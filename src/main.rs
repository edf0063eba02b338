mod config;
mod paths;
mod pipeline;
mod sink;

use std::time::Duration;

use log::{info, warn};
use miette::IntoDiagnostic;
use tokio_util::sync::CancellationToken;

use crate::config::ArenalogConfig;
use crate::pipeline::{Dispatcher, run_dispatch_loop};
use crate::sink::{EventSink, JsonlSink, LogSink};

const DISPATCH_BATCH_SIZE: usize = 200;
const DISPATCH_FLUSH_INTERVAL: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> miette::Result<()> {
    env_logger::init();

    let config = ArenalogConfig::config().into_diagnostic()?;

    let log_paths = if config.log_paths.is_empty() {
        paths::discover_log_paths()
    } else {
        config.log_paths.clone()
    };
    if log_paths.is_empty() {
        warn!("no Arena log files found; waiting for the game to create one");
    }

    let manager = logtail::PollerManager::new(config.manager_config());
    for path in &log_paths {
        let key = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("player")
            .to_string();
        manager
            .add_poller(key, config.poller_config(path))
            .into_diagnostic()?;
        info!("tailing {}", path.display());
    }

    if let Some(notifier) = manager.notifier() {
        notifier.subscribe(|event| info!("notification [{}] {}", event.event_type, event.message));
    }

    let mut errors = manager.errors();
    tokio::spawn(async move {
        let Some(errors) = errors.as_mut() else {
            return;
        };
        while let Some(err) = errors.recv().await {
            warn!("{err}");
        }
    });

    let entry_rx = manager.start().into_diagnostic()?;
    info!("watching {} log file(s)", manager.poller_count());

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
                cancel.cancel();
            }
        });
    }

    let mut sinks: Vec<Box<dyn EventSink>> = vec![Box::new(LogSink)];
    if let Some(path) = &config.sink.jsonl_path {
        sinks.push(Box::new(JsonlSink::new(path)));
    }
    let mut dispatcher = Dispatcher::new(sinks);

    run_dispatch_loop(
        entry_rx,
        &mut dispatcher,
        cancel,
        DISPATCH_BATCH_SIZE,
        DISPATCH_FLUSH_INTERVAL,
    )
    .await;

    manager.stop().await;

    let metrics = manager.aggregate_metrics();
    let totals = dispatcher.totals();
    info!(
        "stopped after {} polls, {} entries, {} records ({} plays)",
        metrics.poll_count, totals.entries, totals.records, totals.plays
    );
    Ok(())
}
