use std::path::Path;
use std::time::Duration;

use log::{debug, info};
use logtail::{Poller, PollerConfig, PollerError};
use serde::Serialize;

use crate::pipeline::{DispatchTotals, Dispatcher};

/// The importer reads closed files, so it can poll much faster than the
/// live tailer without wasting anything.
const IMPORT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ImportSummary {
    pub entries: u64,
    pub batches: u64,
    pub totals: DispatchTotals,
}

/// Replay one historical log through the full parser pipeline.
///
/// The file is read from byte zero with the same scanner the live tailer
/// uses. Historical files are closed, so end-of-input is detected by
/// idleness: once no entry arrives for `idle_timeout`, the remaining batch
/// is flushed and the importer returns.
pub async fn import_log(
    path: &Path,
    dispatcher: &mut Dispatcher,
    batch_size: usize,
    idle_timeout: Duration,
) -> Result<ImportSummary, PollerError> {
    info!("importing {}", path.display());

    let mut config = PollerConfig::new(path);
    config.read_from_start = true;
    config.interval = IMPORT_POLL_INTERVAL;
    config.buffer_size = batch_size.max(1);
    let mut poller = Poller::new(config)?;
    let mut rx = poller.start()?;

    let batch_size = batch_size.max(1);
    let mut pending = Vec::with_capacity(batch_size);
    let mut summary = ImportSummary::default();

    loop {
        match tokio::time::timeout(idle_timeout, rx.recv()).await {
            Ok(Some(entry)) => {
                summary.entries += 1;
                pending.push(entry);
                if pending.len() >= batch_size {
                    dispatcher.dispatch(&pending).await;
                    summary.batches += 1;
                    pending.clear();
                }
            }
            Ok(None) => break,
            Err(_) => {
                debug!(
                    "no entries from {} for {idle_timeout:?}, treating as end of file",
                    path.display()
                );
                break;
            }
        }
    }

    if !pending.is_empty() {
        dispatcher.dispatch(&pending).await;
        summary.batches += 1;
    }
    dispatcher.flush().await;
    poller.stop().await;

    summary.totals = dispatcher.totals();
    info!(
        "imported {} entries in {} batches from {}",
        summary.entries,
        summary.batches,
        path.display()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::JsonlSink;

    #[tokio::test]
    async fn closed_file_imports_and_returns_on_idle() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("Player.log");
        let out_path = dir.path().join("events.jsonl");
        std::fs::write(
            &log_path,
            concat!(
                "[2024-01-15 14:30:25] Initialize engine version\n",
                "{\"quests\":[{\"questId\":\"q1\",\"locKey\":\"Win 2 games\",\"goal\":2,\"endingProgress\":1}],\"canSwap\":true}\n",
                "{\"quests\":[],\"canSwap\":true}\n",
                "{\"connectResp\":{\"systemSeatIds\":[1]}}\n",
                "{\"greToClientEvent\":{\"greToClientMessages\":[{\"type\":\"GREMessageType_GameStateMessage\",\"gameStateMessage\":{\"turnInfo\":{\"turnNumber\":1},\"gameObjects\":[{\"instanceId\":200,\"grpId\":67890,\"controllerSeatId\":1,\"zoneId\":1,\"cardTypes\":[\"CardType_Land\"]}]}}]}}\n",
                "{\"greToClientEvent\":{\"greToClientMessages\":[{\"type\":\"GREMessageType_GameStateMessage\",\"gameStateMessage\":{\"turnInfo\":{\"turnNumber\":1},\"gameObjects\":[{\"instanceId\":200,\"grpId\":67890,\"controllerSeatId\":1,\"zoneId\":3,\"cardTypes\":[\"CardType_Land\"]}]}}]}}\n",
            ),
        )
        .unwrap();

        let mut dispatcher = Dispatcher::new(vec![Box::new(JsonlSink::new(&out_path))]);
        let summary = import_log(
            &log_path,
            &mut dispatcher,
            500,
            Duration::from_millis(400),
        )
        .await
        .unwrap();

        // The plain-text line is dropped at the scanner.
        assert_eq!(summary.entries, 5);
        assert_eq!(summary.batches, 1);
        assert_eq!(summary.totals.plays, 1);

        let contents = std::fs::read_to_string(&out_path).unwrap();
        let kinds: Vec<String> = contents
            .lines()
            .map(|line| {
                serde_json::from_str::<serde_json::Value>(line).unwrap()["type"]
                    .as_str()
                    .unwrap()
                    .to_string()
            })
            .collect();
        assert!(kinds.contains(&"quest".to_string()));
        assert!(kinds.contains(&"play".to_string()));
    }
}
