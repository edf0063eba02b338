use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use log::info;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

use crate::pipeline::DispatchBatch;

#[derive(Debug, Error, Diagnostic)]
pub enum SinkError {
    #[error("failed to write {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode a record")]
    Encode(#[from] serde_json::Error),
}

/// Where dispatched entities go. The daemon treats sinks as advisory: a
/// failing sink is logged and the pipeline keeps running.
#[async_trait]
pub trait EventSink: Send {
    async fn record_batch(&mut self, batch: &DispatchBatch) -> Result<(), SinkError>;
    async fn flush(&mut self) -> Result<(), SinkError>;
}

/// Appends one JSON object per entity to a JSONL file, buffered between
/// flushes so a burst of batches costs one file open.
pub struct JsonlSink {
    path: PathBuf,
    buffer: Vec<serde_json::Value>,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonlSink {
            path: path.into(),
            buffer: Vec::new(),
        }
    }

    fn record(&mut self, kind: &str, data: serde_json::Value) {
        self.buffer.push(json!({ "type": kind, "data": data }));
    }
}

#[async_trait]
impl EventSink for JsonlSink {
    async fn record_batch(&mut self, batch: &DispatchBatch) -> Result<(), SinkError> {
        if let Some(profile) = &batch.profile {
            self.record("profile", serde_json::to_value(profile)?);
        }
        if let Some(inventory) = &batch.inventory {
            self.record("inventory", serde_json::to_value(inventory)?);
        }
        if let Some(rank) = &batch.rank {
            self.record("rank", serde_json::to_value(rank)?);
        }
        for update in &batch.rank_updates {
            self.record("rank_update", serde_json::to_value(update)?);
        }
        for quest in &batch.quests {
            self.record("quest", serde_json::to_value(quest)?);
        }
        for event in &batch.draft_events {
            self.record("draft_event", serde_json::to_value(event)?);
        }
        for pick in &batch.draft_picks {
            self.record("draft_pick", serde_json::to_value(pick)?);
        }
        for deck in &batch.decks {
            self.record("deck", serde_json::to_value(deck)?);
        }
        for result in &batch.match_results {
            self.record("match_result", serde_json::to_value(result)?);
        }
        for graph in &batch.graph_states {
            self.record("graph_state", serde_json::to_value(graph)?);
        }
        for reward in &batch.periodic_rewards {
            self.record("periodic_reward", serde_json::to_value(reward)?);
        }
        for play in &batch.plays {
            self.record("play", serde_json::to_value(play)?);
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let io_error = |source| SinkError::Io {
            path: self.path.clone(),
            source,
        };
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_error)?;
        for record in &self.buffer {
            writeln!(file, "{record}").map_err(|source| SinkError::Io {
                path: self.path.clone(),
                source,
            })?;
        }
        info!(
            "flushed {} records to {}",
            self.buffer.len(),
            self.path.display()
        );
        self.buffer.clear();
        Ok(())
    }
}

/// Summarises each batch at info level; useful as the only sink when no
/// persistence is configured.
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    async fn record_batch(&mut self, batch: &DispatchBatch) -> Result<(), SinkError> {
        info!(
            "batch: {} records ({} quests, {} draft events, {} decks, {} matches, {} plays)",
            batch.record_count(),
            batch.quests.len(),
            batch.draft_events.len(),
            batch.decks.len(),
            batch.match_results.len(),
            batch.plays.len()
        );
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arenalog_events::types::{PlayerProfile, RankFormat, RankUpdate};

    fn sample_batch() -> DispatchBatch {
        let mut batch = DispatchBatch::default();
        batch.profile = Some(PlayerProfile {
            screen_name: "Me#12345".to_string(),
            client_id: "me-1".to_string(),
        });
        batch.rank_updates = vec![
            RankUpdate {
                player_id: None,
                season_ordinal: 14,
                format: RankFormat::Constructed,
                new_class: "Gold".to_string(),
                new_level: 4,
                new_step: 2,
                old_class: None,
                old_level: None,
                old_step: None,
                was_loss_protected: false,
            };
            2
        ];
        batch
    }

    #[tokio::test]
    async fn jsonl_sink_writes_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut sink = JsonlSink::new(&path);

        sink.record_batch(&sample_batch()).await.unwrap();
        sink.flush().await.unwrap();
        // A second flush with nothing buffered appends nothing.
        sink.flush().await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["type"], "profile");
        assert_eq!(first["data"]["screen_name"], "Me#12345");
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["type"], "rank_update");
    }

    #[tokio::test]
    async fn flushes_append_rather_than_truncate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut sink = JsonlSink::new(&path);

        sink.record_batch(&sample_batch()).await.unwrap();
        sink.flush().await.unwrap();
        sink.record_batch(&sample_batch()).await.unwrap();
        sink.flush().await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 6);
    }
}
