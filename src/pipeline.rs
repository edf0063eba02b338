use std::collections::HashSet;
use std::time::Duration;

use arenalog_events::gre::GameObserver;
use arenalog_events::parse::{
    QuestLog, parse_decks, parse_draft_picks, parse_draft_session_events, parse_graph_states,
    parse_match_results, parse_periodic_rewards, parse_player_inventory, parse_player_profile,
    parse_player_rank, parse_rank_updates,
};
use arenalog_events::types::{
    DraftPick, DraftSessionEvent, GamePlayEvent, GraphState, MatchResult, PeriodicReward,
    PlayerDeck, PlayerInventory, PlayerProfile, PlayerRank, Quest, RankUpdate,
};
use log::{debug, info, warn};
use logtail::LogEntry;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::sink::EventSink;

/// Everything one batch of entries produced, ready for the sinks.
#[derive(Debug, Default, Serialize)]
pub struct DispatchBatch {
    pub profile: Option<PlayerProfile>,
    pub inventory: Option<PlayerInventory>,
    pub rank: Option<PlayerRank>,
    pub rank_updates: Vec<RankUpdate>,
    pub quests: Vec<Quest>,
    pub draft_events: Vec<DraftSessionEvent>,
    pub draft_picks: Vec<DraftPick>,
    pub decks: Vec<PlayerDeck>,
    pub match_results: Vec<MatchResult>,
    pub graph_states: Vec<GraphState>,
    pub periodic_rewards: Vec<PeriodicReward>,
    pub plays: Vec<GamePlayEvent>,
}

impl DispatchBatch {
    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }

    pub fn record_count(&self) -> usize {
        self.profile.is_some() as usize
            + self.inventory.is_some() as usize
            + self.rank.is_some() as usize
            + self.rank_updates.len()
            + self.quests.len()
            + self.draft_events.len()
            + self.draft_picks.len()
            + self.decks.len()
            + self.match_results.len()
            + self.graph_states.len()
            + self.periodic_rewards.len()
            + self.plays.len()
    }
}

/// Running totals across a dispatcher's lifetime.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DispatchTotals {
    pub batches: u64,
    pub entries: u64,
    pub records: u64,
    pub plays: u64,
    pub match_results: u64,
}

/// Applies every parser to each incoming batch and forwards the results to
/// the sinks. Cross-batch state lives here: quest bookkeeping, the GRE
/// observer (seat, previous snapshot, sequence counter), and the in-run
/// dedup caches that keep a log replay from re-emitting the same match or
/// draft pick twice in one process. Dedup against *persisted* history is
/// the host's job; parsers stay at-least-once.
pub struct Dispatcher {
    sinks: Vec<Box<dyn EventSink>>,
    quests: QuestLog,
    observer: GameObserver,
    player_id: Option<String>,
    seen_matches: HashSet<String>,
    seen_picks: HashSet<(String, u32, u32)>,
    totals: DispatchTotals,
}

impl Dispatcher {
    pub fn new(sinks: Vec<Box<dyn EventSink>>) -> Self {
        Dispatcher {
            sinks,
            quests: QuestLog::new(),
            observer: GameObserver::new(),
            player_id: None,
            seen_matches: HashSet::new(),
            seen_picks: HashSet::new(),
            totals: DispatchTotals::default(),
        }
    }

    pub fn totals(&self) -> DispatchTotals {
        self.totals
    }

    pub async fn dispatch(&mut self, entries: &[LogEntry]) {
        if entries.is_empty() {
            return;
        }
        self.totals.batches += 1;
        self.totals.entries += entries.len() as u64;

        let mut batch = DispatchBatch::default();

        batch.profile = parse_player_profile(entries);
        if let Some(profile) = &batch.profile {
            if self.player_id.is_none() {
                info!("identified player {} ({})", profile.screen_name, profile.client_id);
            }
            self.player_id = Some(profile.client_id.clone());
        }

        batch.inventory = parse_player_inventory(entries);
        batch.rank = parse_player_rank(entries);
        batch.rank_updates = parse_rank_updates(entries);

        self.quests.observe(entries);
        if entries.iter().any(mentions_quests) {
            batch.quests = self.quests.quests();
        }

        batch.draft_events = parse_draft_session_events(entries);
        batch.draft_picks = parse_draft_picks(entries)
            .into_values()
            .flatten()
            .filter(|pick| {
                self.seen_picks
                    .insert((pick.course_id.clone(), pick.pack_number, pick.pick_number))
            })
            .collect();

        batch.decks = parse_decks(entries);
        batch.match_results = parse_match_results(entries, self.player_id.as_deref())
            .into_iter()
            .filter(|result| self.seen_matches.insert(result.match_id.clone()))
            .collect();

        batch.graph_states = parse_graph_states(entries);
        batch.periodic_rewards = parse_periodic_rewards(entries);

        self.observer.observe_entries(entries);
        batch.plays = self.observer.drain_plays();

        if batch.is_empty() {
            debug!("batch of {} entries produced no records", entries.len());
            return;
        }

        self.totals.records += batch.record_count() as u64;
        self.totals.plays += batch.plays.len() as u64;
        self.totals.match_results += batch.match_results.len() as u64;
        info!(
            "dispatching {} records from {} entries ({} plays, {} match results)",
            batch.record_count(),
            entries.len(),
            batch.plays.len(),
            batch.match_results.len()
        );

        for sink in &mut self.sinks {
            if let Err(err) = sink.record_batch(&batch).await {
                warn!("sink error: {err}");
            }
        }
    }

    pub async fn flush(&mut self) {
        for sink in &mut self.sinks {
            if let Err(err) = sink.flush().await {
                warn!("sink flush error: {err}");
            }
        }
    }
}

fn mentions_quests(entry: &LogEntry) -> bool {
    if !entry.is_json {
        return false;
    }
    let Some(object) = entry.json.as_object() else {
        return false;
    };
    object.contains_key("newQuests")
        || object.contains_key("NewQuests")
        || ((object.contains_key("quests") || object.contains_key("Quests"))
            && (object.contains_key("canSwap") || object.contains_key("CanSwap")))
}

/// Drain the aggregated entry stream into the dispatcher: flush on batch
/// size, on the timer, and once more on shutdown.
pub async fn run_dispatch_loop(
    mut rx: mpsc::Receiver<LogEntry>,
    dispatcher: &mut Dispatcher,
    cancel: CancellationToken,
    batch_size: usize,
    flush_interval: Duration,
) {
    let mut pending: Vec<LogEntry> = Vec::with_capacity(batch_size);
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            entry = rx.recv() => match entry {
                Some(entry) => {
                    pending.push(entry);
                    if pending.len() >= batch_size {
                        dispatcher.dispatch(&pending).await;
                        pending.clear();
                    }
                }
                None => break,
            },
            _ = ticker.tick() => {
                if !pending.is_empty() {
                    dispatcher.dispatch(&pending).await;
                    pending.clear();
                }
            }
        }
    }

    if !pending.is_empty() {
        dispatcher.dispatch(&pending).await;
    }
    dispatcher.flush().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::SinkError;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Test sink that remembers per-batch record counts by family.
    #[derive(Default, Clone)]
    struct CollectSink {
        batches: Arc<Mutex<Vec<serde_json::Value>>>,
    }

    #[async_trait]
    impl EventSink for CollectSink {
        async fn record_batch(&mut self, batch: &DispatchBatch) -> Result<(), SinkError> {
            self.batches
                .lock()
                .unwrap()
                .push(serde_json::to_value(batch)?);
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    fn entry(line: &str) -> LogEntry {
        LogEntry::parse(line)
    }

    fn match_payload(match_id: &str) -> LogEntry {
        entry(&format!(
            concat!(
                r#"{{"matchGameRoomStateChangedEvent":{{"gameRoomInfo":{{"#,
                r#""gameRoomConfig":{{"matchId":"{id}","reservedPlayers":[{{"userId":"u","teamId":1}}]}},"#,
                r#""finalMatchResult":{{"matchId":"{id}","resultList":["#,
                r#"{{"scope":"MatchScope_Match","winningTeamId":1}}]}}}}}}}}"#
            ),
            id = match_id
        ))
    }

    #[tokio::test]
    async fn repeated_match_results_are_deduplicated_within_a_run() {
        let sink = CollectSink::default();
        let batches = Arc::clone(&sink.batches);
        let mut dispatcher = Dispatcher::new(vec![Box::new(sink)]);

        dispatcher.dispatch(&[match_payload("m-1")]).await;
        dispatcher.dispatch(&[match_payload("m-1")]).await;
        dispatcher.dispatch(&[match_payload("m-2")]).await;

        let batches = batches.lock().unwrap();
        let match_counts: Vec<usize> = batches
            .iter()
            .map(|batch| batch["match_results"].as_array().unwrap().len())
            .collect();
        // The replayed m-1 batch has no other records, so it never reaches
        // the sink at all.
        assert_eq!(match_counts, [1, 1]);
        assert_eq!(dispatcher.totals().match_results, 2);
    }

    #[tokio::test]
    async fn quest_records_only_ship_when_quest_payloads_appear() {
        let sink = CollectSink::default();
        let batches = Arc::clone(&sink.batches);
        let mut dispatcher = Dispatcher::new(vec![Box::new(sink)]);

        dispatcher
            .dispatch(&[entry(
                r#"{"quests":[{"questId":"q1","locKey":"Win 2 games","goal":2,"endingProgress":1}],"canSwap":true}"#,
            )])
            .await;
        dispatcher.dispatch(&[match_payload("m-9")]).await;

        let batches = batches.lock().unwrap();
        assert_eq!(batches[0]["quests"].as_array().unwrap().len(), 1);
        assert!(batches[1]["quests"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn draft_picks_are_deduplicated_by_coordinates() {
        let sink = CollectSink::default();
        let batches = Arc::clone(&sink.batches);
        let mut dispatcher = Dispatcher::new(vec![Box::new(sink)]);

        let pick = r#"{"humanDraftEvent":{"CourseId":"c-1","SelfPack":1,"SelfPick":1,"SelectedCard":42}}"#;
        dispatcher.dispatch(&[entry(pick)]).await;
        dispatcher.dispatch(&[entry(pick)]).await;

        let batches = batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0]["draft_picks"].as_array().unwrap().len(), 1);
    }
}
