use std::collections::{HashMap, HashSet};

use chrono::Utc;
use log::debug;
use logtail::LogEntry;
use serde_json::Value;

use crate::json;
use crate::types::Quest;

/// Quest bookkeeping across successive log snapshots.
///
/// Arena never logs an explicit "quest complete" event. A `QuestGetQuests`
/// response is a complete snapshot of the active quests at that moment, so
/// a quest disappearing from a later snapshot *is* the completion signal.
/// A quest id reappearing with a different goal (or with its progress reset)
/// means the old quest was rerolled into a new one; the old record keeps its
/// progress and the new one starts a separate life under the same id.
///
/// All observation times are processing time, not log time: staleness
/// decisions downstream must reflect when the daemon last saw a quest,
/// regardless of how old the replayed log is.
#[derive(Debug, Default)]
pub struct QuestLog {
    records: Vec<Quest>,
    active: HashMap<String, usize>,
}

impl QuestLog {
    pub fn new() -> Self {
        QuestLog::default()
    }

    pub fn observe(&mut self, entries: &[LogEntry]) {
        for entry in entries.iter().filter(|e| e.is_json) {
            self.observe_payload(&entry.json);
        }
    }

    pub fn quests(&self) -> Vec<Quest> {
        self.records.clone()
    }

    pub fn into_quests(self) -> Vec<Quest> {
        self.records
    }

    fn observe_payload(&mut self, payload: &Value) {
        if let Some(items) = json::array_field(payload, &["newQuests", "NewQuests"]) {
            for item in items {
                if let Some(parsed) = ParsedQuest::from_value(item, None) {
                    self.upsert(parsed);
                }
            }
        }

        // A QuestGetQuests response carries the quest array *and* a
        // top-level canSwap flag. Anything else mentioning `quests` is not
        // a snapshot and must not trigger completion-by-disappearance.
        let quests = json::array_field(payload, &["quests", "Quests"]);
        let can_swap = json::bool_field(payload, &["canSwap", "CanSwap"]);
        let (Some(items), Some(can_swap)) = (quests, can_swap) else {
            return;
        };

        let mut current_ids = HashSet::new();
        for item in items {
            if let Some(parsed) = ParsedQuest::from_value(item, Some(can_swap)) {
                current_ids.insert(parsed.quest_id.clone());
                self.upsert(parsed);
            }
        }
        self.complete_missing(&current_ids);
    }

    fn upsert(&mut self, parsed: ParsedQuest) {
        let now = Utc::now();
        match self.active.get(&parsed.quest_id).copied() {
            Some(index) => {
                let existing = &mut self.records[index];
                let progress_reset =
                    parsed.ending_progress == 0 && existing.ending_progress > 0;
                let identity_changed = parsed.quest_type != existing.quest_type
                    || parsed.goal != existing.goal;
                if identity_changed || progress_reset {
                    // Reroll: retire the old record with its progress intact
                    // and start a fresh one under the same id.
                    existing.rerolled = true;
                    let record = parsed.into_quest();
                    self.active.insert(record.quest_id.clone(), self.records.len());
                    self.records.push(record);
                } else {
                    existing.ending_progress = parsed.ending_progress;
                    existing.can_swap = parsed.can_swap;
                    existing.last_seen_at = now;
                }
            }
            None => {
                let record = parsed.into_quest();
                self.active.insert(record.quest_id.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    fn complete_missing(&mut self, current_ids: &HashSet<String>) {
        let now = Utc::now();
        let missing: Vec<usize> = self
            .active
            .iter()
            .filter(|(id, _)| !current_ids.contains(*id))
            .map(|(_, index)| *index)
            .collect();
        for index in missing {
            let quest = &mut self.records[index];
            if quest.completed {
                continue;
            }
            quest.completed = true;
            quest.completed_at = Some(now);
            quest.ending_progress = quest.goal;
            debug!("quest {} completed by disappearance", quest.quest_id);
            self.active.remove(&quest.quest_id);
        }
    }
}

/// Pure wrapper over [`QuestLog`] for one-shot batches.
pub fn parse_quests(entries: &[LogEntry]) -> Vec<Quest> {
    let mut log = QuestLog::new();
    log.observe(entries);
    log.into_quests()
}

struct ParsedQuest {
    quest_id: String,
    quest_type: String,
    goal: u32,
    starting_progress: u32,
    ending_progress: u32,
    can_swap: bool,
    rewards: Value,
}

impl ParsedQuest {
    fn from_value(item: &Value, snapshot_can_swap: Option<bool>) -> Option<Self> {
        let quest_id = json::string_field(item, &["questId", "QuestId", "id", "Id"])?;
        // Arena has no stable quest-type enum; the localisation key doubles
        // as the quest's identity for reroll detection.
        let quest_type = json::string_field(item, &["questType", "QuestType"])
            .or_else(|| json::string_field(item, &["locKey", "LocKey"]))
            .unwrap_or_default();
        let goal = json::u32_field(item, &["goal", "Goal"]).unwrap_or(0);
        let ending_progress =
            json::u32_field(item, &["endingProgress", "EndingProgress"]).unwrap_or(0);
        let starting_progress = json::u32_field(item, &["startingProgress", "StartingProgress"])
            .unwrap_or(ending_progress);
        let can_swap = json::bool_field(item, &["canSwap", "CanSwap"])
            .or(snapshot_can_swap)
            .unwrap_or(false);
        let rewards = json::field(item, &["chestDescription", "ChestDescription", "rewards"])
            .cloned()
            .unwrap_or(Value::Null);
        Some(ParsedQuest {
            quest_id,
            quest_type,
            goal,
            starting_progress,
            ending_progress,
            can_swap,
            rewards,
        })
    }

    fn into_quest(self) -> Quest {
        let now = Utc::now();
        Quest {
            quest_id: self.quest_id,
            quest_type: self.quest_type,
            goal: self.goal,
            starting_progress: self.starting_progress,
            ending_progress: self.ending_progress,
            can_swap: self.can_swap,
            rewards: self.rewards,
            assigned_at: now,
            last_seen_at: now,
            completed_at: None,
            completed: false,
            rerolled: false,
        }
    }
}
