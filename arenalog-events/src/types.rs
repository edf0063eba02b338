//! Domain values emitted by the parsers.
//!
//! Everything here is plain data: no identity beyond the fields, cheap to
//! clone, serializable so hosts can persist or forward without re-mapping.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub screen_name: String,
    pub client_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booster {
    pub collation_id: i64,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlayerInventory {
    pub gems: u32,
    pub gold: u32,
    /// Percent, derived from the client's per-mille `totalVaultProgress`.
    pub vault_progress: f64,
    pub wildcard_common: u32,
    pub wildcard_uncommon: u32,
    pub wildcard_rare: u32,
    pub wildcard_mythic: u32,
    pub boosters: Vec<Booster>,
    pub custom_tokens: HashMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatRank {
    pub season_ordinal: u32,
    pub class: String,
    pub level: u32,
    pub step: u32,
    pub percentile: f64,
}

/// The latest known ladder standing, one slot per queue family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlayerRank {
    pub constructed: Option<FormatRank>,
    pub limited: Option<FormatRank>,
    pub limited_matches_won: u32,
    pub limited_matches_lost: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    pub quest_id: String,
    /// Goal description key; Arena has no stable quest-type enum, so the
    /// localisation key stands in for one.
    pub quest_type: String,
    pub goal: u32,
    pub starting_progress: u32,
    pub ending_progress: u32,
    pub can_swap: bool,
    pub rewards: serde_json::Value,
    /// Daemon observation times, not log-line times: staleness decisions
    /// must reflect when we last saw the quest, even across replays.
    pub assigned_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed: bool,
    pub rerolled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DraftEventKind {
    Started,
    StatusUpdated,
    PickMade,
    Ended,
    SessionInfo,
}

/// One observation of a draft in progress. Session state (which pack we are
/// on, what has been picked so far) is the consumer's to maintain; each
/// event carries only what its log line said.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSessionEvent {
    pub kind: DraftEventKind,
    pub session_id: Option<String>,
    pub event_name: Option<String>,
    pub set_code: Option<String>,
    pub context: Option<String>,
    pub pack_number: Option<u32>,
    pub pick_number: Option<u32>,
    pub draft_pack: Vec<String>,
    pub picked_cards: Vec<String>,
    pub selected_cards: Vec<String>,
}

impl DraftSessionEvent {
    pub fn new(kind: DraftEventKind) -> Self {
        DraftSessionEvent {
            kind,
            session_id: None,
            event_name: None,
            set_code: None,
            context: None,
            pack_number: None,
            pick_number: None,
            draft_pack: Vec::new(),
            picked_cards: Vec::new(),
            selected_cards: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftPick {
    pub course_id: String,
    pub pack_number: u32,
    pub pick_number: u32,
    pub available_cards: Vec<u32>,
    pub selected_card: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckCard {
    pub card_id: u32,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerDeck {
    pub deck_id: String,
    pub name: String,
    pub format: Option<String>,
    pub main_deck: Vec<DeckCard>,
    pub sideboard: Vec<DeckCard>,
    pub description: Option<String>,
    /// Raw client timestamps; the wire format is not stable enough to parse.
    pub created_at: Option<String>,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum RankFormat {
    Constructed,
    Limited,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankUpdate {
    pub player_id: Option<String>,
    pub season_ordinal: u32,
    pub format: RankFormat,
    pub new_class: String,
    pub new_level: u32,
    pub new_step: u32,
    pub old_class: Option<String>,
    pub old_level: Option<u32>,
    pub old_step: Option<u32>,
    pub was_loss_protected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    pub game_number: u32,
    pub winning_team_id: u32,
    pub result_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub match_id: String,
    pub event_name: Option<String>,
    pub winning_team_id: u32,
    pub player_team_id: Option<u32>,
    /// `None` when the player's seat could not be identified.
    pub player_won: Option<bool>,
    pub games: Vec<GameResult>,
}

/// Card locations, numbered 1..=7 on the wire (`zoneId mod 10`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Hand,
    Library,
    Battlefield,
    Graveyard,
    Exile,
    Stack,
    Command,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlayerType {
    Player,
    Opponent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    PlayCard,
    LandDrop,
    Attack,
    Block,
}

/// A play-level action derived from the difference between two consecutive
/// game-state snapshots. `sequence_number` is strictly monotonic within one
/// observer run, across games.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GamePlayEvent {
    pub match_id: Option<String>,
    pub game_number: u32,
    pub turn_number: Option<u32>,
    pub phase: Option<String>,
    pub step: Option<String>,
    pub player_type: PlayerType,
    pub action_type: ActionType,
    pub card_id: u32,
    pub zone_from: Zone,
    pub zone_to: Zone,
    pub sequence_number: u64,
}

/// A card seen under the opponent's control, accumulated across snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpponentCard {
    pub card_id: u32,
    pub zone_observed: Zone,
    pub turn_first_seen: Option<u32>,
    pub times_seen: u32,
}

/// Per-turn board summary, taken from the last snapshot of each turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub turn_number: u32,
    pub player_life: i32,
    pub opponent_life: i32,
    pub player_hand_size: u32,
    pub opponent_hand_size: u32,
    pub player_lands: u32,
    pub opponent_lands: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardNode {
    pub node_id: String,
    pub state: String,
    pub progress: Option<u32>,
    pub goal: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphState {
    pub graph_id: Option<String>,
    pub nodes: Vec<RewardNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodicReward {
    pub reward_id: String,
    pub claimed: bool,
    pub next_reward_at: Option<String>,
}
