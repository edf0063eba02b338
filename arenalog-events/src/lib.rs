//! Domain events reconstructed from MTGA logs.
//!
//! Built on the entry stream from `logtail`, this crate supplies:
//!
//! - [`types`]: plain-data entities (profile, inventory, ranks, quests,
//!   drafts, decks, match results, play events)
//! - [`parse`]: stateless, tolerant parsers, one per payload family
//! - [`gre`]: the Game Rules Engine diff engine, deriving play-level
//!   actions from consecutive game-state snapshots
//! - [`json`]: the loose-`Value` navigation helpers the parsers share
//!
//! Parsers are at-least-once by design: replaying a log re-emits the same
//! values, and hosts are expected to upsert on natural keys (match id, deck
//! id, quest id, draft pick coordinates).

pub mod gre;
pub mod json;
pub mod parse;
pub mod types;

pub use gre::GameObserver;
pub use parse::{
    QuestLog, parse_decks, parse_draft_picks, parse_draft_session_event,
    parse_draft_session_events, parse_graph_states, parse_match_results, parse_periodic_rewards,
    parse_player_inventory, parse_player_profile, parse_player_rank, parse_quests,
    parse_rank_updates,
};
