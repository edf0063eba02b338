//! Stateless parsers over batches of log entries.
//!
//! Shared contract: pure over their input slice, tolerant (a malformed
//! record is skipped, never the batch), and order-aware. Latest-wins
//! parsers scan newest-to-oldest and stop at the first complete match;
//! history parsers scan oldest-to-newest and emit every match.

pub mod decks;
pub mod draft;
pub mod inventory;
pub mod matches;
pub mod profile;
pub mod quests;
pub mod rank;
pub mod rewards;

pub use decks::parse_decks;
pub use draft::{
    extract_set_code, parse_draft_picks, parse_draft_session_event, parse_draft_session_events,
};
pub use inventory::parse_player_inventory;
pub use matches::parse_match_results;
pub use profile::parse_player_profile;
pub use quests::{QuestLog, parse_quests};
pub use rank::{parse_player_rank, parse_rank_updates};
pub use rewards::{parse_graph_states, parse_periodic_rewards};
