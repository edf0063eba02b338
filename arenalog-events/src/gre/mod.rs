//! Game Rules Engine snapshot capture and diffing.

pub mod diff;
pub mod observe;
pub mod state;

pub use diff::{classify, diff_states};
pub use observe::GameObserver;
pub use state::{
    GameObject, GreGameState, GrePlayer, TurnInfo, find_player_seat, parse_gre_messages,
    zone_from_id,
};
