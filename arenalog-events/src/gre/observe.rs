//! Streaming fold over game-state snapshots.
//!
//! [`GameObserver`] owns everything the diff needs between batches: the
//! player seat, the previous snapshot, the run-scoped sequence counter, the
//! opponent-card ledger, and the per-turn board summaries. Hosts feed it
//! entry batches as they arrive and drain plays whenever convenient.

use std::collections::BTreeMap;

use log::debug;
use logtail::LogEntry;

use crate::types::{GamePlayEvent, GameSnapshot, OpponentCard, Zone};

use super::diff::diff_states;
use super::state::{GreGameState, find_player_seat, parse_gre_messages};

#[derive(Debug, Default)]
pub struct GameObserver {
    player_seat: Option<u32>,
    prev: Option<GreGameState>,
    sequence: u64,
    plays: Vec<GamePlayEvent>,
    opponent_cards: BTreeMap<u32, OpponentCard>,
    turn_snapshots: BTreeMap<u32, GameSnapshot>,
}

impl GameObserver {
    pub fn new() -> Self {
        GameObserver::default()
    }

    pub fn player_seat(&self) -> Option<u32> {
        self.player_seat
    }

    pub fn set_player_seat(&mut self, seat: u32) {
        self.player_seat = Some(seat);
    }

    /// Feed a batch of entries: picks up the player seat if it is still
    /// unknown, then folds every game-state message in the batch.
    pub fn observe_entries(&mut self, entries: &[LogEntry]) {
        if self.player_seat.is_none() {
            self.player_seat = find_player_seat(entries);
            if let Some(seat) = self.player_seat {
                debug!("identified player seat {seat}");
            }
        }
        for state in parse_gre_messages(entries) {
            self.observe_state(state);
        }
    }

    pub fn observe_state(&mut self, state: GreGameState) {
        // A snapshot from a different game must not be diffed against the
        // previous game's board.
        let game_changed = self.prev.as_ref().is_some_and(|prev| {
            prev.game_number != state.game_number || prev.match_id != state.match_id
        });
        if game_changed {
            self.prev = None;
        }

        self.collect_opponent_cards(&state);
        self.record_turn_snapshot(&state);

        if let Some(prev) = &self.prev {
            let events = diff_states(prev, &state, self.player_seat, &mut self.sequence);
            self.plays.extend(events);
        }
        self.prev = Some(state);
    }

    /// Take the plays accumulated since the last drain.
    pub fn drain_plays(&mut self) -> Vec<GamePlayEvent> {
        std::mem::take(&mut self.plays)
    }

    pub fn opponent_cards(&self) -> Vec<OpponentCard> {
        self.opponent_cards.values().cloned().collect()
    }

    pub fn game_snapshots(&self) -> Vec<GameSnapshot> {
        self.turn_snapshots.values().cloned().collect()
    }

    fn collect_opponent_cards(&mut self, state: &GreGameState) {
        let turn_number = state
            .turn_info
            .as_ref()
            .and_then(|info| info.turn_number);
        for object in state.game_objects.values() {
            // grpId 0 is a face-down or not-yet-revealed object; nothing to
            // track until the GRE tells us what it is.
            if object.grp_id == 0 {
                continue;
            }
            let is_opponents = match self.player_seat {
                Some(seat) => object.controller_seat_id != seat,
                None => true,
            };
            if !is_opponents {
                continue;
            }
            self.opponent_cards
                .entry(object.grp_id)
                .and_modify(|card| {
                    card.times_seen += 1;
                    if zone_preference(object.zone) > zone_preference(card.zone_observed) {
                        card.zone_observed = object.zone;
                    }
                })
                .or_insert(OpponentCard {
                    card_id: object.grp_id,
                    zone_observed: object.zone,
                    turn_first_seen: turn_number,
                    times_seen: 1,
                });
        }
    }

    fn record_turn_snapshot(&mut self, state: &GreGameState) {
        let Some(turn_number) = state
            .turn_info
            .as_ref()
            .and_then(|info| info.turn_number)
        else {
            return;
        };
        // Seat 1 is the de-facto default before the seat is known; life
        // totals still line up for the common case of the local player
        // connecting first.
        let seat = self.player_seat.unwrap_or(1);

        let life = |ours: bool| {
            state
                .players
                .iter()
                .find(|player| (player.seat_id == seat) == ours)
                .map(|player| player.life_total)
                .unwrap_or(0)
        };
        let count = |ours: bool, zone: Zone, lands_only: bool| {
            state
                .game_objects
                .values()
                .filter(|object| (object.controller_seat_id == seat) == ours)
                .filter(|object| object.zone == zone)
                .filter(|object| !lands_only || object.is_land())
                .count() as u32
        };

        // Later snapshots of the same turn overwrite earlier ones, so each
        // turn keeps its final board state.
        self.turn_snapshots.insert(
            turn_number,
            GameSnapshot {
                turn_number,
                player_life: life(true),
                opponent_life: life(false),
                player_hand_size: count(true, Zone::Hand, false),
                opponent_hand_size: count(false, Zone::Hand, false),
                player_lands: count(true, Zone::Battlefield, true),
                opponent_lands: count(false, Zone::Battlefield, true),
            },
        );
    }
}

/// Where a card was observed matters: battlefield beats hand beats
/// graveyard, so the record converges on the most informative sighting.
fn zone_preference(zone: Zone) -> u8 {
    match zone {
        Zone::Battlefield => 3,
        Zone::Hand => 2,
        Zone::Graveyard => 1,
        _ => 0,
    }
}
