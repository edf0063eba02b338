//! Pairwise comparison of consecutive game-state snapshots.
//!
//! Zone changes become plays, `isAttacking`/`isBlocking` transitions become
//! combat events. Draws (`library → hand`) and the opening deal
//! (`unknown → hand`) are movements the player did not choose, so they are
//! suppressed.

use crate::types::{ActionType, GamePlayEvent, PlayerType, Zone};

use super::state::{GameObject, GreGameState};

/// Derive play events from one snapshot pair. `sequence` is the observer's
/// run-scoped counter; every emitted event increments it, so numbers are
/// strictly monotonic across the whole stream.
///
/// A snapshot without turn information never generates plays (the GRE sends
/// such messages during mulligans and sideboarding, where zone churn is not
/// player action); the caller still retains it as the new predecessor.
pub fn diff_states(
    prev: &GreGameState,
    curr: &GreGameState,
    player_seat: Option<u32>,
    sequence: &mut u64,
) -> Vec<GamePlayEvent> {
    let Some(turn_info) = &curr.turn_info else {
        return Vec::new();
    };

    let mut events = Vec::new();
    let mut emit = |object: &GameObject, action_type: ActionType, zone_from: Zone, zone_to: Zone| {
        *sequence += 1;
        events.push(GamePlayEvent {
            match_id: curr.match_id.clone(),
            game_number: curr.game_number,
            turn_number: turn_info.turn_number,
            phase: turn_info.phase.clone(),
            step: turn_info.step.clone(),
            player_type: classify(object.controller_seat_id, player_seat),
            action_type,
            card_id: object.grp_id,
            zone_from,
            zone_to,
            sequence_number: *sequence,
        });
    };

    for (instance_id, object) in &curr.game_objects {
        let previous = prev.game_objects.get(instance_id);
        let zone_from = previous.map(|p| p.zone).unwrap_or(Zone::Unknown);

        if previous.is_none() || zone_from != object.zone {
            let suppressed = object.zone == Zone::Hand
                && matches!(zone_from, Zone::Library | Zone::Unknown);
            if !suppressed {
                let action = if zone_from == Zone::Hand
                    && object.zone == Zone::Battlefield
                    && object.is_land()
                {
                    ActionType::LandDrop
                } else {
                    ActionType::PlayCard
                };
                emit(object, action, zone_from, object.zone);
            }
        }

        let was_attacking = previous.is_some_and(GameObject::is_attacking);
        if object.is_attacking() && !was_attacking {
            emit(object, ActionType::Attack, object.zone, object.zone);
        }

        let was_blocking = previous.is_some_and(GameObject::is_blocking);
        if object.is_blocking() && !was_blocking {
            emit(object, ActionType::Block, object.zone, object.zone);
        }
    }

    events
}

/// Seat rule: an object belongs to the player iff its controller seat is the
/// known player seat. With no seat known, everything defaults to opponent.
pub fn classify(controller_seat_id: u32, player_seat: Option<u32>) -> PlayerType {
    match player_seat {
        Some(seat) if controller_seat_id == seat => PlayerType::Player,
        _ => PlayerType::Opponent,
    }
}
