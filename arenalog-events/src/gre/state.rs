//! Snapshot capture for Game Rules Engine state messages.
//!
//! The GRE streams `GREMessageType_GameStateMessage` deltas to the client;
//! each one is a (possibly partial) picture of the board. This module turns
//! an entry batch into ordered [`GreGameState`] values and identifies which
//! seat belongs to the local player. Deriving plays from consecutive
//! snapshots happens in [`super::diff`].

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use logtail::{LogEntry, parse_log_timestamp};
use serde_json::Value;

use crate::json;
use crate::types::Zone;

pub fn zone_from_id(zone_id: u32) -> Zone {
    match zone_id % 10 {
        1 => Zone::Hand,
        2 => Zone::Library,
        3 => Zone::Battlefield,
        4 => Zone::Graveyard,
        5 => Zone::Exile,
        6 => Zone::Stack,
        7 => Zone::Command,
        _ => Zone::Unknown,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnInfo {
    pub turn_number: Option<u32>,
    pub phase: Option<String>,
    pub step: Option<String>,
    pub active_player: Option<u32>,
    pub priority_player: Option<u32>,
    pub decision_player: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GrePlayer {
    pub seat_id: u32,
    pub life_total: i32,
    pub team_id: u32,
    pub max_hand_size: u32,
    pub timer_state: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameObject {
    pub instance_id: u32,
    pub grp_id: u32,
    pub owner_seat_id: u32,
    pub controller_seat_id: u32,
    pub zone: Zone,
    pub card_types: Vec<String>,
    pub power: Option<i32>,
    pub toughness: Option<i32>,
    pub is_tapped: bool,
    pub attack_state: Option<String>,
    pub block_state: Option<String>,
    pub counters: HashMap<String, u32>,
}

impl GameObject {
    pub fn is_attacking(&self) -> bool {
        self.attack_state.as_deref() == Some("AttackState_Attacking")
    }

    pub fn is_blocking(&self) -> bool {
        self.block_state.as_deref() == Some("BlockState_Blocking")
    }

    pub fn is_land(&self) -> bool {
        self.card_types.iter().any(|t| t.contains("Land"))
    }
}

/// One decoded game-state message. Held only long enough to diff against
/// its successor; the observer never retains full history.
#[derive(Debug, Clone, PartialEq)]
pub struct GreGameState {
    pub match_id: Option<String>,
    pub game_number: u32,
    pub turn_info: Option<TurnInfo>,
    pub players: Vec<GrePlayer>,
    /// Keyed by instance id; a duplicate instance in one message keeps the
    /// last occurrence. Ordered so that diff output is deterministic.
    pub game_objects: BTreeMap<u32, GameObject>,
    pub timestamp: DateTime<Utc>,
}

/// Extract every game-state message from a batch, in log order.
pub fn parse_gre_messages(entries: &[LogEntry]) -> Vec<GreGameState> {
    let mut states = Vec::new();
    for entry in entries.iter().filter(|e| e.is_json) {
        let Some(messages) =
            json::path(&entry.json, &["greToClientEvent", "greToClientMessages"])
                .and_then(Value::as_array)
        else {
            continue;
        };
        let match_id = json::string_field(&entry.json, &["matchId", "MatchId"]);
        let timestamp = parse_log_timestamp(&entry.timestamp);
        for message in messages {
            if json::str_field(message, &["type"]) != Some("GREMessageType_GameStateMessage") {
                continue;
            }
            states.push(state_from_message(message, match_id.clone(), timestamp));
        }
    }
    states
}

fn state_from_message(
    message: &Value,
    match_id: Option<String>,
    timestamp: DateTime<Utc>,
) -> GreGameState {
    // The interesting fields live under `gameStateMessage`; tolerate payloads
    // that inline them at the message level.
    let state = json::field(message, &["gameStateMessage"]).unwrap_or(message);

    let turn_info = json::field(state, &["turnInfo"]).map(|info| TurnInfo {
        turn_number: json::u32_field(info, &["turnNumber"]),
        phase: json::string_field(info, &["phase"]),
        step: json::string_field(info, &["step"]),
        active_player: json::u32_field(info, &["activePlayer"]),
        priority_player: json::u32_field(info, &["priorityPlayer"]),
        decision_player: json::u32_field(info, &["decisionPlayer"]),
    });

    let players = json::array_field(state, &["players"])
        .map(|players| {
            players
                .iter()
                .filter_map(|player| {
                    Some(GrePlayer {
                        seat_id: json::u32_field(
                            player,
                            &["systemSeatNumber", "systemSeatId", "seatId"],
                        )?,
                        life_total: json::i32_field(player, &["lifeTotal"]).unwrap_or(0),
                        team_id: json::u32_field(player, &["teamId"]).unwrap_or(0),
                        max_hand_size: json::u32_field(player, &["maxHandSize"]).unwrap_or(7),
                        timer_state: json::string_field(player, &["timerState"]),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let mut game_objects = BTreeMap::new();
    for object in json::array_field(state, &["gameObjects"]).into_iter().flatten() {
        if let Some(object) = game_object_from(object) {
            // Last occurrence of an instance id wins.
            game_objects.insert(object.instance_id, object);
        }
    }

    GreGameState {
        match_id,
        game_number: json::path(state, &["gameInfo", "gameNumber"])
            .and_then(json::as_u32)
            .or_else(|| json::u32_field(state, &["gameNumber"]))
            .unwrap_or(1),
        turn_info,
        players,
        game_objects,
        timestamp,
    }
}

fn game_object_from(value: &Value) -> Option<GameObject> {
    let instance_id = json::u32_field(value, &["instanceId"])?;
    let counters = json::array_field(value, &["counters"])
        .map(|counters| {
            let mut map: HashMap<String, u32> = HashMap::new();
            for counter in counters {
                let Some(kind) = json::string_field(counter, &["counterType", "type"]) else {
                    continue;
                };
                let count = json::u32_field(counter, &["count"]).unwrap_or(1);
                *map.entry(kind).or_insert(0) += count;
            }
            map
        })
        .unwrap_or_default();

    Some(GameObject {
        instance_id,
        grp_id: json::u32_field(value, &["grpId"]).unwrap_or(0),
        owner_seat_id: json::u32_field(value, &["ownerSeatId"]).unwrap_or(0),
        controller_seat_id: json::u32_field(value, &["controllerSeatId"]).unwrap_or(0),
        zone: json::u32_field(value, &["zoneId"])
            .map(zone_from_id)
            .unwrap_or(Zone::Unknown),
        card_types: json::field(value, &["cardTypes"])
            .map(json::string_list)
            .unwrap_or_default(),
        power: json::field(value, &["power"]).and_then(stat_value),
        toughness: json::field(value, &["toughness"]).and_then(stat_value),
        is_tapped: json::bool_field(value, &["isTapped"]).unwrap_or(false),
        attack_state: json::string_field(value, &["attackState"]),
        block_state: json::string_field(value, &["blockState"]),
        counters,
    })
}

/// Power/toughness arrive either as a bare number or as `{"value": n}`.
fn stat_value(value: &Value) -> Option<i32> {
    value
        .as_i64()
        .or_else(|| json::path(value, &["value"]).and_then(Value::as_i64))
        .and_then(|n| i32::try_from(n).ok())
}

/// Find the local player's seat: a `connectResp.systemSeatIds[0]` wins,
/// otherwise the first entry of the game room's reserved players. First
/// success across the batch wins.
pub fn find_player_seat(entries: &[LogEntry]) -> Option<u32> {
    entries
        .iter()
        .filter(|e| e.is_json)
        .find_map(|entry| connect_seat(&entry.json).or_else(|| reserved_seat(&entry.json)))
}

fn connect_seat(payload: &Value) -> Option<u32> {
    if let Some(seat) = first_seat(json::path(payload, &["connectResp", "systemSeatIds"])) {
        return Some(seat);
    }
    // connectResp usually arrives wrapped in a greToClientEvent envelope.
    json::path(payload, &["greToClientEvent", "greToClientMessages"])?
        .as_array()?
        .iter()
        .find_map(|message| first_seat(json::path(message, &["connectResp", "systemSeatIds"])))
}

fn first_seat(seats: Option<&Value>) -> Option<u32> {
    seats?.as_array()?.first().and_then(json::as_u32)
}

fn reserved_seat(payload: &Value) -> Option<u32> {
    json::path(
        payload,
        &[
            "matchGameRoomStateChangedEvent",
            "gameRoomInfo",
            "gameRoomConfig",
            "reservedPlayers",
        ],
    )?
    .as_array()?
    .first()
    .and_then(|player| json::u32_field(player, &["systemSeatId", "SystemSeatId"]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(line: &str) -> LogEntry {
        let entry = LogEntry::parse(line);
        assert!(entry.is_json, "test payload must be valid JSON: {line}");
        entry
    }

    #[test]
    fn zone_ids_map_by_last_digit() {
        assert_eq!(zone_from_id(1), Zone::Hand);
        assert_eq!(zone_from_id(3), Zone::Battlefield);
        assert_eq!(zone_from_id(31), Zone::Hand);
        assert_eq!(zone_from_id(37), Zone::Command);
        assert_eq!(zone_from_id(0), Zone::Unknown);
    }

    #[test]
    fn only_game_state_messages_are_kept() {
        let entries = vec![entry(concat!(
            r#"{"matchId":"m-1","greToClientEvent":{"greToClientMessages":["#,
            r#"{"type":"GREMessageType_ConnectResp","connectResp":{"systemSeatIds":[2]}},"#,
            r#"{"type":"GREMessageType_GameStateMessage","gameStateMessage":{"#,
            r#""turnInfo":{"turnNumber":3,"phase":"Phase_Main1","activePlayer":1},"#,
            r#""players":[{"systemSeatNumber":1,"lifeTotal":17,"teamId":1,"maxHandSize":7}],"#,
            r#""gameObjects":[{"instanceId":200,"grpId":67890,"controllerSeatId":1,"zoneId":1,"#,
            r#""cardTypes":["CardType_Land"]}]}}]}}"#
        ))];
        let states = parse_gre_messages(&entries);
        assert_eq!(states.len(), 1);
        let state = &states[0];
        assert_eq!(state.match_id.as_deref(), Some("m-1"));
        assert_eq!(state.turn_info.as_ref().unwrap().turn_number, Some(3));
        assert_eq!(state.players[0].life_total, 17);
        let object = &state.game_objects[&200];
        assert_eq!(object.zone, Zone::Hand);
        assert!(object.is_land());
    }

    #[test]
    fn duplicate_instances_keep_the_last_occurrence() {
        let entries = vec![entry(concat!(
            r#"{"greToClientEvent":{"greToClientMessages":[{"type":"GREMessageType_GameStateMessage","#,
            r#""gameStateMessage":{"gameObjects":["#,
            r#"{"instanceId":7,"grpId":11,"controllerSeatId":1,"zoneId":1},"#,
            r#"{"instanceId":7,"grpId":11,"controllerSeatId":1,"zoneId":3}]}}]}}"#
        ))];
        let states = parse_gre_messages(&entries);
        assert_eq!(states[0].game_objects[&7].zone, Zone::Battlefield);
    }

    #[test]
    fn power_accepts_both_encodings() {
        assert_eq!(stat_value(&serde_json::json!(3)), Some(3));
        assert_eq!(stat_value(&serde_json::json!({"value": 5})), Some(5));
        assert_eq!(stat_value(&serde_json::json!("x")), None);
    }

    #[test]
    fn seat_comes_from_connect_resp_first() {
        let entries = vec![
            entry(concat!(
                r#"{"matchGameRoomStateChangedEvent":{"gameRoomInfo":{"gameRoomConfig":{"#,
                r#""reservedPlayers":[{"systemSeatId":2,"teamId":2}]}}}}"#
            )),
            entry(r#"{"connectResp":{"systemSeatIds":[1]}}"#),
        ];
        // Scan order: the reserved-players entry comes first in the batch.
        assert_eq!(find_player_seat(&entries), Some(2));
        assert_eq!(find_player_seat(&entries[1..]), Some(1));
    }
}
