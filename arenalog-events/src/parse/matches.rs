use logtail::LogEntry;
use serde_json::Value;

use crate::json;
use crate::types::{GameResult, MatchResult};

/// Match outcomes from `matchGameRoomStateChangedEvent` payloads carrying a
/// `finalMatchResult`. The result list mixes per-game and whole-match rows,
/// distinguished by scope; the match row decides the winner.
///
/// The player's team is looked up in `gameRoomConfig.reservedPlayers`: by
/// `userId` when the caller knows the player's client id, falling back to
/// the first reserved seat otherwise.
pub fn parse_match_results(entries: &[LogEntry], player_id: Option<&str>) -> Vec<MatchResult> {
    entries
        .iter()
        .filter(|e| e.is_json)
        .filter_map(|entry| match_result_from(&entry.json, player_id))
        .collect()
}

fn match_result_from(payload: &Value, player_id: Option<&str>) -> Option<MatchResult> {
    let room = json::path(payload, &["matchGameRoomStateChangedEvent", "gameRoomInfo"])?;
    let final_result = json::field(room, &["finalMatchResult", "FinalMatchResult"])?;
    let config = json::field(room, &["gameRoomConfig", "GameRoomConfig"]);

    let match_id = json::string_field(final_result, &["matchId", "MatchId"])
        .or_else(|| config.and_then(|c| json::string_field(c, &["matchId", "MatchId"])))?;

    let player_team_id = config
        .and_then(|c| json::array_field(c, &["reservedPlayers", "ReservedPlayers"]))
        .and_then(|players| {
            let reserved = match player_id {
                Some(id) => players.iter().find(|player| {
                    json::str_field(player, &["userId", "UserId"]) == Some(id)
                }),
                None => players.first(),
            };
            json::u32_field(reserved?, &["teamId", "TeamId"])
        });

    let mut winning_team_id = None;
    let mut games = Vec::new();
    for row in json::array_field(final_result, &["resultList", "ResultList"])
        .into_iter()
        .flatten()
    {
        let Some(winner) = json::u32_field(row, &["winningTeamId", "WinningTeamId"]) else {
            continue;
        };
        match json::str_field(row, &["scope", "Scope"]) {
            Some("MatchScope_Match") => winning_team_id = Some(winner),
            Some("MatchScope_Game") => games.push(GameResult {
                game_number: games.len() as u32 + 1,
                winning_team_id: winner,
                result_type: json::string_field(row, &["result", "Result"]),
            }),
            _ => {}
        }
    }

    let winning_team_id = winning_team_id?;
    Some(MatchResult {
        match_id,
        event_name: config.and_then(|c| {
            json::string_field(c, &["eventId", "EventId", "internalEventName", "InternalEventName"])
        }),
        winning_team_id,
        player_team_id,
        player_won: player_team_id.map(|team| team == winning_team_id),
        games,
    })
}
