use logtail::LogEntry;
use serde_json::Value;

use crate::json;
use crate::types::PlayerProfile;

/// Latest-wins: scan newest-to-oldest and stop at the first entry that
/// carries both identity fields, either at the top level or inside an
/// `authenticateResponse` envelope.
pub fn parse_player_profile(entries: &[LogEntry]) -> Option<PlayerProfile> {
    entries.iter().rev().filter(|e| e.is_json).find_map(|entry| {
        profile_from(&entry.json).or_else(|| {
            json::field(&entry.json, &["authenticateResponse", "AuthenticateResponse"])
                .and_then(profile_from)
        })
    })
}

fn profile_from(value: &Value) -> Option<PlayerProfile> {
    let screen_name = json::string_field(value, &["screenName", "ScreenName"])?;
    let client_id = json::string_field(value, &["clientId", "ClientId"])?;
    Some(PlayerProfile {
        screen_name,
        client_id,
    })
}
