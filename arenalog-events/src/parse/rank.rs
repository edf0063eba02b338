use logtail::LogEntry;
use serde_json::Value;

use crate::json;
use crate::types::{FormatRank, PlayerRank, RankFormat, RankUpdate};

/// Latest-wins scan for the player's current ladder standing. The current
/// client reports both queue families in one payload with per-format field
/// prefixes (`constructedClass`, `limitedClass`, ...).
pub fn parse_player_rank(entries: &[LogEntry]) -> Option<PlayerRank> {
    entries.iter().rev().filter(|e| e.is_json).find_map(|entry| {
        let constructed = format_rank(&entry.json, "constructed");
        let limited = format_rank(&entry.json, "limited");
        if constructed.is_none() && limited.is_none() {
            return None;
        }
        Some(PlayerRank {
            constructed,
            limited,
            limited_matches_won: json::u32_field(
                &entry.json,
                &["limitedMatchesWon", "LimitedMatchesWon"],
            )
            .unwrap_or(0),
            limited_matches_lost: json::u32_field(
                &entry.json,
                &["limitedMatchesLost", "LimitedMatchesLost"],
            )
            .unwrap_or(0),
        })
    })
}

/// History scan. Two payload generations are accepted and accumulated in
/// log order: the current per-format snapshot fields, then the legacy
/// `RankUpdated` object with explicit old/new pairs. Per-format updates are
/// kept only when `seasonOrdinal > 0` and the class is non-empty, which
/// filters the placeholder "Unranked" rows the client logs at startup.
pub fn parse_rank_updates(entries: &[LogEntry]) -> Vec<RankUpdate> {
    let mut updates = Vec::new();
    for entry in entries.iter().filter(|e| e.is_json) {
        for format in [RankFormat::Constructed, RankFormat::Limited] {
            if let Some(update) = current_format_update(&entry.json, format) {
                updates.push(update);
            }
        }
        if let Some(update) = legacy_update(&entry.json) {
            updates.push(update);
        }
    }
    updates
}

fn format_rank(value: &Value, prefix: &str) -> Option<FormatRank> {
    let pascal = pascal(prefix);
    let keys = |suffix: &str| [format!("{prefix}{suffix}"), format!("{pascal}{suffix}")];
    let u32_field = |suffix: &str| {
        let [camel, pascal] = keys(suffix);
        json::u32_field(value, &[camel.as_str(), pascal.as_str()])
    };

    let season_ordinal = u32_field("SeasonOrdinal")?;
    let class = {
        let [camel, pascal] = keys("Class");
        json::string_field(value, &[camel.as_str(), pascal.as_str()])?
    };
    if season_ordinal == 0 || class.is_empty() {
        return None;
    }
    let percentile = {
        let [camel, pascal] = keys("Percentile");
        json::f64_field(value, &[camel.as_str(), pascal.as_str()]).unwrap_or(0.0)
    };
    Some(FormatRank {
        season_ordinal,
        class,
        level: u32_field("Level").unwrap_or(0),
        step: u32_field("Step").unwrap_or(0),
        percentile,
    })
}

fn current_format_update(value: &Value, format: RankFormat) -> Option<RankUpdate> {
    let prefix = match format {
        RankFormat::Constructed => "constructed",
        RankFormat::Limited => "limited",
    };
    let rank = format_rank(value, prefix)?;
    Some(RankUpdate {
        player_id: json::string_field(value, &["playerId", "PlayerId"]),
        season_ordinal: rank.season_ordinal,
        format,
        new_class: rank.class,
        new_level: rank.level,
        new_step: rank.step,
        old_class: None,
        old_level: None,
        old_step: None,
        was_loss_protected: false,
    })
}

fn legacy_update(value: &Value) -> Option<RankUpdate> {
    let payload = json::field(value, &["RankUpdated", "rankUpdated"]).unwrap_or(value);
    let update_type = json::str_field(payload, &["rankUpdateType", "RankUpdateType"])?;
    let format = if update_type.contains("Limited") {
        RankFormat::Limited
    } else if update_type.contains("Constructed") {
        RankFormat::Constructed
    } else {
        return None;
    };
    Some(RankUpdate {
        player_id: json::string_field(payload, &["playerId", "PlayerId"]),
        season_ordinal: json::u32_field(payload, &["seasonOrdinal", "SeasonOrdinal"])?,
        format,
        new_class: json::string_field(payload, &["newClass", "NewClass"])?,
        new_level: json::u32_field(payload, &["newLevel", "NewLevel"]).unwrap_or(0),
        new_step: json::u32_field(payload, &["newStep", "NewStep"]).unwrap_or(0),
        old_class: json::string_field(payload, &["oldClass", "OldClass"]),
        old_level: json::u32_field(payload, &["oldLevel", "OldLevel"]),
        old_step: json::u32_field(payload, &["oldStep", "OldStep"]),
        was_loss_protected: json::bool_field(payload, &["wasLossProtected", "WasLossProtected"])
            .unwrap_or(false),
    })
}

fn pascal(prefix: &str) -> String {
    let mut chars = prefix.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entries(lines: &[&str]) -> Vec<LogEntry> {
        lines.iter().map(|line| LogEntry::parse(line)).collect()
    }

    #[test]
    fn current_payload_yields_both_formats() {
        let entries = entries(&[concat!(
            r#"{"constructedSeasonOrdinal":14,"constructedClass":"Platinum","constructedLevel":3,"constructedStep":2,"#,
            r#""limitedSeasonOrdinal":14,"limitedClass":"Gold","limitedLevel":1,"limitedStep":0,"#,
            r#""limitedMatchesWon":12,"limitedMatchesLost":9}"#
        )]);
        let rank = parse_player_rank(&entries).unwrap();
        assert_eq!(rank.constructed.as_ref().unwrap().class, "Platinum");
        assert_eq!(rank.limited.as_ref().unwrap().class, "Gold");
        assert_eq!(rank.limited_matches_won, 12);

        let updates = parse_rank_updates(&entries);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].format, RankFormat::Constructed);
        assert_eq!(updates[1].format, RankFormat::Limited);
    }

    #[test]
    fn unranked_placeholder_rows_are_dropped() {
        let entries = entries(&[
            r#"{"constructedSeasonOrdinal":0,"constructedClass":"Unranked"}"#,
            r#"{"limitedSeasonOrdinal":14,"limitedClass":""}"#,
        ]);
        assert_eq!(parse_player_rank(&entries), None);
        assert!(parse_rank_updates(&entries).is_empty());
    }

    #[test]
    fn legacy_rank_updated_carries_old_and_new() {
        let entries = entries(&[concat!(
            r#"{"RankUpdated":{"playerId":"p-1","seasonOrdinal":9,"rankUpdateType":"RankUpdateType_Constructed","#,
            r#""oldClass":"Silver","newClass":"Gold","oldLevel":1,"newLevel":4,"oldStep":5,"newStep":0,"#,
            r#""wasLossProtected":true}}"#
        )]);
        let updates = parse_rank_updates(&entries);
        assert_eq!(updates.len(), 1);
        let update = &updates[0];
        assert_eq!(update.format, RankFormat::Constructed);
        assert_eq!(update.old_class.as_deref(), Some("Silver"));
        assert_eq!(update.new_class, "Gold");
        assert!(update.was_loss_protected);
    }

    #[test]
    fn newest_rank_snapshot_wins() {
        let entries = entries(&[
            r#"{"constructedSeasonOrdinal":14,"constructedClass":"Gold"}"#,
            r#"{"constructedSeasonOrdinal":14,"constructedClass":"Platinum"}"#,
        ]);
        let rank = parse_player_rank(&entries).unwrap();
        assert_eq!(rank.constructed.unwrap().class, "Platinum");
    }
}
