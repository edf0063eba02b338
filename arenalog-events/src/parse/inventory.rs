use logtail::LogEntry;
use serde_json::Value;

use crate::json;
use crate::types::{Booster, PlayerInventory};

/// Latest-wins scan for the client's inventory snapshot. The payload shows
/// up both bare and wrapped in an `InventoryInfo` envelope depending on the
/// client generation; both are accepted.
pub fn parse_player_inventory(entries: &[LogEntry]) -> Option<PlayerInventory> {
    entries.iter().rev().filter(|e| e.is_json).find_map(|entry| {
        json::field(&entry.json, &["InventoryInfo", "inventoryInfo"])
            .and_then(inventory_from)
            .or_else(|| inventory_from(&entry.json))
    })
}

fn inventory_from(value: &Value) -> Option<PlayerInventory> {
    let gems = json::u32_field(value, &["gems", "Gems"]);
    let gold = json::u32_field(value, &["gold", "Gold"]);
    // Plenty of payloads mention gold in passing; require both currencies
    // before treating something as an inventory snapshot.
    let (gems, gold) = (gems?, gold?);

    // The client reports vault progress in tenths of a percent.
    let vault_progress = json::f64_field(value, &["totalVaultProgress", "TotalVaultProgress"])
        .unwrap_or(0.0)
        / 10.0;

    let boosters = json::array_field(value, &["boosters", "Boosters"])
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    Some(Booster {
                        collation_id: json::i64_field(item, &["collationId", "CollationId"])?,
                        count: json::u32_field(item, &["count", "Count"])?,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let custom_tokens = json::field(value, &["customTokens", "CustomTokens"])
        .and_then(Value::as_object)
        .map(|object| {
            object
                .iter()
                .filter_map(|(key, count)| Some((key.clone(), json::as_u32(count)?)))
                .collect()
        })
        .unwrap_or_default();

    Some(PlayerInventory {
        gems,
        gold,
        vault_progress,
        wildcard_common: json::u32_field(value, &["wildCardCommons", "WildCardCommons"])
            .unwrap_or(0),
        wildcard_uncommon: json::u32_field(value, &["wildCardUnCommons", "WildCardUnCommons"])
            .unwrap_or(0),
        wildcard_rare: json::u32_field(value, &["wildCardRares", "WildCardRares"]).unwrap_or(0),
        wildcard_mythic: json::u32_field(value, &["wildCardMythics", "WildCardMythics"])
            .unwrap_or(0),
        boosters,
        custom_tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entries(lines: &[&str]) -> Vec<LogEntry> {
        lines.iter().map(|line| LogEntry::parse(line)).collect()
    }

    #[test]
    fn wrapped_inventory_is_parsed() {
        let entries = entries(&[concat!(
            r#"{"InventoryInfo":{"Gems":1200,"Gold":3450,"TotalVaultProgress":456,"#,
            r#""WildCardCommons":12,"WildCardUnCommons":8,"WildCardRares":5,"WildCardMythics":2,"#,
            r#""Boosters":[{"CollationId":100026,"Count":3}],"CustomTokens":{"DraftToken":1}}}"#
        )]);
        let inv = parse_player_inventory(&entries).unwrap();
        assert_eq!(inv.gems, 1200);
        assert_eq!(inv.gold, 3450);
        assert_eq!(inv.vault_progress, 45.6);
        assert_eq!(inv.wildcard_rare, 5);
        assert_eq!(inv.boosters, vec![Booster { collation_id: 100026, count: 3 }]);
        assert_eq!(inv.custom_tokens.get("DraftToken"), Some(&1));
    }

    #[test]
    fn newest_snapshot_wins() {
        let entries = entries(&[
            r#"{"gems":100,"gold":200}"#,
            r#"{"gems":150,"gold":180}"#,
        ]);
        let inv = parse_player_inventory(&entries).unwrap();
        assert_eq!((inv.gems, inv.gold), (150, 180));
    }

    #[test]
    fn gold_mention_alone_is_not_an_inventory() {
        let entries = entries(&[r#"{"gold":500,"questId":"q"}"#]);
        assert_eq!(parse_player_inventory(&entries), None);
    }

    #[test]
    fn malformed_booster_rows_are_skipped() {
        let entries = entries(&[
            r#"{"gems":1,"gold":2,"boosters":[{"collationId":"not-a-number"},{"collationId":5,"count":1}]}"#,
        ]);
        let inv = parse_player_inventory(&entries).unwrap();
        assert_eq!(inv.boosters, vec![Booster { collation_id: 5, count: 1 }]);
    }
}
