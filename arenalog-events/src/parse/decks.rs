use std::collections::HashSet;

use itertools::Itertools;
use logtail::LogEntry;
use serde_json::Value;

use crate::json;
use crate::types::{DeckCard, PlayerDeck};

/// Deck collection scan. Two payload generations coexist in the same log:
///
/// - `EventGetCoursesV2`: a top-level `Courses[]`, each course carrying a
///   `CourseDeckSummary` and a `CourseDeck`
/// - `DeckUpsertDeckV2`: a top-level `request` whose value is a JSON string
///   carrying `Summary` and `Deck`
///
/// Iteration is newest-to-oldest and each deck id is kept exactly once, so
/// the freshest version of an edited deck wins.
pub fn parse_decks(entries: &[LogEntry]) -> Vec<PlayerDeck> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut decks = Vec::new();

    for entry in entries.iter().rev().filter(|e| e.is_json) {
        if let Some(courses) = json::array_field(&entry.json, &["Courses", "courses"]) {
            for course in courses {
                let summary = json::field(course, &["CourseDeckSummary", "courseDeckSummary"]);
                let deck = json::field(course, &["CourseDeck", "courseDeck"]);
                if let Some(deck) = deck_from_parts(summary, deck) {
                    if seen.insert(deck.deck_id.clone()) {
                        decks.push(deck);
                    }
                }
            }
            continue;
        }

        // DeckUpsertDeckV2 nests the whole document in a JSON string.
        if let Some(request) = json::nested_json(&entry.json, &["request", "Request"]) {
            let summary = json::field(&request, &["Summary", "summary"]);
            let deck = json::field(&request, &["Deck", "deck"]);
            if summary.is_none() || deck.is_none() {
                continue;
            }
            if let Some(deck) = deck_from_parts(summary, deck) {
                if seen.insert(deck.deck_id.clone()) {
                    decks.push(deck);
                }
            }
        }
    }

    decks
}

fn deck_from_parts(summary: Option<&Value>, deck: Option<&Value>) -> Option<PlayerDeck> {
    let summary = summary?;
    let deck_id = json::string_field(summary, &["DeckId", "deckId", "Id", "id"])?;
    let name = json::string_field(summary, &["Name", "name"])
        .map(|raw| clean_deck_name(&raw))
        .unwrap_or_else(|| "Unnamed deck".to_string());

    let (main_deck, sideboard) = match deck {
        Some(deck) => (
            json::field(deck, &["MainDeck", "mainDeck"])
                .map(card_list)
                .unwrap_or_default(),
            json::field(deck, &["Sideboard", "sideboard"])
                .map(card_list)
                .unwrap_or_default(),
        ),
        None => (Vec::new(), Vec::new()),
    };

    Some(PlayerDeck {
        deck_id,
        name,
        format: deck_format(summary),
        main_deck,
        sideboard,
        description: json::string_field(summary, &["Description", "description"]),
        created_at: json::string_field(summary, &["CreatedAt", "createdAt"]),
        last_updated: json::string_field(summary, &["LastUpdated", "lastUpdated"]),
    })
}

fn deck_format(summary: &Value) -> Option<String> {
    if let Some(format) = json::string_field(summary, &["Format", "format"]) {
        return Some(format);
    }
    json::array_field(summary, &["Attributes", "attributes"])?
        .iter()
        .find(|attribute| {
            json::str_field(attribute, &["name", "Name"]) == Some("Format")
        })
        .and_then(|attribute| json::string_field(attribute, &["value", "Value"]))
}

/// Card lists come either as `[{cardId, quantity}, ...]` or as the older
/// flat `[id, count, id, count, ...]` encoding.
fn card_list(value: &Value) -> Vec<DeckCard> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    if items.iter().all(Value::is_number) {
        return items
            .iter()
            .tuples()
            .filter_map(|(id, quantity)| {
                Some(DeckCard {
                    card_id: json::as_u32(id)?,
                    quantity: json::as_u32(quantity)?,
                })
            })
            .collect();
    }
    items
        .iter()
        .filter_map(|item| {
            Some(DeckCard {
                card_id: json::u32_field(item, &["cardId", "CardId", "card_id"])?,
                quantity: json::u32_field(item, &["quantity", "Quantity"])?,
            })
        })
        .collect()
}

/// Precon decks ship localisation keys instead of names
/// (`?=?Loc/Decks/Precon/Precon_EPP2024_UW`); keep the last path segment
/// with underscores spaced out.
fn clean_deck_name(raw: &str) -> String {
    if !raw.starts_with("?=?Loc") {
        return raw.to_string();
    }
    let last_segment = raw.rsplit('/').next().unwrap_or(raw);
    last_segment.replace('_', " ")
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
    fn courses_payload_is_parsed() {
        let entries = vec![entry(concat!(
            r#"{"Courses":[{"CourseDeckSummary":{"DeckId":"d-1","Name":"Mono Red","#,
            r#""Attributes":[{"name":"Format","value":"Standard"}]},"#,
            r#""CourseDeck":{"MainDeck":[{"cardId":75001,"quantity":4},{"cardId":75002,"quantity":20}],"#,
            r#""Sideboard":[{"cardId":75003,"quantity":2}]}}]}"#
        ))];
        let decks = parse_decks(&entries);
        assert_eq!(decks.len(), 1);
        let deck = &decks[0];
        assert_eq!(deck.deck_id, "d-1");
        assert_eq!(deck.name, "Mono Red");
        assert_eq!(deck.format.as_deref(), Some("Standard"));
        assert_eq!(deck.main_deck.len(), 2);
        assert_eq!(deck.sideboard, vec![DeckCard { card_id: 75003, quantity: 2 }]);
    }

    #[test]
    fn upsert_payload_and_newest_wins() {
        let entries = vec![
            entry(concat!(
                r#"{"request":"{\"Summary\":{\"DeckId\":\"d-1\",\"Name\":\"Old Name\"},"#,
                r#"\"Deck\":{\"MainDeck\":[{\"cardId\":1,\"quantity\":1}]}}"}"#
            )),
            entry(concat!(
                r#"{"request":"{\"Summary\":{\"DeckId\":\"d-1\",\"Name\":\"New Name\"},"#,
                r#"\"Deck\":{\"MainDeck\":[{\"cardId\":2,\"quantity\":2}]}}"}"#
            )),
        ];
        let decks = parse_decks(&entries);
        assert_eq!(decks.len(), 1);
        assert_eq!(decks[0].name, "New Name");
        assert_eq!(decks[0].main_deck, vec![DeckCard { card_id: 2, quantity: 2 }]);
    }

    #[test]
    fn each_deck_id_appears_at_most_once() {
        let entries = vec![
            entry(r#"{"Courses":[{"CourseDeckSummary":{"DeckId":"d-1","Name":"A"}},{"CourseDeckSummary":{"DeckId":"d-2","Name":"B"}}]}"#),
            entry(r#"{"Courses":[{"CourseDeckSummary":{"DeckId":"d-1","Name":"A again"}}]}"#),
        ];
        let decks = parse_decks(&entries);
        let mut ids: Vec<&str> = decks.iter().map(|deck| deck.deck_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, ["d-1", "d-2"]);
    }

    #[test]
    fn localisation_keys_become_readable_names() {
        assert_eq!(
            clean_deck_name("?=?Loc/Decks/Precon/Precon_EPP2024_UW"),
            "Precon EPP2024 UW"
        );
        assert_eq!(clean_deck_name("My Deck"), "My Deck");
    }

    #[test]
    fn flat_card_lists_are_paired() {
        let cards = card_list(&serde_json::json!([75001, 4, 75002, 2]));
        assert_eq!(
            cards,
            vec![
                DeckCard { card_id: 75001, quantity: 4 },
                DeckCard { card_id: 75002, quantity: 2 },
            ]
        );
    }

    #[test]
    fn draft_pick_requests_are_not_decks() {
        // Same top-level `request` envelope, but no Summary/Deck inside.
        let entries = vec![entry(
            r#"{"request":"{\"DraftId\":\"d-1\",\"Pack\":1,\"Pick\":4,\"GrpIds\":[90210]}"}"#,
        )];
        assert!(parse_decks(&entries).is_empty());
    }
}
