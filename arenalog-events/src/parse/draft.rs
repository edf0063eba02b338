use std::collections::HashMap;

use itertools::Itertools;
use logtail::{LogEntry, parse_log_timestamp};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::json;
use crate::types::{DraftEventKind, DraftPick, DraftSessionEvent};

/// Event names embed the set being drafted: `QuickDraft_TLA_20251127`.
static SET_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:QuickDraft|PremierDraft)_([A-Z0-9]+)_\d+").unwrap());

pub fn extract_set_code(event_name: &str) -> Option<String> {
    SET_CODE
        .captures(event_name)
        .map(|captures| captures[1].to_string())
}

pub fn parse_draft_session_events(entries: &[LogEntry]) -> Vec<DraftSessionEvent> {
    entries.iter().filter_map(parse_draft_session_event).collect()
}

/// A single entry yields at most one session event. The recognised shapes,
/// in precedence order:
///
/// 1. scene change into the draft scene (`started`) or out of it into the
///    deck builder (`ended`)
/// 2. the Quick Draft module's full state payload (`status_updated`)
/// 3. an outgoing Quick Draft pick request (`pick_made`)
/// 4. an outgoing Premier Draft pick request (`pick_made`)
/// 5. a Premier Draft pack notification (`status_updated`)
/// 6. an `EventJoin` response for a draft course (`session_info`)
pub fn parse_draft_session_event(entry: &LogEntry) -> Option<DraftSessionEvent> {
    if !entry.is_json {
        return None;
    }
    let payload = &entry.json;

    scene_change(payload)
        .or_else(|| bot_draft_status(payload))
        .or_else(|| bot_draft_pick(entry, payload))
        .or_else(|| premier_draft_pick(entry, payload))
        .or_else(|| draft_notify(payload))
        .or_else(|| event_join(payload))
}

const DRAFT_CONTEXTS: [&str; 3] = ["BotDraft", "HumanDraft", "PremierDraft"];

fn scene_change(payload: &Value) -> Option<DraftSessionEvent> {
    let to_scene = json::str_field(payload, &["toSceneName", "ToSceneName"])?;
    let from_scene = json::str_field(payload, &["fromSceneName", "FromSceneName"]).unwrap_or("");
    let context = json::string_field(payload, &["context", "Context"]);

    if to_scene == "Draft" {
        if !context
            .as_deref()
            .is_some_and(|ctx| DRAFT_CONTEXTS.contains(&ctx))
        {
            return None;
        }
        let mut event = DraftSessionEvent::new(DraftEventKind::Started);
        event.context = context;
        return Some(event);
    }

    if from_scene == "Draft" && to_scene == "DeckBuilder" {
        let mut event = DraftSessionEvent::new(DraftEventKind::Ended);
        event.context = context;
        return Some(event);
    }

    None
}

fn bot_draft_status(payload: &Value) -> Option<DraftSessionEvent> {
    if json::str_field(payload, &["CurrentModule", "currentModule"]) != Some("BotDraft") {
        return None;
    }
    let status = json::nested_json(payload, &["Payload", "payload"])?;

    let mut event = DraftSessionEvent::new(DraftEventKind::StatusUpdated);
    event.context = Some("BotDraft".to_string());
    event.event_name = json::string_field(&status, &["EventName", "eventName"]);
    event.set_code = event.event_name.as_deref().and_then(extract_set_code);
    event.session_id = json::string_field(&status, &["DraftId", "draftId"]);
    event.pack_number = json::u32_field(&status, &["PackNumber", "packNumber"]);
    event.pick_number = json::u32_field(&status, &["PickNumber", "pickNumber"]);
    event.draft_pack = json::field(&status, &["DraftPack", "draftPack"])
        .map(json::string_list)
        .unwrap_or_default();
    event.picked_cards = json::field(&status, &["PickedCards", "pickedCards"])
        .map(json::string_list)
        .unwrap_or_default();
    Some(event)
}

fn bot_draft_pick(entry: &LogEntry, payload: &Value) -> Option<DraftSessionEvent> {
    if !entry.timestamp.contains("BotDraftDraftPick") {
        return None;
    }
    let request = json::nested_json(payload, &["request", "Request"])?;

    let mut event = DraftSessionEvent::new(DraftEventKind::PickMade);
    event.context = Some("BotDraft".to_string());
    event.event_name = json::string_field(&request, &["EventName", "eventName"]);
    event.set_code = event.event_name.as_deref().and_then(extract_set_code);
    event.session_id = json::string_field(&request, &["DraftId", "draftId"]);
    event.pack_number = json::u32_field(&request, &["PackNumber", "Pack", "packNumber"]);
    event.pick_number = json::u32_field(&request, &["PickNumber", "Pick", "pickNumber"]);
    event.selected_cards = json::field(&request, &["CardIds", "cardIds", "GrpIds"])
        .map(json::string_list)
        .unwrap_or_default();
    if event.selected_cards.is_empty() {
        if let Some(card) = json::u64_field(&request, &["CardId", "cardId", "GrpId", "grpId"]) {
            event.selected_cards.push(card.to_string());
        }
    }
    Some(event)
}

fn premier_draft_pick(entry: &LogEntry, payload: &Value) -> Option<DraftSessionEvent> {
    if !entry.timestamp.contains("EventPlayerDraftMakePick") {
        return None;
    }
    let request = json::nested_json(payload, &["request", "Request"])?;

    let mut event = DraftSessionEvent::new(DraftEventKind::PickMade);
    event.context = Some("HumanDraft".to_string());
    event.session_id = json::string_field(&request, &["DraftId", "draftId"]);
    event.event_name = json::string_field(&request, &["EventName", "eventName"]);
    event.set_code = event.event_name.as_deref().and_then(extract_set_code);
    // This payload's pack coordinate is 1-indexed, unlike every other shape.
    event.pack_number = json::u32_field(&request, &["Pack", "pack"]).map(|pack| pack.saturating_sub(1));
    event.pick_number = json::u32_field(&request, &["Pick", "pick"]);
    event.selected_cards = json::field(&request, &["GrpIds", "grpIds"])
        .map(|grp_ids| {
            json::u32_list(grp_ids)
                .into_iter()
                .map(|id| id.to_string())
                .collect()
        })
        .unwrap_or_default();
    Some(event)
}

fn draft_notify(payload: &Value) -> Option<DraftSessionEvent> {
    let pack_cards = json::str_field(payload, &["PackCards", "packCards"])?;
    if pack_cards.trim().is_empty() {
        return None;
    }

    let mut event = DraftSessionEvent::new(DraftEventKind::StatusUpdated);
    event.context = Some("HumanDraft".to_string());
    event.session_id = json::string_field(payload, &["draftId", "DraftId"]);
    event.pack_number = json::u32_field(payload, &["SelfPack", "selfPack"]);
    event.pick_number = json::u32_field(payload, &["SelfPick", "selfPick"]);
    event.draft_pack = pack_cards
        .split(',')
        .map(str::trim)
        .filter(|card| !card.is_empty())
        .map(str::to_string)
        .collect();
    Some(event)
}

fn event_join(payload: &Value) -> Option<DraftSessionEvent> {
    let course = json::field(payload, &["Course", "course"])?;
    let event_name = json::string_field(course, &["InternalEventName", "internalEventName"])?;
    if !event_name.contains("Draft") {
        return None;
    }

    let mut event = DraftSessionEvent::new(DraftEventKind::SessionInfo);
    event.session_id = json::string_field(course, &["CourseId", "courseId", "Id", "id"]);
    event.set_code = extract_set_code(&event_name);
    event.event_name = Some(event_name);
    Some(event)
}

/// Premier/Traditional draft picks, grouped by course. Field casing differs
/// between client generations, so every coordinate is tried under both
/// names. Picks without all three coordinates (pack, pick, selection) are
/// incomplete pack-open notifications and are dropped.
pub fn parse_draft_picks(entries: &[LogEntry]) -> HashMap<String, Vec<DraftPick>> {
    entries
        .iter()
        .filter(|e| e.is_json)
        .filter_map(|entry| {
            let event = json::field(&entry.json, &["humanDraftEvent", "HumanDraftEvent"])?;
            let course_id =
                json::string_field(event, &["CourseId", "courseId", "DraftId", "draftId"])?;
            let pack_number = json::u32_field(event, &["SelfPack", "selfPack"])?;
            let pick_number = json::u32_field(event, &["SelfPick", "selfPick"])?;
            let selected_card = json::u32_field(
                event,
                &[
                    "SelectedCard",
                    "selectedCard",
                    "SelectedCardId",
                    "selectedCardId",
                ],
            )?;
            if pack_number == 0 || pick_number == 0 || selected_card == 0 {
                return None;
            }
            let available_cards = json::field(event, &["PackCards", "packCards"])
                .map(card_id_list)
                .unwrap_or_default();
            Some((
                course_id.clone(),
                DraftPick {
                    course_id,
                    pack_number,
                    pick_number,
                    available_cards,
                    selected_card,
                    timestamp: parse_log_timestamp(&entry.timestamp),
                },
            ))
        })
        .into_group_map()
}

/// Card lists arrive either as a JSON array or as one comma-separated string.
fn card_id_list(value: &Value) -> Vec<u32> {
    match value {
        Value::String(text) => text
            .split(',')
            .filter_map(|card| card.trim().parse().ok())
            .collect(),
        _ => json::u32_list(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(line: &str) -> LogEntry {
        LogEntry::parse(line)
    }

    #[test]
    fn set_code_is_extracted_from_event_names() {
        assert_eq!(
            extract_set_code("QuickDraft_TLA_20251127"),
            Some("TLA".to_string())
        );
        assert_eq!(
            extract_set_code("PremierDraft_OM1_20250605"),
            Some("OM1".to_string())
        );
        assert_eq!(extract_set_code("Standard_Event_20250605"), None);
    }

    #[test]
    fn scene_change_into_draft_starts_a_session() {
        let event = parse_draft_session_event(&entry(
            r#"[Prefix]Client.SceneChange {"fromSceneName":"Home","toSceneName":"Draft","context":"BotDraft"}"#,
        ))
        .unwrap();
        assert_eq!(event.kind, DraftEventKind::Started);
        assert_eq!(event.context.as_deref(), Some("BotDraft"));
    }

    #[test]
    fn scene_change_to_deck_builder_ends_the_session() {
        let event = parse_draft_session_event(&entry(
            r#"[Prefix]Client.SceneChange {"fromSceneName":"Draft","toSceneName":"DeckBuilder","context":"BotDraft"}"#,
        ))
        .unwrap();
        assert_eq!(event.kind, DraftEventKind::Ended);
    }

    #[test]
    fn unrelated_scene_change_is_ignored() {
        assert!(
            parse_draft_session_event(&entry(
                r#"{"fromSceneName":"Home","toSceneName":"Store","context":"Store"}"#
            ))
            .is_none()
        );
        assert!(
            parse_draft_session_event(&entry(
                r#"{"fromSceneName":"Home","toSceneName":"Draft","context":"Sealed"}"#
            ))
            .is_none()
        );
    }

    #[test]
    fn bot_draft_payload_yields_full_status() {
        let event = parse_draft_session_event(&entry(concat!(
            r#"{"CurrentModule":"BotDraft","Payload":"{\"EventName\":\"QuickDraft_TLA_20251127\","#,
            r#"\"DraftStatus\":\"Draft\",\"PackNumber\":0,\"PickNumber\":0,"#,
            r#"\"DraftPack\":[\"97380\",\"97468\"],\"PickedCards\":[]}"}"#
        )))
        .unwrap();
        assert_eq!(event.kind, DraftEventKind::StatusUpdated);
        assert_eq!(event.event_name.as_deref(), Some("QuickDraft_TLA_20251127"));
        assert_eq!(event.set_code.as_deref(), Some("TLA"));
        assert_eq!(event.pack_number, Some(0));
        assert_eq!(event.pick_number, Some(0));
        assert_eq!(event.draft_pack, vec!["97380", "97468"]);
        assert!(event.picked_cards.is_empty());
    }

    #[test]
    fn bot_draft_pick_request_yields_pick_made() {
        let event = parse_draft_session_event(&entry(concat!(
            r#"[UnityCrossThreadLogger]==> BotDraftDraftPick "#,
            r#"{"id":42,"request":"{\"EventName\":\"QuickDraft_TLA_20251127\",\"PackNumber\":1,\"PickNumber\":3,\"CardId\":97411}"}"#
        )))
        .unwrap();
        assert_eq!(event.kind, DraftEventKind::PickMade);
        assert_eq!(event.pack_number, Some(1));
        assert_eq!(event.pick_number, Some(3));
        assert_eq!(event.selected_cards, vec!["97411"]);
    }

    #[test]
    fn premier_pick_pack_number_converts_to_zero_indexed() {
        let event = parse_draft_session_event(&entry(concat!(
            r#"[UnityCrossThreadLogger]==> EventPlayerDraftMakePick "#,
            r#"{"id":7,"request":"{\"DraftId\":\"d-1\",\"Pack\":1,\"Pick\":4,\"GrpIds\":[90210]}"}"#
        )))
        .unwrap();
        assert_eq!(event.kind, DraftEventKind::PickMade);
        assert_eq!(event.pack_number, Some(0));
        assert_eq!(event.pick_number, Some(4));
        assert_eq!(event.selected_cards, vec!["90210"]);
        assert_eq!(event.session_id.as_deref(), Some("d-1"));
    }

    #[test]
    fn draft_notify_splits_pack_cards() {
        let event = parse_draft_session_event(&entry(
            r#"[Prefix]Draft.Notify {"draftId":"d-2","SelfPack":2,"SelfPick":5,"PackCards":"90210, 90211,90212"}"#,
        ))
        .unwrap();
        assert_eq!(event.kind, DraftEventKind::StatusUpdated);
        assert_eq!(event.draft_pack, vec!["90210", "90211", "90212"]);
        assert_eq!(event.pack_number, Some(2));
        assert_eq!(event.pick_number, Some(5));
    }

    #[test]
    fn event_join_for_a_draft_course_is_session_info() {
        let event = parse_draft_session_event(&entry(
            r#"{"Course":{"CourseId":"c-9","InternalEventName":"PremierDraft_OM1_20250605"}}"#,
        ))
        .unwrap();
        assert_eq!(event.kind, DraftEventKind::SessionInfo);
        assert_eq!(event.session_id.as_deref(), Some("c-9"));
        assert_eq!(event.set_code.as_deref(), Some("OM1"));
    }

    #[test]
    fn event_join_for_a_constructed_course_is_ignored() {
        assert!(
            parse_draft_session_event(&entry(
                r#"{"Course":{"CourseId":"c-1","InternalEventName":"Standard_Play"}}"#
            ))
            .is_none()
        );
    }

    #[test]
    fn human_draft_picks_group_by_course() {
        let entries = vec![
            entry(
                r#"{"humanDraftEvent":{"CourseId":"c-1","SelfPack":1,"SelfPick":1,"PackCards":"1,2,3","SelectedCard":2}}"#,
            ),
            entry(
                r#"{"humanDraftEvent":{"courseId":"c-1","selfPack":1,"selfPick":2,"packCards":[4,5],"selectedCardId":5}}"#,
            ),
            entry(
                r#"{"humanDraftEvent":{"CourseId":"c-2","SelfPack":1,"SelfPick":1,"SelectedCard":9}}"#,
            ),
            // A pack-open notification: no selection yet, must be dropped.
            entry(r#"{"humanDraftEvent":{"CourseId":"c-1","SelfPack":2,"SelfPick":0,"PackCards":"6,7"}}"#),
        ];
        let picks = parse_draft_picks(&entries);
        assert_eq!(picks.len(), 2);
        let course_one = &picks["c-1"];
        assert_eq!(course_one.len(), 2);
        assert_eq!(course_one[0].available_cards, vec![1, 2, 3]);
        assert_eq!(course_one[0].selected_card, 2);
        assert_eq!(course_one[1].available_cards, vec![4, 5]);
        assert_eq!(course_one[1].selected_card, 5);
        assert_eq!(picks["c-2"][0].selected_card, 9);
    }
}
