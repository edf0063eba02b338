use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entry::LogEntry;

const DEFAULT_RATE_LIMIT: Duration = Duration::from_secs(5);
const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Events of the same type inside this window are dropped.
    pub rate_limit: Duration,
    /// Events below this importance are never emitted.
    pub min_importance: Importance,
    /// Ring-buffer size for [`Notifier::history`].
    pub history_limit: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        NotifierConfig {
            rate_limit: DEFAULT_RATE_LIMIT,
            min_importance: Importance::Medium,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// A user-facing notification derived from a log entry.
#[derive(Debug, Clone, Serialize)]
pub struct UiEvent {
    pub event_type: String,
    pub importance: Importance,
    pub message: String,
    pub data: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

type Handler = Box<dyn Fn(&UiEvent) + Send + Sync>;

struct NotifierState {
    last_emitted: HashMap<String, Instant>,
    history: VecDeque<UiEvent>,
}

/// Maps selected entry shapes to [`UiEvent`]s, rate-limited per event type.
/// Handlers run synchronously in registration order on the observing task.
pub struct Notifier {
    config: NotifierConfig,
    state: Mutex<NotifierState>,
    handlers: Mutex<Vec<Handler>>,
}

impl Notifier {
    pub fn new(config: NotifierConfig) -> Self {
        Notifier {
            config,
            state: Mutex::new(NotifierState {
                last_emitted: HashMap::new(),
                history: VecDeque::new(),
            }),
            handlers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, handler: impl Fn(&UiEvent) + Send + Sync + 'static) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(handler));
    }

    /// Feed one entry through the mapping. Returns the emitted event, or
    /// `None` when the entry maps to nothing, falls below the importance
    /// floor, or is inside its type's rate-limit window.
    pub fn observe(&self, entry: &LogEntry) -> Option<UiEvent> {
        let event = map_entry(entry)?;
        if event.importance < self.config.min_importance {
            return None;
        }

        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let now = Instant::now();
            if let Some(last) = state.last_emitted.get(&event.event_type) {
                if now.duration_since(*last) < self.config.rate_limit {
                    debug!("rate-limited {} notification", event.event_type);
                    return None;
                }
            }
            state.last_emitted.insert(event.event_type.clone(), now);
            state.history.push_back(event.clone());
            while state.history.len() > self.config.history_limit {
                state.history.pop_front();
            }
        }

        for handler in self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            handler(&event);
        }
        Some(event)
    }

    pub fn history(&self) -> Vec<UiEvent> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .iter()
            .cloned()
            .collect()
    }
}

fn map_entry(entry: &LogEntry) -> Option<UiEvent> {
    if !entry.is_json {
        return None;
    }
    let json = &entry.json;

    if json.get("CurrentEventState").and_then(Value::as_str) == Some("MatchCompleted") {
        let mut data = Map::new();
        if let Some(match_id) = json.get("MatchId").or_else(|| json.get("matchId")) {
            data.insert("matchId".to_string(), match_id.clone());
        }
        return Some(event("match_complete", Importance::Medium, "Match completed", data));
    }

    if let (Some(class), Some(tier)) = (
        json.get("rankClass").and_then(Value::as_str),
        json.get("rankTier").and_then(Value::as_u64),
    ) {
        let mut data = Map::new();
        data.insert("rankClass".to_string(), Value::from(class));
        data.insert("rankTier".to_string(), Value::from(tier));
        return Some(event(
            "rank_change",
            Importance::High,
            format!("Rank changed to {class} tier {tier}"),
            data,
        ));
    }

    if json.get("draftStatus").and_then(Value::as_str) == Some("Complete") {
        return Some(event(
            "draft_complete",
            Importance::Medium,
            "Draft complete",
            Map::new(),
        ));
    }

    None
}

fn event(
    event_type: &str,
    importance: Importance,
    message: impl Into<String>,
    data: Map<String, Value>,
) -> UiEvent {
    UiEvent {
        event_type: event_type.to_string(),
        importance,
        message: message.into(),
        data,
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn entry(json: &str) -> LogEntry {
        let entry = LogEntry::parse(json);
        assert!(entry.is_json, "test payload must be valid JSON: {json}");
        entry
    }

    #[test]
    fn match_completed_maps_to_match_complete() {
        let notifier = Notifier::new(NotifierConfig::default());
        let event = notifier
            .observe(&entry(
                r#"{"CurrentEventState":"MatchCompleted","matchId":"m-1"}"#,
            ))
            .expect("should emit");
        assert_eq!(event.event_type, "match_complete");
        assert_eq!(event.data["matchId"], "m-1");
    }

    #[test]
    fn rank_change_is_high_importance() {
        let notifier = Notifier::new(NotifierConfig {
            min_importance: Importance::High,
            ..NotifierConfig::default()
        });
        // Below the floor.
        assert!(
            notifier
                .observe(&entry(r#"{"CurrentEventState":"MatchCompleted"}"#))
                .is_none()
        );
        // At the floor.
        let event = notifier
            .observe(&entry(r#"{"rankClass":"Gold","rankTier":2}"#))
            .expect("rank changes pass a high floor");
        assert_eq!(event.event_type, "rank_change");
        assert_eq!(event.importance, Importance::High);
    }

    #[test]
    fn same_type_inside_window_is_dropped() {
        let notifier = Notifier::new(NotifierConfig::default());
        let payload = r#"{"draftStatus":"Complete"}"#;
        assert!(notifier.observe(&entry(payload)).is_some());
        assert!(notifier.observe(&entry(payload)).is_none());
        // A different type is unaffected by the draft_complete window.
        assert!(
            notifier
                .observe(&entry(r#"{"CurrentEventState":"MatchCompleted"}"#))
                .is_some()
        );
    }

    #[test]
    fn expired_window_emits_again() {
        let notifier = Notifier::new(NotifierConfig {
            rate_limit: Duration::from_millis(0),
            ..NotifierConfig::default()
        });
        let payload = r#"{"draftStatus":"Complete"}"#;
        assert!(notifier.observe(&entry(payload)).is_some());
        assert!(notifier.observe(&entry(payload)).is_some());
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let notifier = Notifier::new(NotifierConfig::default());
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            notifier.subscribe(move |_event| order.lock().unwrap().push(tag));
        }
        notifier.observe(&entry(r#"{"draftStatus":"Complete"}"#));
        assert_eq!(*order.lock().unwrap(), ["first", "second", "third"]);
    }

    #[test]
    fn history_is_bounded() {
        let notifier = Notifier::new(NotifierConfig {
            rate_limit: Duration::from_millis(0),
            history_limit: 3,
            ..NotifierConfig::default()
        });
        for _ in 0..10 {
            notifier.observe(&entry(r#"{"draftStatus":"Complete"}"#));
        }
        assert_eq!(notifier.history().len(), 3);
    }

    #[test]
    fn unrecognised_payloads_map_to_nothing() {
        let notifier = Notifier::new(NotifierConfig::default());
        assert!(notifier.observe(&entry(r#"{"gems":1200}"#)).is_none());
    }
}
