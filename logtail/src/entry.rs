use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;

/// A single line read from an MTGA log file.
///
/// Arena interleaves plain diagnostic text with lines that carry a JSON
/// payload after a free-form prefix (logger tag, timestamp, arrow markers).
/// The prefix is kept verbatim in `timestamp`; decoding it into a wall-clock
/// time is deferred to [`parse_log_timestamp`] because most consumers never
/// need it.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// The original line, unmodified.
    pub raw: String,
    /// Whatever preceded the JSON payload on the line, trimmed.
    pub timestamp: String,
    /// The decoded payload. `Value::Null` when the line carried no JSON.
    pub json: Value,
    /// True iff a `{`-rooted object was decoded from a suffix of `raw`.
    pub is_json: bool,
    /// Poller key that produced this entry. Filled in by the manager's
    /// relay tasks; `None` for entries read from a bare `Poller`.
    pub source: Option<String>,
}

impl LogEntry {
    /// Parse one log line. The first `{` on the line starts the candidate
    /// payload; everything before it becomes the timestamp prefix. Suffixes
    /// rooted at `[` are never treated as JSON because every Arena payload
    /// of interest is object-shaped.
    pub fn parse(line: &str) -> Self {
        if let Some(start) = line.find('{') {
            if let Ok(json @ Value::Object(_)) = serde_json::from_str::<Value>(&line[start..]) {
                return LogEntry {
                    raw: line.to_string(),
                    timestamp: line[..start].trim().to_string(),
                    json,
                    is_json: true,
                    source: None,
                };
            }
        }
        LogEntry {
            raw: line.to_string(),
            timestamp: String::new(),
            json: Value::Null,
            is_json: false,
            source: None,
        }
    }
}

/// Decode the wall-clock time out of a log line prefix.
///
/// Arena writes `YYYY-MM-DD HH:MM:SS[.fff]` (space or `T` separator) in the
/// machine's local timezone, usually behind one or more `[Tag]` markers.
/// The result is normalised to UTC. Anything unparseable falls back to the
/// current time, which keeps replayed history ordered by processing time
/// rather than crashing on the log's many non-timestamp prefixes.
pub fn parse_log_timestamp(prefix: &str) -> DateTime<Utc> {
    try_parse_log_timestamp(prefix).unwrap_or_else(Utc::now)
}

fn try_parse_log_timestamp(prefix: &str) -> Option<DateTime<Utc>> {
    let mut rest = prefix.trim();
    while let Some(stripped) = rest.strip_prefix('[') {
        match stripped.find(']') {
            Some(end) => rest = stripped[end + 1..].trim_start(),
            None => return None,
        }
    }

    let candidate = timestamp_candidate(rest)?;
    let naive = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&candidate, fmt).ok())?;

    // Ambiguous local times (DST fold) resolve to the earlier instant.
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| Local.from_local_datetime(&naive).latest())?;
    Some(local.with_timezone(&Utc))
}

/// Slice the leading `date time` pair off a prefix remainder, tolerating a
/// trailing `:` separator and the `T` form.
fn timestamp_candidate(rest: &str) -> Option<String> {
    let mut tokens = rest.split_whitespace();
    let first = tokens.next()?;
    if first.contains('T') {
        return Some(first.trim_end_matches(':').to_string());
    }
    let second = tokens.next()?;
    Some(format!("{} {}", first, second.trim_end_matches(':')))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_text_line_is_not_json() {
        let entry = LogEntry::parse("Initialize engine version: 2021.3.16f1");
        assert!(!entry.is_json);
        assert_eq!(entry.json, Value::Null);
    }

    #[test]
    fn prefix_and_payload_are_split() {
        let entry = LogEntry::parse(
            r#"[UnityCrossThreadLogger]2024-01-15 14:30:25 {"type":"GameStart","eventId":1}"#,
        );
        assert!(entry.is_json);
        assert_eq!(entry.timestamp, "[UnityCrossThreadLogger]2024-01-15 14:30:25");
        assert_eq!(entry.json["type"], "GameStart");
        assert_eq!(entry.json["eventId"], 1);
    }

    #[test]
    fn pure_json_line_has_empty_prefix() {
        let entry = LogEntry::parse(r#"{"gems":1200}"#);
        assert!(entry.is_json);
        assert_eq!(entry.timestamp, "");
        assert_eq!(entry.json["gems"], 1200);
    }

    #[test]
    fn array_rooted_suffix_is_rejected() {
        let entry = LogEntry::parse("cards: [1, 2, 3]");
        assert!(!entry.is_json);
    }

    #[test]
    fn truncated_json_is_rejected() {
        let entry = LogEntry::parse(r#"prefix {"type":"GameStart""#);
        assert!(!entry.is_json);
        assert_eq!(entry.raw, r#"prefix {"type":"GameStart""#);
    }

    #[test]
    fn timestamp_with_fraction_and_tags_parses() {
        let parsed = try_parse_log_timestamp("[UnityCrossThreadLogger]2024-01-15 14:30:25.123:");
        assert!(parsed.is_some());
    }

    #[test]
    fn timestamp_with_t_separator_parses() {
        assert!(try_parse_log_timestamp("2024-01-15T14:30:25").is_some());
    }

    #[test]
    fn garbage_prefix_falls_back() {
        assert!(try_parse_log_timestamp("==> BotDraftDraftPick").is_none());
        // The public function must still return something usable.
        let now = Utc::now();
        let fallback = parse_log_timestamp("==> BotDraftDraftPick");
        assert!((fallback - now).num_seconds().abs() < 5);
    }
}
