//! Field access over Arena's loosely-typed payloads.
//!
//! The log's JSON is heterogeneous: field casing varies between payload
//! generations (`cardId` / `CardId` / `card_id`), numbers sometimes arrive
//! as strings, and several envelopes carry a nested JSON document *as a
//! string* (`request`, `Payload`). Every accessor here is option-returning
//! so parsers can skip a malformed record without aborting a batch.

use serde_json::Value;

/// Look a key up under any of its casing aliases, in order.
pub fn field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let object = value.as_object()?;
    keys.iter().find_map(|key| object.get(*key))
}

/// Walk a path of single keys.
pub fn path<'a>(value: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(value, |value, segment| value.as_object()?.get(*segment))
}

pub fn str_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    field(value, keys)?.as_str()
}

pub fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    str_field(value, keys).map(str::to_string)
}

pub fn bool_field(value: &Value, keys: &[&str]) -> Option<bool> {
    field(value, keys)?.as_bool()
}

/// Accepts a JSON number or a numeric string.
pub fn u64_field(value: &Value, keys: &[&str]) -> Option<u64> {
    as_u64(field(value, keys)?)
}

pub fn u32_field(value: &Value, keys: &[&str]) -> Option<u32> {
    u64_field(value, keys).and_then(|n| u32::try_from(n).ok())
}

pub fn i64_field(value: &Value, keys: &[&str]) -> Option<i64> {
    let value = field(value, keys)?;
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

pub fn i32_field(value: &Value, keys: &[&str]) -> Option<i32> {
    i64_field(value, keys).and_then(|n| i32::try_from(n).ok())
}

pub fn f64_field(value: &Value, keys: &[&str]) -> Option<f64> {
    let value = field(value, keys)?;
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

pub fn array_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
    field(value, keys)?.as_array()
}

pub fn as_u64(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

pub fn as_u32(value: &Value) -> Option<u32> {
    as_u64(value).and_then(|n| u32::try_from(n).ok())
}

/// Decode a field that is either an object already or a JSON document
/// embedded as a string. Returns an owned tree either way.
pub fn nested_json(value: &Value, keys: &[&str]) -> Option<Value> {
    match field(value, keys)? {
        Value::Object(object) => Some(Value::Object(object.clone())),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(parsed @ Value::Object(_)) => Some(parsed),
            _ => None,
        },
        _ => None,
    }
}

/// An array of strings or numbers, normalised to strings. Arena encodes
/// card ids both ways depending on the payload generation.
pub fn string_list(value: &Value) -> Vec<String> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect()
}

pub fn u32_list(value: &Value) -> Vec<u32> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items.iter().filter_map(as_u32).collect()
}
