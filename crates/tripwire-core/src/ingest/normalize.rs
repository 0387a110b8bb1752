//! Provider payload -> `NormalizedEvent` mapping.
//!
//! Dialect deliveries arrive as a bare event object, `{ "event": {...} }`, or
//! `{ "events": [...] }`. Field names vary between camelCase and snake_case
//! depending on the producer, so every canonical field is resolved from a
//! short list of aliases. The mapping is pure: the same `(raw, received_at)`
//! pair always yields the same event, including its id.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use tripwire_types::event::{ChainMetadata, NormalizedEvent};

const ID_KEYS: &[&str] = &["id", "eventId", "event_id"];
const TYPE_KEYS: &[&str] = &["type", "eventType", "event_type", "event"];
const TIMESTAMP_KEYS: &[&str] = &["timestamp", "createdAt", "created_at"];
const DATA_KEYS: &[&str] = &["parsedData", "parsed_data", "data", "payload"];

/// Event type used when the payload carries none.
pub const UNKNOWN_EVENT_TYPE: &str = "unknown";

/// Errors raised while unpacking a webhook body.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("`events` must be an array")]
    EventsNotArray,
}

/// Split a webhook body into its individual raw event objects.
///
/// Non-object entries inside `events` are dropped with a warning.
pub fn extract_events(payload: &Value) -> Result<Vec<Map<String, Value>>, NormalizeError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| NormalizeError::NotAnObject(json_kind(payload)))?;

    if let Some(events) = obj.get("events") {
        let items = events.as_array().ok_or(NormalizeError::EventsNotArray)?;
        let mut out = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match item.as_object() {
                Some(map) => out.push(map.clone()),
                None => tracing::warn!(index, kind = json_kind(item), "skipping non-object event"),
            }
        }
        return Ok(out);
    }

    if let Some(Value::Object(inner)) = obj.get("event") {
        return Ok(vec![inner.clone()]);
    }

    Ok(vec![obj.clone()])
}

/// Map one raw provider event to the canonical shape.
pub fn normalize(raw: &Map<String, Value>, received_at: DateTime<Utc>) -> NormalizedEvent {
    let parsed_data = resolve_data(raw);

    let event_type = first_string(raw, TYPE_KEYS).unwrap_or_else(|| UNKNOWN_EVENT_TYPE.to_string());
    let id = first_string(raw, ID_KEYS).unwrap_or_else(|| derive_event_id(raw));

    let metadata = ChainMetadata {
        signature: raw
            .get("signature")
            .or_else(|| parsed_data.get("signature"))
            .and_then(|v| v.as_str())
            .map(str::to_string),
        slot: raw
            .get("slot")
            .or_else(|| parsed_data.get("slot"))
            .and_then(as_u64),
        block_time: raw
            .get("blockTime")
            .or_else(|| parsed_data.get("blockTime"))
            .and_then(as_i64),
    };

    let timestamp = TIMESTAMP_KEYS
        .iter()
        .find_map(|k| raw.get(*k).and_then(parse_timestamp))
        .or_else(|| metadata.block_time.and_then(|s| Utc.timestamp_opt(s, 0).single()))
        .unwrap_or(received_at);

    NormalizedEvent {
        id,
        event_type,
        timestamp,
        parsed_data,
        metadata,
        raw: Value::Object(raw.clone()),
    }
}

/// Use the explicit data object when present, otherwise the raw event minus
/// its envelope fields.
fn resolve_data(raw: &Map<String, Value>) -> Value {
    if let Some(data) = DATA_KEYS
        .iter()
        .find_map(|k| raw.get(*k).filter(|v| v.is_object()))
    {
        return data.clone();
    }

    let stripped: Map<String, Value> = raw
        .iter()
        .filter(|(k, _)| {
            let k = k.as_str();
            !ID_KEYS.contains(&k) && !TYPE_KEYS.contains(&k) && !TIMESTAMP_KEYS.contains(&k)
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Value::Object(stripped)
}

/// Stable id from the canonical JSON text of the raw event.
///
/// `serde_json::Map` keeps keys sorted, so key order in the original body
/// does not change the id.
fn derive_event_id(raw: &Map<String, Value>) -> String {
    let canonical = serde_json::to_string(raw).unwrap_or_default();
    let digest = Sha256::digest(canonical.as_bytes());
    format!("evt_{}", hex::encode(&digest[..16]))
}

fn first_string(raw: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match raw.get(*k) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.trim().parse::<i64>().ok().and_then(from_epoch)),
        Value::Number(n) => n.as_i64().and_then(from_epoch),
        _ => None,
    }
}

/// Interpret an epoch value as milliseconds when it is too large to be seconds.
fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.abs() >= 100_000_000_000 {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn extract_accepts_all_three_shapes() {
        let single = json!({ "type": "a" });
        let wrapped = json!({ "event": { "type": "b" } });
        let batch = json!({ "events": [{ "type": "c" }, 42, { "type": "d" }] });

        assert_eq!(extract_events(&single).unwrap().len(), 1);
        assert_eq!(extract_events(&wrapped).unwrap()[0]["type"], "b");

        let events = extract_events(&batch).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1]["type"], "d");
    }

    #[test]
    fn extract_rejects_non_objects() {
        assert!(extract_events(&json!([1, 2])).is_err());
        assert!(extract_events(&json!("text")).is_err());
        assert!(extract_events(&json!({ "events": {} })).is_err());
    }

    #[test]
    fn normalize_reads_camel_case_fields() {
        let received = Utc::now();
        let raw = obj(json!({
            "id": "evt-1",
            "type": "token_price_change",
            "timestamp": "2024-05-01T12:00:00Z",
            "parsedData": {
                "token": { "symbol": "SOL" },
                "changeNormalized": { "window": "24h", "percentage": 12 }
            },
            "signature": "5xyz",
            "slot": 250000000,
            "blockTime": 1714564800
        }));

        let event = normalize(&raw, received);
        assert_eq!(event.id, "evt-1");
        assert_eq!(event.event_type, "token_price_change");
        assert_eq!(event.timestamp.to_rfc3339(), "2024-05-01T12:00:00+00:00");
        assert_eq!(event.field("token.symbol"), Some(&json!("SOL")));
        assert_eq!(event.metadata.signature.as_deref(), Some("5xyz"));
        assert_eq!(event.metadata.slot, Some(250_000_000));
        assert_eq!(event.metadata.block_time, Some(1_714_564_800));
    }

    #[test]
    fn normalize_strips_envelope_when_no_data_object() {
        let raw = obj(json!({
            "event_type": "liquidation_warning",
            "created_at": 1714564800000_i64,
            "walletAddress": "wallet-1",
            "healthFactor": 1.05
        }));

        let event = normalize(&raw, Utc::now());
        assert_eq!(event.event_type, "liquidation_warning");
        assert_eq!(event.timestamp.timestamp(), 1_714_564_800);
        assert_eq!(
            event.parsed_data,
            json!({ "walletAddress": "wallet-1", "healthFactor": 1.05 })
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let received = Utc::now();
        let raw = obj(json!({ "type": "x", "data": { "n": 1 } }));

        let first = normalize(&raw, received);
        let second = normalize(&raw, received);
        assert_eq!(first, second);
        assert!(first.id.starts_with("evt_"));
    }

    #[test]
    fn derived_id_ignores_key_order() {
        let a: Map<String, Value> = serde_json::from_str(r#"{"type":"x","a":1,"b":2}"#).unwrap();
        let b: Map<String, Value> = serde_json::from_str(r#"{"b":2,"a":1,"type":"x"}"#).unwrap();
        assert_eq!(derive_event_id(&a), derive_event_id(&b));
    }

    #[test]
    fn timestamp_falls_back_to_block_time_then_receipt() {
        let received = Utc.timestamp_opt(2_000_000_000, 0).unwrap();

        let with_block = normalize(&obj(json!({ "type": "x", "blockTime": 1_700_000_000 })), received);
        assert_eq!(with_block.timestamp.timestamp(), 1_700_000_000);

        let bare = normalize(&obj(json!({ "type": "x" })), received);
        assert_eq!(bare.timestamp, received);
    }

    #[test]
    fn missing_type_becomes_unknown() {
        let event = normalize(&obj(json!({ "data": {} })), Utc::now());
        assert_eq!(event.event_type, UNKNOWN_EVENT_TYPE);
    }
}
