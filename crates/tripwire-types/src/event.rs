//! Provider-agnostic event shape used for trigger matching.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A webhook event after normalization.
///
/// `parsed_data` is what trigger conditions look into; `raw` keeps the
/// provider payload untouched for auditing and for action handlers that need
/// fields the normalizer does not lift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub parsed_data: Value,
    #[serde(default)]
    pub metadata: ChainMetadata,
    pub raw: Value,
}

/// On-chain metadata lifted out of the provider payload when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_time: Option<i64>,
}

impl NormalizedEvent {
    /// Resolve a dot-notation path inside `parsed_data`.
    ///
    /// Numeric segments index into arrays. Returns `None` when any segment
    /// is missing.
    pub fn field(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.parsed_data, path)
    }
}

/// Walk `root` along a dot-separated path.
pub fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_path_walks_objects_and_arrays() {
        let data = json!({
            "token": { "symbol": "SOL" },
            "holders": [{ "wallet": "abc" }, { "wallet": "def" }]
        });
        assert_eq!(lookup_path(&data, "token.symbol"), Some(&json!("SOL")));
        assert_eq!(lookup_path(&data, "holders.1.wallet"), Some(&json!("def")));
        assert_eq!(lookup_path(&data, "token.name"), None);
        assert_eq!(lookup_path(&data, "holders.x"), None);
        assert_eq!(lookup_path(&data, "token.symbol.deeper"), None);
        assert_eq!(lookup_path(&data, ""), None);
    }

    #[test]
    fn serializes_type_field_name() {
        let event = NormalizedEvent {
            id: "evt-1".to_string(),
            event_type: "token_price_change".to_string(),
            timestamp: Utc::now(),
            parsed_data: json!({}),
            metadata: ChainMetadata::default(),
            raw: json!({}),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "token_price_change");
        assert!(value.get("parsedData").is_some());
    }
}
