//! Execution context construction and `{{variable}}` templating.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use tripwire_types::agent::AgentId;
use tripwire_types::event::NormalizedEvent;
use tripwire_types::execution::ExecutionContext;

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Build a fresh context for one trigger firing.
pub fn build_context(
    agent_id: AgentId,
    trigger_id: &str,
    event: &NormalizedEvent,
    now: DateTime<Utc>,
) -> ExecutionContext {
    ExecutionContext {
        id: Uuid::now_v7(),
        agent_id,
        trigger_id: trigger_id.to_string(),
        event_id: event.id.clone(),
        event_type: event.event_type.clone(),
        timestamp: now,
        variables: flatten_variables(event),
        metadata: HashMap::new(),
    }
}

/// Flatten `parsed_data` into dot-notation variables plus event metadata.
///
/// Every object and leaf is reachable by its full path (`token.symbol`).
/// Nested leaves are also exposed under their bare key when no shallower
/// value already owns that name, so `{{walletAddress}}` resolves even when
/// the provider nests it one level down.
pub fn flatten_variables(event: &NormalizedEvent) -> HashMap<String, Value> {
    let mut vars = HashMap::new();
    let mut leaves: Vec<(usize, String, Value)> = Vec::new();

    if let Value::Object(map) = &event.parsed_data {
        for (key, value) in map {
            walk(key.clone(), value, 0, &mut vars, &mut leaves);
        }
    }

    vars.insert("eventId".to_string(), Value::String(event.id.clone()));
    vars.insert("eventType".to_string(), Value::String(event.event_type.clone()));
    vars.insert(
        "timestamp".to_string(),
        Value::String(event.timestamp.to_rfc3339()),
    );
    if let Some(signature) = &event.metadata.signature {
        vars.insert("signature".to_string(), Value::String(signature.clone()));
    }
    if let Some(slot) = event.metadata.slot {
        vars.insert("slot".to_string(), Value::from(slot));
    }
    if let Some(block_time) = event.metadata.block_time {
        vars.insert("blockTime".to_string(), Value::from(block_time));
    }

    // Stable sort keeps traversal order among leaves of equal depth.
    leaves.sort_by_key(|(depth, _, _)| *depth);
    for (depth, path, value) in leaves {
        if depth == 0 {
            continue;
        }
        if let Some(bare) = path.rsplit('.').next() {
            vars.entry(bare.to_string()).or_insert(value);
        }
    }

    vars
}

fn walk(
    path: String,
    value: &Value,
    depth: usize,
    vars: &mut HashMap<String, Value>,
    leaves: &mut Vec<(usize, String, Value)>,
) {
    vars.insert(path.clone(), value.clone());
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                walk(format!("{path}.{key}"), child, depth + 1, vars, leaves);
            }
        }
        _ => leaves.push((depth, path, value.clone())),
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Replace `{{ name }}` tokens with variable values.
///
/// Whitespace inside the braces is ignored. Unknown names and unterminated
/// tokens are left exactly as written.
pub fn render_template(template: &str, variables: &HashMap<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let name = after_open[..end].trim();
        match variables.get(name) {
            Some(value) if !name.is_empty() => out.push_str(&value_to_string(value)),
            _ => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after_open[end + 2..];
    }

    out.push_str(rest);
    out
}

/// Strings render raw, everything else as compact JSON.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tripwire_types::event::ChainMetadata;

    fn event(data: Value) -> NormalizedEvent {
        NormalizedEvent {
            id: "evt-9".to_string(),
            event_type: "liquidation_warning".to_string(),
            timestamp: Utc::now(),
            parsed_data: data,
            metadata: ChainMetadata {
                signature: Some("sig".to_string()),
                slot: Some(42),
                block_time: None,
            },
            raw: json!({}),
        }
    }

    #[test]
    fn flattens_nested_paths_and_metadata() {
        let vars = flatten_variables(&event(json!({
            "token": { "symbol": "SOL", "price": 150.5 },
            "position": { "owner": { "walletAddress": "w-1" } }
        })));

        assert_eq!(vars["token.symbol"], json!("SOL"));
        assert_eq!(vars["token"], json!({ "symbol": "SOL", "price": 150.5 }));
        assert_eq!(vars["position.owner.walletAddress"], json!("w-1"));
        assert_eq!(vars["walletAddress"], json!("w-1"));
        assert_eq!(vars["symbol"], json!("SOL"));
        assert_eq!(vars["eventId"], json!("evt-9"));
        assert_eq!(vars["eventType"], json!("liquidation_warning"));
        assert_eq!(vars["signature"], json!("sig"));
        assert_eq!(vars["slot"], json!(42));
        assert!(!vars.contains_key("blockTime"));
    }

    #[test]
    fn bare_names_never_shadow_top_level_keys() {
        let vars = flatten_variables(&event(json!({
            "owner": "top",
            "position": { "owner": "nested" }
        })));
        assert_eq!(vars["owner"], json!("top"));
    }

    #[test]
    fn shallower_leaf_wins_bare_name() {
        let vars = flatten_variables(&event(json!({
            "a": { "b": { "amount": 1 } },
            "z": { "amount": 2 }
        })));
        assert_eq!(vars["amount"], json!(2));
    }

    #[test]
    fn renders_known_and_keeps_unknown_tokens() {
        let mut vars = HashMap::new();
        vars.insert("symbol".to_string(), json!("SOL"));
        vars.insert("pct".to_string(), json!(12));
        vars.insert("token".to_string(), json!({ "symbol": "SOL" }));

        assert_eq!(
            render_template("{{symbol}} moved {{ pct }}% {{missing}}", &vars),
            "SOL moved 12% {{missing}}"
        );
        assert_eq!(render_template("{{token}}", &vars), r#"{"symbol":"SOL"}"#);
        assert_eq!(render_template("open {{symbol", &vars), "open {{symbol");
        assert_eq!(render_template("{{}} x", &vars), "{{}} x");
    }
}
