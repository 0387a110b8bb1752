use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Unique identifier for an agent, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub Uuid);

impl AgentId {
    /// Create a new AgentId using UUID v7.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create an AgentId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AgentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// An automation agent.
///
/// Owns its triggers and actions outright: a trigger's `actions` list refers
/// to action ids inside the same agent, never across agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub description: String,
    /// Inactive agents keep their data but are never matched.
    pub active: bool,
    /// AI provider configuration. Opaque to the engine; only required to be
    /// a JSON object.
    pub ai_config: Value,
    #[serde(default)]
    pub triggers: Vec<EventTrigger>,
    #[serde(default)]
    pub actions: Vec<AgentAction>,
    #[serde(default)]
    pub stats: AgentStats,
    #[serde(default)]
    pub settings: AgentSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    /// Look up an action owned by this agent.
    pub fn action(&self, action_id: &str) -> Option<&AgentAction> {
        self.actions.iter().find(|a| a.id == action_id)
    }

    /// Mutable lookup of an owned action.
    pub fn action_mut(&mut self, action_id: &str) -> Option<&mut AgentAction> {
        self.actions.iter_mut().find(|a| a.id == action_id)
    }

    /// Look up a trigger owned by this agent.
    pub fn trigger(&self, trigger_id: &str) -> Option<&EventTrigger> {
        self.triggers.iter().find(|t| t.id == trigger_id)
    }
}

/// A declarative rule: event type + condition chain -> ordered action list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTrigger {
    pub id: String,
    pub name: String,
    pub event_type: String,
    /// Evaluated as a strict left fold, in declared order.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Minimum seconds between two firings of this trigger.
    #[serde(default)]
    pub cooldown: u64,
    #[serde(default)]
    pub priority: Priority,
    /// Action ids, executed in this order.
    #[serde(default)]
    pub actions: Vec<String>,
}

/// Trigger priority. Ordering: `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

/// One field test inside a trigger's condition chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Dot-notation path into the normalized event's `parsedData`.
    pub field: String,
    pub operator: ConditionOperator,
    pub value: Value,
    /// How this condition combines with the result accumulated so far.
    /// Ignored on the first condition; `None` means AND.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_operator: Option<LogicalOperator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Contains,
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConditionOperator::Equals => "equals",
            ConditionOperator::NotEquals => "not_equals",
            ConditionOperator::GreaterThan => "greater_than",
            ConditionOperator::LessThan => "less_than",
            ConditionOperator::GreaterOrEqual => "greater_or_equal",
            ConditionOperator::LessOrEqual => "less_or_equal",
            ConditionOperator::Contains => "contains",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
}

/// A configured unit of work, plus its running execution statistics.
///
/// On the wire the action type and its settings sit beside the id:
/// `{"id": "...", "type": "send_message", "configuration": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentAction {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub config: ActionConfig,
    #[serde(default)]
    pub execution_count: u64,
    /// Cumulative-mean success percentage in `[0, 100]`.
    #[serde(default)]
    pub success_rate: f64,
}

impl AgentAction {
    pub fn new(id: impl Into<String>, config: ActionConfig) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            config,
            execution_count: 0,
            success_rate: 0.0,
        }
    }

    /// Fold one outcome into `execution_count` and `success_rate`.
    ///
    /// `rate' = (rate * (n - 1) + (ok ? 100 : 0)) / n` where `n` is the new
    /// count. This is a running approximation, not a recount from history.
    pub fn record_outcome(&mut self, success: bool) {
        self.execution_count += 1;
        let n = self.execution_count as f64;
        let sample = if success { 100.0 } else { 0.0 };
        let rate = (self.success_rate * (n - 1.0) + sample) / n;
        self.success_rate = rate.clamp(0.0, 100.0);
    }

    pub fn action_type(&self) -> ActionType {
        self.config.action_type()
    }
}

/// Action configuration, one variant per action type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "configuration", rename_all = "snake_case")]
pub enum ActionConfig {
    SendMessage(SendMessageConfig),
    SendNotification(SendNotificationConfig),
    ExecuteTransaction(ExecuteTransactionConfig),
    CallWebhook(CallWebhookConfig),
    AiResponse(AiResponseConfig),
    DataQuery(DataQueryConfig),
}

impl ActionConfig {
    pub fn action_type(&self) -> ActionType {
        match self {
            ActionConfig::SendMessage(_) => ActionType::SendMessage,
            ActionConfig::SendNotification(_) => ActionType::SendNotification,
            ActionConfig::ExecuteTransaction(_) => ActionType::ExecuteTransaction,
            ActionConfig::CallWebhook(_) => ActionType::CallWebhook,
            ActionConfig::AiResponse(_) => ActionType::AiResponse,
            ActionConfig::DataQuery(_) => ActionType::DataQuery,
        }
    }
}

/// Discriminant of [`ActionConfig`], used for logging and listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    SendMessage,
    SendNotification,
    ExecuteTransaction,
    CallWebhook,
    AiResponse,
    DataQuery,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionType::SendMessage => "send_message",
            ActionType::SendNotification => "send_notification",
            ActionType::ExecuteTransaction => "execute_transaction",
            ActionType::CallWebhook => "call_webhook",
            ActionType::AiResponse => "ai_response",
            ActionType::DataQuery => "data_query",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageConfig {
    /// Message body with `{{variable}}` placeholders.
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationConfig {
    /// Explicit recipient. When absent the recipient is taken from the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteTransactionConfig {
    /// Opaque instruction description; never signed or submitted here.
    #[serde(default)]
    pub instruction: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallWebhookConfig {
    #[serde(default = "default_webhook_method")]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Request body template. Sent as-is after variable substitution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
}

fn default_webhook_method() -> String {
    "POST".to_string()
}

fn default_webhook_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiResponseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Extra user instructions appended after the event description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default)]
    pub use_retrieval: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQueryConfig {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Aggregate counters for an agent. Only ever incremented.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStats {
    pub total_triggers: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    /// Blended as `(old + new) / 2`; not a true running mean.
    pub average_response_time_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(default)]
    pub events_processed: HashMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSettings {
    /// Carried for callers that wrap the pipeline in their own timeout.
    #[serde(default = "default_execution_timeout")]
    pub execution_timeout_secs: u64,
    #[serde(default = "default_max_actions")]
    pub max_actions_per_trigger: usize,
}

fn default_execution_timeout() -> u64 {
    30
}

fn default_max_actions() -> usize {
    10
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            execution_timeout_secs: default_execution_timeout(),
            max_actions_per_trigger: default_max_actions(),
        }
    }
}

/// Request to create a new agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentRequest {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub ai_config: Value,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub triggers: Vec<EventTrigger>,
    #[serde(default)]
    pub actions: Vec<AgentAction>,
    #[serde(default)]
    pub settings: Option<AgentSettings>,
}

fn default_active() -> bool {
    true
}

/// Partial update. Absent fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAgentRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
    pub ai_config: Option<Value>,
    pub triggers: Option<Vec<EventTrigger>>,
    pub actions: Option<Vec<AgentAction>>,
    pub settings: Option<AgentSettings>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn priority_orders_high_above_low() {
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn success_rate_follows_cumulative_mean() {
        let mut action = AgentAction::new(
            "a1",
            ActionConfig::DataQuery(DataQueryConfig {
                query: "q".to_string(),
                source: None,
            }),
        );
        let outcomes = [true, false, true, true, false, false, true];
        let mut expected = 0.0_f64;
        for (i, ok) in outcomes.iter().enumerate() {
            action.record_outcome(*ok);
            let n = (i + 1) as f64;
            expected = (expected * (n - 1.0) + if *ok { 100.0 } else { 0.0 }) / n;
            assert_eq!(action.success_rate, expected);
            assert!((0.0..=100.0).contains(&action.success_rate));
        }
        assert_eq!(action.execution_count, outcomes.len() as u64);
    }

    #[test]
    fn action_config_uses_type_tag() {
        let action: AgentAction = serde_json::from_value(json!({
            "id": "hook",
            "type": "call_webhook",
            "configuration": {
                "url": "https://example.com/hook"
            }
        }))
        .unwrap();

        match &action.config {
            ActionConfig::CallWebhook(cfg) => {
                assert_eq!(cfg.method, "POST");
                assert_eq!(cfg.timeout_secs, 10);
                assert!(cfg.headers.is_empty());
            }
            other => panic!("unexpected config: {other:?}"),
        }
        assert_eq!(action.action_type(), ActionType::CallWebhook);
        assert_eq!(action.execution_count, 0);
    }

    #[test]
    fn action_serializes_type_and_configuration_beside_id() {
        let action = AgentAction::new(
            "notify",
            ActionConfig::SendMessage(SendMessageConfig {
                template: "hi {{owner}}".to_string(),
                channel: None,
            }),
        );
        let value = serde_json::to_value(&action).unwrap();

        assert_eq!(value["id"], "notify");
        assert_eq!(value["type"], "send_message");
        assert_eq!(value["configuration"]["template"], "hi {{owner}}");
        assert_eq!(value["executionCount"], 0);
        assert!(value.get("config").is_none());

        let back: AgentAction = serde_json::from_value(value).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn condition_deserializes_camel_case() {
        let cond: Condition = serde_json::from_value(json!({
            "field": "token.symbol",
            "operator": "greater_or_equal",
            "value": 3,
            "logicalOperator": "OR"
        }))
        .unwrap();
        assert_eq!(cond.operator, ConditionOperator::GreaterOrEqual);
        assert_eq!(cond.logical_operator, Some(LogicalOperator::Or));
    }

    #[test]
    fn agent_id_parses_and_displays() {
        let id = AgentId::new();
        let parsed: AgentId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
