//! Per-firing execution state and results.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::agent::{ActionType, AgentId};

/// State bundle passed through every action of one trigger firing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    pub id: Uuid,
    pub agent_id: AgentId,
    pub trigger_id: String,
    pub event_id: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    /// Flattened event data plus event metadata, used for templating.
    pub variables: HashMap<String, Value>,
    /// Scratch space handlers may write to for later actions.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl ExecutionContext {
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// A variable rendered as plain text, or `None` when missing, null, or empty.
    pub fn variable_str(&self, name: &str) -> Option<String> {
        match self.variables.get(name)? {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Outcome of a single action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub action_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<ActionType>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub execution_time_ms: u64,
}

/// Outcome of one trigger firing. Immutable once persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub context_id: Uuid,
    pub agent_id: AgentId,
    pub trigger_id: String,
    pub event_id: String,
    pub event_type: String,
    /// Logical AND of every action result.
    pub success: bool,
    pub action_results: Vec<ActionResult>,
    pub total_execution_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Lifecycle of one firing: `Created -> Running -> Completed -> Persisted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPhase {
    Created,
    Running,
    Completed,
    Persisted,
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionPhase::Created => write!(f, "created"),
            ExecutionPhase::Running => write!(f, "running"),
            ExecutionPhase::Completed => write!(f, "completed"),
            ExecutionPhase::Persisted => write!(f, "persisted"),
        }
    }
}

/// Snapshot of an execution that has not been persisted yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InFlightExecution {
    pub context_id: Uuid,
    pub agent_id: AgentId,
    pub trigger_id: String,
    pub event_id: String,
    pub phase: ExecutionPhase,
    pub started_at: DateTime<Utc>,
}
