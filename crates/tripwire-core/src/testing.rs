//! In-memory repositories, collaborator doubles and fixtures for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;

use tripwire_types::agent::{
    ActionConfig, Agent, AgentAction, AgentId, Condition, ConditionOperator, CreateAgentRequest,
    DataQueryConfig, EventTrigger, LogicalOperator, Priority, SendMessageConfig,
};
use tripwire_types::error::{ActionError, RepositoryError};
use tripwire_types::event::NormalizedEvent;
use tripwire_types::execution::{ActionResult, ExecutionResult};

use crate::automation::collaborator::{
    AlertReceipt, AlertRequest, AlertSender, BoxFuture, CompletionClient, CompletionRequest,
    CompletionResponse, MessageSender, OutboundMessage, WebhookClient, WebhookRequest,
    WebhookResponse,
};
use crate::ingest::normalize::normalize;
use crate::repository::agent::AgentRepository;
use crate::repository::execution::ExecutionRepository;

// ---------------------------------------------------------------------------
// Repositories
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MemoryAgentRepo {
    agents: Arc<Mutex<HashMap<AgentId, Agent>>>,
}

impl MemoryAgentRepo {
    pub fn contains(&self, id: &AgentId) -> bool {
        self.agents.lock().unwrap().contains_key(id)
    }
}

impl AgentRepository for MemoryAgentRepo {
    async fn save(&self, agent: &Agent) -> Result<(), RepositoryError> {
        self.agents.lock().unwrap().insert(agent.id, agent.clone());
        Ok(())
    }

    async fn get(&self, id: &AgentId) -> Result<Option<Agent>, RepositoryError> {
        Ok(self.agents.lock().unwrap().get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Agent>, RepositoryError> {
        let mut agents: Vec<Agent> = self.agents.lock().unwrap().values().cloned().collect();
        agents.sort_by_key(|a| (a.created_at, a.id));
        Ok(agents)
    }

    async fn delete(&self, id: &AgentId) -> Result<bool, RepositoryError> {
        Ok(self.agents.lock().unwrap().remove(id).is_some())
    }
}

#[derive(Clone, Default)]
pub struct MemoryExecutionRepo {
    rows: Arc<Mutex<Vec<ExecutionResult>>>,
}

impl ExecutionRepository for MemoryExecutionRepo {
    async fn insert(&self, result: &ExecutionResult) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|r| r.context_id == result.context_id) {
            return Err(RepositoryError::Conflict(result.context_id.to_string()));
        }
        rows.push(result.clone());
        Ok(())
    }

    async fn get(&self, context_id: &Uuid) -> Result<Option<ExecutionResult>, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| &r.context_id == context_id)
            .cloned())
    }

    async fn list(
        &self,
        agent_id: Option<&AgentId>,
        limit: u32,
    ) -> Result<Vec<ExecutionResult>, RepositoryError> {
        let mut rows: Vec<ExecutionResult> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| agent_id.is_none_or(|id| &r.agent_id == id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.timestamp, b.context_id).cmp(&(a.timestamp, a.context_id)));
        rows.truncate(limit as usize);
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingMessages {
    pub sent: Mutex<Vec<OutboundMessage>>,
}

impl MessageSender for RecordingMessages {
    fn send<'a>(&'a self, message: &'a OutboundMessage) -> BoxFuture<'a, Result<Value, ActionError>> {
        Box::pin(async move {
            self.sent.lock().unwrap().push(message.clone());
            Ok(json!({ "delivered": true }))
        })
    }
}

#[derive(Default)]
pub struct RecordingAlerts {
    pub sent: Mutex<Vec<AlertRequest>>,
}

impl RecordingAlerts {
    fn receipt(&self, alert: &AlertRequest) -> AlertReceipt {
        let mut sent = self.sent.lock().unwrap();
        sent.push(alert.clone());
        AlertReceipt {
            success: true,
            id: Some(format!("alert-{}", sent.len())),
            detail: None,
        }
    }
}

impl AlertSender for RecordingAlerts {
    fn send<'a>(&'a self, alert: &'a AlertRequest) -> BoxFuture<'a, Result<AlertReceipt, ActionError>> {
        Box::pin(async move { Ok(self.receipt(alert)) })
    }

    fn broadcast<'a>(
        &'a self,
        alert: &'a AlertRequest,
    ) -> BoxFuture<'a, Result<AlertReceipt, ActionError>> {
        Box::pin(async move { Ok(self.receipt(alert)) })
    }
}

/// Fails every call the way an unreachable host does.
pub struct RefusingWebhooks;

impl WebhookClient for RefusingWebhooks {
    fn call<'a>(&'a self, request: &'a WebhookRequest) -> BoxFuture<'a, Result<WebhookResponse, ActionError>> {
        Box::pin(async move {
            Err(ActionError::Network(format!(
                "connection refused: {}",
                request.url
            )))
        })
    }
}

#[derive(Default)]
pub struct EchoCompletions {
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl CompletionClient for EchoCompletions {
    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> BoxFuture<'a, Result<CompletionResponse, ActionError>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request.clone());
            Ok(CompletionResponse {
                text: "ok".to_string(),
                model: request.model.clone(),
                retrieval: None,
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// An agent with one high-priority SOL/24h/>10% trigger running `notify`
/// then `record`.
pub fn sample_request() -> CreateAgentRequest {
    let condition = |field: &str,
                     operator: ConditionOperator,
                     value: Value,
                     logical: Option<LogicalOperator>| Condition {
        field: field.to_string(),
        operator,
        value,
        logical_operator: logical,
    };

    CreateAgentRequest {
        name: "SOL watcher".to_string(),
        description: "Reacts to large SOL price moves".to_string(),
        ai_config: json!({}),
        active: true,
        triggers: vec![EventTrigger {
            id: "sol-24h".to_string(),
            name: "SOL 24h move".to_string(),
            event_type: "token_price_change".to_string(),
            conditions: vec![
                condition("token.symbol", ConditionOperator::Equals, json!("SOL"), None),
                condition(
                    "changeNormalized.window",
                    ConditionOperator::Equals,
                    json!("24h"),
                    Some(LogicalOperator::And),
                ),
                condition(
                    "changeNormalized.percentage",
                    ConditionOperator::GreaterThan,
                    json!(10),
                    Some(LogicalOperator::And),
                ),
            ],
            cooldown: 0,
            priority: Priority::High,
            actions: vec!["notify".to_string(), "record".to_string()],
        }],
        actions: vec![
            AgentAction::new(
                "notify",
                ActionConfig::SendMessage(SendMessageConfig {
                    template: "{{token.symbol}} moved {{changeNormalized.percentage}}% in {{ changeNormalized.window }}"
                        .to_string(),
                    channel: None,
                }),
            ),
            AgentAction::new(
                "record",
                ActionConfig::DataQuery(DataQueryConfig {
                    query: "price of {{token.symbol}}".to_string(),
                    source: None,
                }),
            ),
        ],
        settings: None,
    }
}

pub fn price_event(percentage: i64) -> NormalizedEvent {
    let raw = json!({
        "id": format!("evt-price-{percentage}"),
        "type": "token_price_change",
        "parsedData": {
            "token": { "symbol": "SOL" },
            "changeNormalized": { "window": "24h", "percentage": percentage }
        }
    });
    let raw = raw.as_object().cloned().unwrap_or_default();
    normalize(&raw, Utc::now())
}

pub fn execution_result(agent_id: AgentId, success: bool, total_ms: u64) -> ExecutionResult {
    let now = Utc::now();
    ExecutionResult {
        context_id: Uuid::now_v7(),
        agent_id,
        trigger_id: "sol-24h".to_string(),
        event_id: "evt-1".to_string(),
        event_type: "token_price_change".to_string(),
        success,
        action_results: vec![ActionResult {
            action_id: "notify".to_string(),
            action_type: None,
            success,
            result: None,
            error: None,
            started_at: now,
            completed_at: now,
            execution_time_ms: total_ms,
        }],
        total_execution_time_ms: total_ms,
        error: None,
        timestamp: now,
    }
}
