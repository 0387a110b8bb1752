//! Action pipeline execution.
//!
//! `ActionExecutor` runs a trigger's actions strictly in declared order
//! against one [`ExecutionContext`]. Each action is isolated: a failure is
//! captured into its [`ActionResult`] and the next action still runs. The
//! overall result succeeds only if every action did.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{Value, json};

use tripwire_types::agent::{
    ActionConfig, Agent, AgentAction, AgentId, AiResponseConfig, CallWebhookConfig,
    DataQueryConfig, EventTrigger, ExecuteTransactionConfig, SendMessageConfig,
    SendNotificationConfig,
};
use tripwire_types::error::ActionError;
use tripwire_types::event::NormalizedEvent;
use tripwire_types::execution::{ActionResult, ExecutionContext, ExecutionResult};

use super::collaborator::{
    AlertRequest, ChatMessage, Collaborators, CompletionRequest, OutboundMessage, WebhookRequest,
};
use super::context::{build_context, render_template};
use super::registry::AgentRegistry;
use crate::repository::agent::AgentRepository;

/// Default system prompt for `ai_response` actions without one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an automation agent watching on-chain activity. \
     Explain the event below to the agent's owner in a few sentences and point out anything \
     that needs their attention.";

/// Variable names checked, in order, for a notification recipient.
const RECIPIENT_VARIABLES: &[&str] = &["walletAddress", "owner", "recipient"];

pub struct ActionExecutor<R: AgentRepository> {
    registry: Arc<AgentRegistry<R>>,
    collaborators: Collaborators,
}

impl<R: AgentRepository> ActionExecutor<R> {
    pub fn new(registry: Arc<AgentRegistry<R>>, collaborators: Collaborators) -> Self {
        Self {
            registry,
            collaborators,
        }
    }

    pub fn build_context(
        &self,
        agent_id: AgentId,
        trigger: &EventTrigger,
        event: &NormalizedEvent,
    ) -> ExecutionContext {
        build_context(agent_id, &trigger.id, event, Utc::now())
    }

    /// Build a context and run the trigger's pipeline for `agent`.
    pub async fn execute(
        &self,
        agent: &Agent,
        trigger: &EventTrigger,
        event: &NormalizedEvent,
    ) -> ExecutionResult {
        let mut ctx = self.build_context(agent.id, trigger, event);
        self.run(&mut ctx, agent, trigger, event).await
    }

    /// Run every action of `trigger` in order against `ctx`.
    ///
    /// Actions and settings come from `agent`, the snapshot taken when the
    /// trigger matched. Deleting or editing the agent afterwards does not
    /// affect this run; only its counter updates are skipped.
    pub async fn run(
        &self,
        ctx: &mut ExecutionContext,
        agent: &Agent,
        trigger: &EventTrigger,
        event: &NormalizedEvent,
    ) -> ExecutionResult {
        let started = Instant::now();

        let limit = agent.settings.max_actions_per_trigger;
        let mut results = Vec::with_capacity(trigger.actions.len());

        for (position, action_id) in trigger.actions.iter().enumerate() {
            let result = if position >= limit {
                failed(action_id, ActionError::LimitExceeded { limit })
            } else {
                match agent.action(action_id) {
                    Some(action) => self.run_action(ctx, agent, action, event).await,
                    None => failed(action_id, ActionError::NotFound(action_id.clone())),
                }
            };

            if result.action_type.is_some() {
                if let Err(e) = self
                    .registry
                    .record_action_outcome(&ctx.agent_id, action_id, result.success)
                    .await
                {
                    tracing::debug!(agent_id = %ctx.agent_id, action_id = %action_id, error = %e, "action stats not recorded");
                }
            }

            results.push(result);
        }

        let failures = results.iter().filter(|r| !r.success).count();
        let error = (failures > 0).then(|| format!("{failures} of {} actions failed", results.len()));

        finish(ctx, results, started, error)
    }

    async fn run_action(
        &self,
        ctx: &mut ExecutionContext,
        agent: &Agent,
        action: &AgentAction,
        event: &NormalizedEvent,
    ) -> ActionResult {
        let started_at = Utc::now();
        let clock = Instant::now();
        let action_type = action.action_type();

        let outcome = match &action.config {
            ActionConfig::SendMessage(cfg) => self.send_message(ctx, cfg).await,
            ActionConfig::SendNotification(cfg) => self.send_notification(ctx, cfg).await,
            ActionConfig::CallWebhook(cfg) => self.call_webhook(ctx, cfg).await,
            ActionConfig::AiResponse(cfg) => self.ai_response(ctx, agent, cfg, event).await,
            ActionConfig::ExecuteTransaction(cfg) => Ok(execute_transaction(ctx, cfg)),
            ActionConfig::DataQuery(cfg) => Ok(data_query(ctx, cfg)),
        };

        let execution_time_ms = clock.elapsed().as_millis() as u64;
        match outcome {
            Ok(output) => {
                tracing::debug!(
                    agent_id = %ctx.agent_id,
                    action_id = %action.id,
                    action_type = %action_type,
                    execution_time_ms,
                    "action succeeded"
                );
                publish_output(ctx, &action.id, &output);
                ActionResult {
                    action_id: action.id.clone(),
                    action_type: Some(action_type),
                    success: true,
                    result: Some(output),
                    error: None,
                    started_at,
                    completed_at: Utc::now(),
                    execution_time_ms,
                }
            }
            Err(e) => {
                tracing::warn!(
                    agent_id = %ctx.agent_id,
                    action_id = %action.id,
                    action_type = %action_type,
                    error = %e,
                    "action failed"
                );
                ActionResult {
                    action_id: action.id.clone(),
                    action_type: Some(action_type),
                    success: false,
                    result: None,
                    error: Some(e.to_string()),
                    started_at,
                    completed_at: Utc::now(),
                    execution_time_ms,
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Handlers
    // -----------------------------------------------------------------------

    async fn send_message(
        &self,
        ctx: &ExecutionContext,
        cfg: &SendMessageConfig,
    ) -> Result<Value, ActionError> {
        let message = OutboundMessage {
            text: render_template(&cfg.template, &ctx.variables),
            channel: cfg.channel.clone(),
        };

        match &self.collaborators.messages {
            Some(sender) => sender.send(&message).await,
            None => Ok(json!({
                "delivered": false,
                "stubbed": true,
                "message": message.text,
                "channel": message.channel,
            })),
        }
    }

    async fn send_notification(
        &self,
        ctx: &ExecutionContext,
        cfg: &SendNotificationConfig,
    ) -> Result<Value, ActionError> {
        let alerts = self
            .collaborators
            .alerts
            .as_ref()
            .ok_or_else(|| ActionError::Unavailable("alerts client is not configured".to_string()))?;

        let recipient = cfg
            .wallet_address
            .as_deref()
            .map(|w| render_template(w, &ctx.variables))
            .filter(|w| !w.trim().is_empty())
            .or_else(|| RECIPIENT_VARIABLES.iter().find_map(|name| ctx.variable_str(name)));

        let alert = AlertRequest {
            recipient: recipient.clone(),
            title: render_template(&cfg.title, &ctx.variables),
            body: render_template(&cfg.body, &ctx.variables),
            channels: cfg.channels.clone(),
        };

        let receipt = match &recipient {
            Some(_) => alerts.send(&alert).await?,
            None => alerts.broadcast(&alert).await?,
        };
        if !receipt.success {
            return Err(ActionError::Failed("alert delivery was rejected".to_string()));
        }

        Ok(json!({
            "sent": true,
            "broadcast": recipient.is_none(),
            "recipient": recipient,
            "alertId": receipt.id,
        }))
    }

    async fn call_webhook(
        &self,
        ctx: &ExecutionContext,
        cfg: &CallWebhookConfig,
    ) -> Result<Value, ActionError> {
        let client = self
            .collaborators
            .webhooks
            .as_ref()
            .ok_or_else(|| ActionError::Unavailable("webhook client is not configured".to_string()))?;

        let url = render_template(&cfg.url, &ctx.variables);
        if url.trim().is_empty() {
            return Err(ActionError::InvalidConfig("webhook url is empty".to_string()));
        }

        let request = WebhookRequest {
            method: cfg.method.trim().to_uppercase(),
            url,
            headers: cfg
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), render_template(v, &ctx.variables)))
                .collect(),
            body: cfg.body.as_deref().map(|b| render_template(b, &ctx.variables)),
            timeout: Duration::from_secs(cfg.timeout_secs.max(1)),
        };

        let response = client.call(&request).await?;
        Ok(json!({ "status": response.status, "body": response.body }))
    }

    async fn ai_response(
        &self,
        ctx: &ExecutionContext,
        agent: &Agent,
        cfg: &AiResponseConfig,
        event: &NormalizedEvent,
    ) -> Result<Value, ActionError> {
        let client = self
            .collaborators
            .completions
            .as_ref()
            .ok_or_else(|| ActionError::Unavailable("completion client is not configured".to_string()))?;

        let model = cfg.model.clone().or_else(|| {
            agent
                .ai_config
                .get("model")
                .and_then(Value::as_str)
                .map(str::to_string)
        });

        let system = cfg
            .system_prompt
            .as_deref()
            .map(|s| render_template(s, &ctx.variables))
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        let mut prompt = describe_event(event);
        if let Some(instructions) = &cfg.instructions {
            prompt.push_str("\n\n");
            prompt.push_str(&render_template(instructions, &ctx.variables));
        }

        let request = CompletionRequest {
            model,
            messages: vec![ChatMessage::system(system), ChatMessage::user(prompt)],
            max_tokens: cfg.max_tokens,
            use_retrieval: cfg.use_retrieval,
        };

        let response = client.complete(&request).await?;
        Ok(json!({
            "text": response.text,
            "model": response.model,
            "used_retrieval": cfg.use_retrieval,
            "retrieval": response.retrieval,
        }))
    }
}

fn execute_transaction(ctx: &ExecutionContext, cfg: &ExecuteTransactionConfig) -> Value {
    tracing::info!(
        agent_id = %ctx.agent_id,
        event_id = %ctx.event_id,
        "transaction intent recorded; signing is not performed"
    );
    json!({
        "status": "recorded",
        "executed": false,
        "instruction": cfg.instruction,
        "description": cfg.description.as_deref().map(|d| render_template(d, &ctx.variables)),
    })
}

fn data_query(ctx: &ExecutionContext, cfg: &DataQueryConfig) -> Value {
    json!({
        "status": "recorded",
        "executed": false,
        "query": render_template(&cfg.query, &ctx.variables),
        "source": cfg.source,
    })
}

/// User prompt for `ai_response`: the event type, id, time and data.
pub fn describe_event(event: &NormalizedEvent) -> String {
    let data = serde_json::to_string_pretty(&event.parsed_data)
        .unwrap_or_else(|_| event.parsed_data.to_string());
    format!(
        "Event: {}\nEvent ID: {}\nTime: {}\nData:\n{}",
        event.event_type,
        event.id,
        event.timestamp.to_rfc3339(),
        data
    )
}

/// Expose an action's output to the actions after it.
fn publish_output(ctx: &mut ExecutionContext, action_id: &str, output: &Value) {
    ctx.metadata.insert(action_id.to_string(), output.clone());
    let prefix = format!("actions.{action_id}");
    if let Value::Object(map) = output {
        for (key, value) in map {
            ctx.variables.insert(format!("{prefix}.{key}"), value.clone());
        }
    }
    ctx.variables.insert(prefix, output.clone());
}

/// Result for an action that never ran.
fn failed(action_id: &str, error: ActionError) -> ActionResult {
    let now = Utc::now();
    ActionResult {
        action_id: action_id.to_string(),
        action_type: None,
        success: false,
        result: None,
        error: Some(error.to_string()),
        started_at: now,
        completed_at: now,
        execution_time_ms: 0,
    }
}

fn finish(
    ctx: &ExecutionContext,
    action_results: Vec<ActionResult>,
    started: Instant,
    error: Option<String>,
) -> ExecutionResult {
    let success = action_results.iter().all(|r| r.success);
    ExecutionResult {
        context_id: ctx.id,
        agent_id: ctx.agent_id,
        trigger_id: ctx.trigger_id.clone(),
        event_id: ctx.event_id.clone(),
        event_type: ctx.event_type.clone(),
        success,
        action_results,
        total_execution_time_ms: started.elapsed().as_millis() as u64,
        error,
        timestamp: Utc::now(),
    }
}
