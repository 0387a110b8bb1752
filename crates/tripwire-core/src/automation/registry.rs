//! Agent registry: the single owner of Agent aggregates.
//!
//! All reads go through the in-memory map; every mutation is written through
//! to the [`AgentRepository`] and re-indexes the [`TriggerMatcher`] when the
//! trigger set or the active flag changes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use tripwire_types::agent::{
    Agent, AgentAction, AgentId, AgentStats, CreateAgentRequest, EventTrigger, UpdateAgentRequest,
};
use tripwire_types::error::AgentError;
use tripwire_types::event::NormalizedEvent;
use tripwire_types::execution::ExecutionResult;

use super::matcher::TriggerMatcher;
use crate::repository::agent::AgentRepository;

/// A matched trigger bound to the agent as it was when the match was made.
///
/// The pipeline runs from this snapshot, so deleting or editing the agent
/// afterwards does not change what a pending firing does.
#[derive(Debug, Clone)]
pub struct AgentMatch {
    pub agent: Arc<Agent>,
    pub trigger: EventTrigger,
}

pub struct AgentRegistry<R: AgentRepository> {
    repo: R,
    agents: RwLock<HashMap<AgentId, Agent>>,
    matcher: Arc<TriggerMatcher>,
}

impl<R: AgentRepository> AgentRegistry<R> {
    pub fn new(repo: R, matcher: Arc<TriggerMatcher>) -> Self {
        Self {
            repo,
            agents: RwLock::new(HashMap::new()),
            matcher,
        }
    }

    pub fn matcher(&self) -> &Arc<TriggerMatcher> {
        &self.matcher
    }

    /// Load every persisted agent and index the active ones.
    ///
    /// Must complete before any event is accepted. Returns the number of
    /// agents loaded.
    pub async fn load(&self) -> Result<usize, AgentError> {
        let stored = self
            .repo
            .list()
            .await
            .map_err(|e| AgentError::StorageError(e.to_string()))?;

        let mut agents = self.agents.write().await;
        for agent in stored {
            if agent.active {
                self.matcher.add_triggers(agent.id, &agent.triggers).await;
            }
            agents.insert(agent.id, agent);
        }

        tracing::info!(count = agents.len(), "loaded agents");
        Ok(agents.len())
    }

    pub async fn create(&self, request: CreateAgentRequest) -> Result<Agent, AgentError> {
        let now = Utc::now();
        let agent = Agent {
            id: AgentId::new(),
            name: request.name.trim().to_string(),
            description: request.description.trim().to_string(),
            active: request.active,
            ai_config: request.ai_config,
            triggers: request.triggers,
            actions: request.actions,
            stats: AgentStats::default(),
            settings: request.settings.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        validate_agent(&agent)?;

        self.persist(&agent).await?;

        let mut agents = self.agents.write().await;
        if agent.active {
            self.matcher.add_triggers(agent.id, &agent.triggers).await;
        }
        agents.insert(agent.id, agent.clone());

        tracing::info!(agent_id = %agent.id, name = %agent.name, "created agent");
        Ok(agent)
    }

    /// Apply a partial update, re-validating the merged aggregate.
    ///
    /// Actions whose id survives the update keep their execution counters.
    pub async fn update(&self, id: &AgentId, request: UpdateAgentRequest) -> Result<Agent, AgentError> {
        let mut agents = self.agents.write().await;
        let current = agents.get(id).ok_or(AgentError::NotFound)?;

        let mut next = current.clone();
        if let Some(name) = request.name {
            next.name = name.trim().to_string();
        }
        if let Some(description) = request.description {
            next.description = description.trim().to_string();
        }
        if let Some(active) = request.active {
            next.active = active;
        }
        if let Some(ai_config) = request.ai_config {
            next.ai_config = ai_config;
        }
        if let Some(triggers) = request.triggers {
            next.triggers = triggers;
        }
        if let Some(actions) = request.actions {
            next.actions = carry_counters(&current.actions, actions);
        }
        if let Some(settings) = request.settings {
            next.settings = settings;
        }
        next.updated_at = Utc::now();
        validate_agent(&next)?;
        let reindex = next.active != current.active || next.triggers != current.triggers;

        self.persist(&next).await?;

        // Re-indexing assigns fresh registration order, so only do it when
        // the indexed state actually changed.
        if reindex {
            if next.active {
                self.matcher.add_triggers(next.id, &next.triggers).await;
            } else {
                self.matcher.remove_triggers(&next.id).await;
            }
        }
        agents.insert(next.id, next.clone());

        tracing::info!(agent_id = %next.id, active = next.active, "updated agent");
        Ok(next)
    }

    pub async fn set_active(&self, id: &AgentId, active: bool) -> Result<Agent, AgentError> {
        self.update(
            id,
            UpdateAgentRequest {
                active: Some(active),
                ..Default::default()
            },
        )
        .await
    }

    /// Delete an agent and de-index its triggers.
    ///
    /// Pipelines already running for this agent finish normally; their
    /// stats updates become no-ops.
    pub async fn delete(&self, id: &AgentId) -> Result<(), AgentError> {
        let mut agents = self.agents.write().await;
        if !agents.contains_key(id) {
            return Err(AgentError::NotFound);
        }

        self.repo
            .delete(id)
            .await
            .map_err(|e| AgentError::StorageError(e.to_string()))?;

        self.matcher.remove_triggers(id).await;
        agents.remove(id);

        tracing::info!(agent_id = %id, "deleted agent");
        Ok(())
    }

    pub async fn get(&self, id: &AgentId) -> Result<Agent, AgentError> {
        self.agents
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(AgentError::NotFound)
    }

    /// All agents, oldest first.
    pub async fn list(&self) -> Vec<Agent> {
        let mut agents: Vec<Agent> = self.agents.read().await.values().cloned().collect();
        agents.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        agents
    }

    /// Match an event and snapshot the owning agent of every match.
    ///
    /// The agent map stays read-locked while matching, so a concurrent
    /// delete lands either before the match (no firing) or after it (the
    /// snapshot still runs).
    pub async fn match_event(&self, event: &NormalizedEvent) -> Vec<AgentMatch> {
        let agents = self.agents.read().await;
        let matches = self.matcher.match_event(event).await;

        let mut snapshots: HashMap<AgentId, Arc<Agent>> = HashMap::new();
        matches
            .into_iter()
            .filter_map(|m| {
                let agent = match snapshots.get(&m.agent_id) {
                    Some(agent) => agent.clone(),
                    None => {
                        let agent = Arc::new(agents.get(&m.agent_id)?.clone());
                        snapshots.insert(m.agent_id, agent.clone());
                        agent
                    }
                };
                Some(AgentMatch {
                    agent,
                    trigger: m.trigger,
                })
            })
            .collect()
    }

    /// Fold one action outcome into the action's counters (in memory only;
    /// the snapshot is persisted with the execution's stats).
    pub async fn record_action_outcome(
        &self,
        agent_id: &AgentId,
        action_id: &str,
        success: bool,
    ) -> Result<(), AgentError> {
        let mut agents = self.agents.write().await;
        let agent = agents.get_mut(agent_id).ok_or(AgentError::NotFound)?;
        match agent.action_mut(action_id) {
            Some(action) => {
                action.record_outcome(success);
                Ok(())
            }
            None => Err(AgentError::Validation(format!(
                "action '{action_id}' not found"
            ))),
        }
    }

    /// Update agent stats from a finished execution and persist the snapshot.
    pub async fn apply_execution(&self, result: &ExecutionResult) -> Result<Agent, AgentError> {
        let snapshot = {
            let mut agents = self.agents.write().await;
            let agent = agents.get_mut(&result.agent_id).ok_or(AgentError::NotFound)?;
            apply_stats(&mut agent.stats, result);
            agent.clone()
        };

        self.persist(&snapshot).await?;
        Ok(snapshot)
    }

    async fn persist(&self, agent: &Agent) -> Result<(), AgentError> {
        self.repo.save(agent).await.map_err(|e| {
            tracing::error!(agent_id = %agent.id, error = %e, "failed to persist agent");
            AgentError::StorageError(e.to_string())
        })
    }
}

/// Fold an execution into aggregate stats.
pub fn apply_stats(stats: &mut AgentStats, result: &ExecutionResult) {
    let first = stats.total_triggers == 0;
    stats.total_triggers += 1;
    if result.success {
        stats.successful_executions += 1;
    } else {
        stats.failed_executions += 1;
    }

    let sample = result.total_execution_time_ms as f64;
    stats.average_response_time_ms = if first {
        sample
    } else {
        (stats.average_response_time_ms + sample) / 2.0
    };

    stats.last_activity = Some(Utc::now());
    *stats
        .events_processed
        .entry(result.event_type.clone())
        .or_insert(0) += 1;
}

fn carry_counters(previous: &[AgentAction], next: Vec<AgentAction>) -> Vec<AgentAction> {
    next.into_iter()
        .map(|mut action| {
            if let Some(old) = previous.iter().find(|a| a.id == action.id) {
                action.execution_count = old.execution_count;
                action.success_rate = old.success_rate;
            }
            action
        })
        .collect()
}

/// Structural checks applied on create and on every update.
pub fn validate_agent(agent: &Agent) -> Result<(), AgentError> {
    let invalid = |msg: String| Err(AgentError::Validation(msg));

    if agent.name.trim().is_empty() {
        return invalid("name cannot be empty".to_string());
    }
    if agent.description.trim().is_empty() {
        return invalid("description cannot be empty".to_string());
    }
    if !agent.ai_config.is_object() {
        return invalid("aiConfig must be a JSON object".to_string());
    }
    if agent.settings.max_actions_per_trigger == 0 {
        return invalid("settings.maxActionsPerTrigger must be at least 1".to_string());
    }

    let mut action_ids = HashSet::new();
    for action in &agent.actions {
        if action.id.trim().is_empty() {
            return invalid("action id cannot be empty".to_string());
        }
        if !action_ids.insert(action.id.as_str()) {
            return invalid(format!("duplicate action id '{}'", action.id));
        }
    }

    let mut trigger_ids = HashSet::new();
    for trigger in &agent.triggers {
        if trigger.id.trim().is_empty() {
            return invalid("trigger id cannot be empty".to_string());
        }
        if !trigger_ids.insert(trigger.id.as_str()) {
            return invalid(format!("duplicate trigger id '{}'", trigger.id));
        }
        if trigger.event_type.trim().is_empty() {
            return invalid(format!("trigger '{}' has an empty eventType", trigger.id));
        }
        if let Some(cond) = trigger.conditions.iter().find(|c| c.field.trim().is_empty()) {
            return invalid(format!(
                "trigger '{}' has a condition with an empty field ({})",
                trigger.id, cond.operator
            ));
        }
        if let Some(missing) = trigger.actions.iter().find(|a| !action_ids.contains(a.as_str())) {
            return invalid(format!(
                "trigger '{}' references unknown action '{missing}'",
                trigger.id
            ));
        }
    }

    Ok(())
}
