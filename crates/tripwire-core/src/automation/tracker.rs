//! Execution history and in-flight tracking.
//!
//! Every firing moves through `Created -> Running -> Completed -> Persisted`.
//! The tracker holds the first three phases in memory and drops the entry
//! once the result has been written. Persistence is best-effort: a failed
//! write is logged and the result is lost, never retried.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use tripwire_types::agent::AgentId;
use tripwire_types::error::RepositoryError;
use tripwire_types::execution::{
    ExecutionContext, ExecutionPhase, ExecutionResult, InFlightExecution,
};

use super::registry::AgentRegistry;
use crate::repository::agent::AgentRepository;
use crate::repository::execution::ExecutionRepository;

/// Default number of records returned by [`ExecutionTracker::query`].
pub const DEFAULT_QUERY_LIMIT: u32 = 50;

/// Hard cap on a single history query.
pub const MAX_QUERY_LIMIT: u32 = 500;

pub struct ExecutionTracker<A: AgentRepository, E: ExecutionRepository> {
    registry: Arc<AgentRegistry<A>>,
    repo: E,
    in_flight: DashMap<Uuid, InFlightExecution>,
}

impl<A: AgentRepository, E: ExecutionRepository> ExecutionTracker<A, E> {
    pub fn new(registry: Arc<AgentRegistry<A>>, repo: E) -> Self {
        Self {
            registry,
            repo,
            in_flight: DashMap::new(),
        }
    }

    /// Register a freshly built context in the `Created` phase.
    pub fn begin(&self, ctx: &ExecutionContext) {
        self.in_flight.insert(
            ctx.id,
            InFlightExecution {
                context_id: ctx.id,
                agent_id: ctx.agent_id,
                trigger_id: ctx.trigger_id.clone(),
                event_id: ctx.event_id.clone(),
                phase: ExecutionPhase::Created,
                started_at: ctx.timestamp,
            },
        );
    }

    pub fn advance(&self, context_id: &Uuid, phase: ExecutionPhase) {
        if let Some(mut entry) = self.in_flight.get_mut(context_id) {
            entry.phase = phase;
        }
    }

    pub fn phase(&self, context_id: &Uuid) -> Option<ExecutionPhase> {
        self.in_flight.get(context_id).map(|e| e.phase)
    }

    /// Executions not yet persisted, oldest first.
    pub fn in_flight(&self) -> Vec<InFlightExecution> {
        let mut entries: Vec<InFlightExecution> =
            self.in_flight.iter().map(|e| e.value().clone()).collect();
        entries.sort_by_key(|e| e.started_at);
        entries
    }

    /// Persist a finished execution and fold it into the agent's stats.
    ///
    /// Returns whether the execution record was written.
    pub async fn record(&self, result: &ExecutionResult) -> bool {
        let stored = match self.repo.insert(result).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    context_id = %result.context_id,
                    agent_id = %result.agent_id,
                    error = %e,
                    "failed to persist execution result"
                );
                false
            }
        };

        match self.registry.apply_execution(result).await {
            Ok(agent) => tracing::debug!(
                agent_id = %agent.id,
                total_triggers = agent.stats.total_triggers,
                "agent stats updated"
            ),
            Err(e) => tracing::warn!(
                agent_id = %result.agent_id,
                error = %e,
                "agent stats not updated"
            ),
        }

        self.advance(&result.context_id, ExecutionPhase::Persisted);
        self.in_flight.remove(&result.context_id);

        tracing::info!(
            context_id = %result.context_id,
            agent_id = %result.agent_id,
            trigger_id = %result.trigger_id,
            success = result.success,
            actions = result.action_results.len(),
            total_execution_time_ms = result.total_execution_time_ms,
            completed_at = %Utc::now(),
            "execution recorded"
        );
        stored
    }

    /// Newest-first history, optionally for one agent.
    ///
    /// `limit` defaults to [`DEFAULT_QUERY_LIMIT`] and is clamped to
    /// `1..=MAX_QUERY_LIMIT`.
    pub async fn query(
        &self,
        agent_id: Option<&AgentId>,
        limit: Option<u32>,
    ) -> Result<Vec<ExecutionResult>, RepositoryError> {
        let limit = limit.unwrap_or(DEFAULT_QUERY_LIMIT).clamp(1, MAX_QUERY_LIMIT);
        self.repo.list(agent_id, limit).await
    }

    pub async fn get(&self, context_id: &Uuid) -> Result<Option<ExecutionResult>, RepositoryError> {
        self.repo.get(context_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::matcher::TriggerMatcher;
    use crate::testing::{MemoryAgentRepo, MemoryExecutionRepo, execution_result, sample_request};

    async fn tracker() -> (
        ExecutionTracker<MemoryAgentRepo, MemoryExecutionRepo>,
        Arc<AgentRegistry<MemoryAgentRepo>>,
        AgentId,
    ) {
        let registry = Arc::new(AgentRegistry::new(
            MemoryAgentRepo::default(),
            TriggerMatcher::shared(),
        ));
        let agent = registry.create(sample_request()).await.unwrap();
        let tracker = ExecutionTracker::new(registry.clone(), MemoryExecutionRepo::default());
        (tracker, registry, agent.id)
    }

    #[tokio::test]
    async fn record_persists_and_updates_stats() {
        let (tracker, registry, agent_id) = tracker().await;
        let result = execution_result(agent_id, true, 40);

        assert!(tracker.record(&result).await);

        let stored = tracker.get(&result.context_id).await.unwrap().unwrap();
        assert_eq!(stored, result);

        let agent = registry.get(&agent_id).await.unwrap();
        assert_eq!(agent.stats.total_triggers, 1);
        assert_eq!(agent.stats.successful_executions, 1);
    }

    #[tokio::test]
    async fn record_for_deleted_agent_still_persists_result() {
        let (tracker, registry, agent_id) = tracker().await;
        registry.delete(&agent_id).await.unwrap();

        let result = execution_result(agent_id, false, 10);
        assert!(tracker.record(&result).await);
        assert_eq!(tracker.query(Some(&agent_id), None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn phases_progress_until_persisted() {
        let (tracker, _registry, agent_id) = tracker().await;
        let result = execution_result(agent_id, true, 5);
        let ctx = ExecutionContext {
            id: result.context_id,
            agent_id,
            trigger_id: result.trigger_id.clone(),
            event_id: result.event_id.clone(),
            event_type: result.event_type.clone(),
            timestamp: Utc::now(),
            variables: Default::default(),
            metadata: Default::default(),
        };

        tracker.begin(&ctx);
        assert_eq!(tracker.phase(&ctx.id), Some(ExecutionPhase::Created));
        tracker.advance(&ctx.id, ExecutionPhase::Running);
        assert_eq!(tracker.in_flight()[0].phase, ExecutionPhase::Running);

        tracker.record(&result).await;
        assert!(tracker.phase(&ctx.id).is_none());
        assert!(tracker.in_flight().is_empty());
    }

    #[tokio::test]
    async fn query_is_newest_first_and_clamped() {
        let (tracker, _registry, agent_id) = tracker().await;
        let mut ids = Vec::new();
        for _ in 0..3 {
            let result = execution_result(agent_id, true, 1);
            ids.push(result.context_id);
            tracker.record(&result).await;
        }

        let all = tracker.query(None, None).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].context_id, ids[2]);

        let one = tracker.query(Some(&agent_id), Some(0)).await.unwrap();
        assert_eq!(one.len(), 1);
    }
}
