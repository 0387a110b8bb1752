//! Per-event orchestration: match, execute, record.

use std::sync::Arc;

use chrono::Utc;

use tripwire_types::event::NormalizedEvent;
use tripwire_types::execution::{ExecutionPhase, ExecutionResult};

use super::collaborator::Collaborators;
use super::executor::ActionExecutor;
use super::matcher::TriggerMatcher;
use super::registry::{AgentMatch, AgentRegistry};
use super::tracker::ExecutionTracker;
use crate::repository::agent::AgentRepository;
use crate::repository::execution::ExecutionRepository;

/// Wires the matcher, executor and tracker around one shared registry.
pub struct AutomationEngine<A: AgentRepository, E: ExecutionRepository> {
    registry: Arc<AgentRegistry<A>>,
    executor: ActionExecutor<A>,
    tracker: ExecutionTracker<A, E>,
}

impl<A: AgentRepository, E: ExecutionRepository> AutomationEngine<A, E> {
    pub fn new(registry: Arc<AgentRegistry<A>>, executions: E, collaborators: Collaborators) -> Self {
        Self {
            executor: ActionExecutor::new(registry.clone(), collaborators),
            tracker: ExecutionTracker::new(registry.clone(), executions),
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<AgentRegistry<A>> {
        &self.registry
    }

    pub fn matcher(&self) -> &Arc<TriggerMatcher> {
        self.registry.matcher()
    }

    pub fn executor(&self) -> &ActionExecutor<A> {
        &self.executor
    }

    pub fn tracker(&self) -> &ExecutionTracker<A, E> {
        &self.tracker
    }

    /// Run every trigger matching `event`, highest priority first.
    pub async fn process_event(&self, event: &NormalizedEvent) -> Vec<ExecutionResult> {
        let matches = self.registry.match_event(event).await;
        tracing::debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            matches = matches.len(),
            "matched event"
        );

        let mut results = Vec::with_capacity(matches.len());
        for m in matches {
            if let Some(result) = self.fire(&m, event).await {
                results.push(result);
            }
        }
        results
    }

    /// Fire one match through the full lifecycle.
    ///
    /// The cooldown is re-checked here because an earlier pipeline for the
    /// same event may have fired the trigger already. Returns `None` when the
    /// trigger was still cooling down.
    pub async fn fire(&self, m: &AgentMatch, event: &NormalizedEvent) -> Option<ExecutionResult> {
        let matcher = self.matcher();
        let agent_id = m.agent.id;
        if matcher.in_cooldown(&agent_id, &m.trigger, Utc::now()) {
            return None;
        }

        let mut ctx = self.executor.build_context(agent_id, &m.trigger, event);
        self.tracker.begin(&ctx);
        self.tracker.advance(&ctx.id, ExecutionPhase::Running);

        let result = self.executor.run(&mut ctx, &m.agent, &m.trigger, event).await;
        self.tracker.advance(&ctx.id, ExecutionPhase::Completed);

        // Cooldown starts once the pipeline has run, whatever its outcome.
        matcher.mark_fired(agent_id, &m.trigger.id, Utc::now());

        self.tracker.record(&result).await;
        Some(result)
    }
}
