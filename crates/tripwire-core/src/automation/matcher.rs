//! Trigger index and cooldown gate.
//!
//! `TriggerMatcher` keeps every active agent's triggers indexed by event
//! type. Matching is read-only: it filters by type, evaluates condition
//! chains, and drops triggers still inside their cooldown window. Only
//! [`TriggerMatcher::mark_fired`] moves a cooldown forward, and the engine
//! calls it once a pipeline has actually run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::RwLock;

use tripwire_types::agent::{AgentId, EventTrigger};
use tripwire_types::event::NormalizedEvent;

use super::condition::evaluate_chain;

/// One (agent, trigger) pair selected for an event.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerMatch {
    pub agent_id: AgentId,
    pub trigger: EventTrigger,
}

#[derive(Debug, Clone)]
struct IndexedTrigger {
    agent_id: AgentId,
    trigger: EventTrigger,
    /// Global registration order, used as the tie-breaker within a priority.
    seq: u64,
}

/// Event-type index over all registered triggers.
#[derive(Default)]
pub struct TriggerMatcher {
    by_event_type: RwLock<HashMap<String, Vec<IndexedTrigger>>>,
    last_fired: DashMap<(AgentId, String), DateTime<Utc>>,
    next_seq: AtomicU64,
}

impl TriggerMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Replace an agent's indexed triggers wholesale.
    ///
    /// Cooldown state for triggers that survive the replacement is kept;
    /// state for triggers that disappeared is dropped.
    pub async fn add_triggers(&self, agent_id: AgentId, triggers: &[EventTrigger]) {
        let mut index = self.by_event_type.write().await;
        remove_agent(&mut index, &agent_id);

        for trigger in triggers {
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            index
                .entry(trigger.event_type.clone())
                .or_default()
                .push(IndexedTrigger {
                    agent_id,
                    trigger: trigger.clone(),
                    seq,
                });
        }

        self.last_fired.retain(|(owner, trigger_id), _| {
            *owner != agent_id || triggers.iter().any(|t| &t.id == trigger_id)
        });

        tracing::debug!(agent_id = %agent_id, count = triggers.len(), "indexed triggers");
    }

    /// Drop an agent's triggers and all of its cooldown state.
    pub async fn remove_triggers(&self, agent_id: &AgentId) {
        let mut index = self.by_event_type.write().await;
        remove_agent(&mut index, agent_id);
        self.last_fired.retain(|(owner, _), _| owner != agent_id);
        tracing::debug!(agent_id = %agent_id, "removed triggers");
    }

    /// Match an event against the index using the current time.
    pub async fn match_event(&self, event: &NormalizedEvent) -> Vec<TriggerMatch> {
        self.match_event_at(event, Utc::now()).await
    }

    /// Match an event as of `now`.
    ///
    /// Results are ordered by priority (high first), then registration order.
    pub async fn match_event_at(
        &self,
        event: &NormalizedEvent,
        now: DateTime<Utc>,
    ) -> Vec<TriggerMatch> {
        let index = self.by_event_type.read().await;
        let Some(candidates) = index.get(&event.event_type) else {
            return Vec::new();
        };

        let mut matched: Vec<&IndexedTrigger> = candidates
            .iter()
            .filter(|c| evaluate_chain(&c.trigger.conditions, &event.parsed_data))
            .filter(|c| {
                let cooling = self.in_cooldown(&c.agent_id, &c.trigger, now);
                if cooling {
                    tracing::debug!(
                        agent_id = %c.agent_id,
                        trigger_id = %c.trigger.id,
                        event_id = %event.id,
                        "trigger in cooldown, skipping"
                    );
                }
                !cooling
            })
            .collect();

        matched.sort_by(|a, b| {
            b.trigger
                .priority
                .cmp(&a.trigger.priority)
                .then(a.seq.cmp(&b.seq))
        });

        matched
            .into_iter()
            .map(|c| TriggerMatch {
                agent_id: c.agent_id,
                trigger: c.trigger.clone(),
            })
            .collect()
    }

    /// Whether a trigger fired less than `cooldown` seconds before `now`.
    pub fn in_cooldown(&self, agent_id: &AgentId, trigger: &EventTrigger, now: DateTime<Utc>) -> bool {
        if trigger.cooldown == 0 {
            return false;
        }
        let key = (*agent_id, trigger.id.clone());
        match self.last_fired.get(&key) {
            Some(last) => {
                let elapsed = now.signed_duration_since(*last).num_milliseconds();
                let window = i64::try_from(trigger.cooldown).unwrap_or(i64::MAX);
                elapsed < window.saturating_mul(1000)
            }
            None => false,
        }
    }

    /// Record that a trigger fired at `at`.
    pub fn mark_fired(&self, agent_id: AgentId, trigger_id: &str, at: DateTime<Utc>) {
        self.last_fired.insert((agent_id, trigger_id.to_string()), at);
    }

    pub fn last_fired(&self, agent_id: &AgentId, trigger_id: &str) -> Option<DateTime<Utc>> {
        self.last_fired
            .get(&(*agent_id, trigger_id.to_string()))
            .map(|entry| *entry)
    }

    /// Total number of indexed triggers.
    pub async fn trigger_count(&self) -> usize {
        self.by_event_type.read().await.values().map(Vec::len).sum()
    }
}

fn remove_agent(index: &mut HashMap<String, Vec<IndexedTrigger>>, agent_id: &AgentId) {
    for entries in index.values_mut() {
        entries.retain(|e| &e.agent_id != agent_id);
    }
    index.retain(|_, entries| !entries.is_empty());
}
