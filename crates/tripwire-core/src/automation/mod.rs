//! Trigger matching, action execution and execution tracking.
//!
//! Data flows `NormalizedEvent -> TriggerMatcher -> ActionExecutor ->
//! ExecutionTracker -> AgentRegistry`. [`engine::AutomationEngine`] wires the
//! pieces together and [`dispatcher::Dispatcher`] feeds it events.

pub mod collaborator;
pub mod condition;
pub mod context;
pub mod dispatcher;
pub mod engine;
pub mod executor;
pub mod matcher;
pub mod registry;
pub mod tracker;
