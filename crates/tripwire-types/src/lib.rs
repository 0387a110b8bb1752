//! Shared domain types for Tripwire.
//!
//! Agents with their triggers and actions, normalized webhook events,
//! execution contexts and results, engine configuration, and error enums.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod agent;
pub mod config;
pub mod error;
pub mod event;
pub mod execution;
