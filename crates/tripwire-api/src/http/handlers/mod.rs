//! REST and webhook handlers.

pub mod agent;
pub mod execution;
pub mod webhook;
