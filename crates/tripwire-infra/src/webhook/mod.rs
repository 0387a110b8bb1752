//! Inbound Dialect webhooks.

pub mod ingestor;
pub mod signature;
