//! Infrastructure layer for Tripwire.
//!
//! Implements the ports defined in `tripwire-core`: SQLite repositories,
//! Dialect webhook ingestion with HMAC verification, reqwest-backed outbound
//! collaborators, and the TOML configuration loader.

pub mod config;
pub mod outbound;
pub mod sqlite;
pub mod webhook;
