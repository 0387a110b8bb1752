//! Engine logic and repository trait definitions for Tripwire.
//!
//! This crate defines the "ports" (repository and collaborator traits) that
//! the infrastructure layer implements. It depends only on `tripwire-types`
//! -- never on `tripwire-infra` or any database/HTTP crate.

pub mod automation;
pub mod ingest;
pub mod repository;

#[cfg(test)]
mod testing;
