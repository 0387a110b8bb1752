//! Agent snapshot repository trait definition.

use tripwire_types::agent::{Agent, AgentId};
use tripwire_types::error::RepositoryError;

/// Durable store of whole Agent aggregates.
///
/// Snapshots are written through after every mutation (create, update,
/// execution stats), so the store always holds the latest aggregate.
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait AgentRepository: Send + Sync {
    /// Insert or replace an agent snapshot by ID.
    fn save(
        &self,
        agent: &Agent,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get an agent snapshot by ID.
    fn get(
        &self,
        id: &AgentId,
    ) -> impl std::future::Future<Output = Result<Option<Agent>, RepositoryError>> + Send;

    /// List every stored agent, oldest first.
    fn list(&self) -> impl std::future::Future<Output = Result<Vec<Agent>, RepositoryError>> + Send;

    /// Delete an agent snapshot. Returns `true` if it existed.
    fn delete(
        &self,
        id: &AgentId,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
