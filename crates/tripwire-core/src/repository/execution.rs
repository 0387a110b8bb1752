//! Execution history repository trait definition.

use tripwire_types::agent::AgentId;
use tripwire_types::error::RepositoryError;
use tripwire_types::execution::ExecutionResult;
use uuid::Uuid;

/// Append-only store of execution results.
///
/// Records are keyed by `context_id` and never updated after insertion.
pub trait ExecutionRepository: Send + Sync {
    /// Insert a new execution record.
    fn insert(
        &self,
        result: &ExecutionResult,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get an execution record by its context ID.
    fn get(
        &self,
        context_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<ExecutionResult>, RepositoryError>> + Send;

    /// List records newest first, optionally restricted to one agent.
    fn list(
        &self,
        agent_id: Option<&AgentId>,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<ExecutionResult>, RepositoryError>> + Send;
}
