//! SQLite execution history repository.
//!
//! Rows are insert-only. Timestamps are stored as fixed-width RFC 3339
//! strings (microseconds, `Z` suffix) so lexical order equals time order.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use tripwire_core::repository::execution::ExecutionRepository;
use tripwire_types::agent::AgentId;
use tripwire_types::error::RepositoryError;
use tripwire_types::execution::{ActionResult, ExecutionResult};
use uuid::Uuid;

use super::pool::DatabasePool;

pub struct SqliteExecutionRepository {
    pool: DatabasePool,
}

impl SqliteExecutionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct ExecutionRow {
    context_id: String,
    agent_id: String,
    trigger_id: String,
    event_id: String,
    event_type: String,
    success: bool,
    total_execution_time_ms: i64,
    error: Option<String>,
    action_results: String,
    timestamp: String,
}

impl ExecutionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            context_id: row.try_get("context_id")?,
            agent_id: row.try_get("agent_id")?,
            trigger_id: row.try_get("trigger_id")?,
            event_id: row.try_get("event_id")?,
            event_type: row.try_get("event_type")?,
            success: row.try_get("success")?,
            total_execution_time_ms: row.try_get("total_execution_time_ms")?,
            error: row.try_get("error")?,
            action_results: row.try_get("action_results")?,
            timestamp: row.try_get("timestamp")?,
        })
    }

    fn into_result(self) -> Result<ExecutionResult, RepositoryError> {
        let context_id = Uuid::parse_str(&self.context_id)
            .map_err(|e| RepositoryError::Query(format!("invalid context id: {e}")))?;
        let agent_id = self
            .agent_id
            .parse::<AgentId>()
            .map_err(|e| RepositoryError::Query(format!("invalid agent id: {e}")))?;
        let action_results: Vec<ActionResult> = serde_json::from_str(&self.action_results)
            .map_err(|e| RepositoryError::Query(format!("invalid action results JSON: {e}")))?;
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))?;

        Ok(ExecutionResult {
            context_id,
            agent_id,
            trigger_id: self.trigger_id,
            event_id: self.event_id,
            event_type: self.event_type,
            success: self.success,
            action_results,
            total_execution_time_ms: self.total_execution_time_ms.max(0) as u64,
            error: self.error,
            timestamp,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT context_id, agent_id, trigger_id, event_id, event_type, success, \
     total_execution_time_ms, error, action_results, timestamp FROM executions";

impl ExecutionRepository for SqliteExecutionRepository {
    async fn insert(&self, result: &ExecutionResult) -> Result<(), RepositoryError> {
        let action_results = serde_json::to_string(&result.action_results)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query(
            "INSERT INTO executions (context_id, agent_id, trigger_id, event_id, event_type, success, total_execution_time_ms, error, action_results, timestamp)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(result.context_id.to_string())
        .bind(result.agent_id.to_string())
        .bind(&result.trigger_id)
        .bind(&result.event_id)
        .bind(&result.event_type)
        .bind(result.success)
        .bind(result.total_execution_time_ms as i64)
        .bind(&result.error)
        .bind(&action_results)
        .bind(result.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                RepositoryError::Conflict(format!("execution {} already recorded", result.context_id))
            }
            other => RepositoryError::Query(other.to_string()),
        })?;

        Ok(())
    }

    async fn get(&self, context_id: &Uuid) -> Result<Option<ExecutionResult>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE context_id = ?"))
            .bind(context_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref()
            .map(|r| {
                ExecutionRow::from_row(r)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?
                    .into_result()
            })
            .transpose()
    }

    async fn list(
        &self,
        agent_id: Option<&AgentId>,
        limit: u32,
    ) -> Result<Vec<ExecutionResult>, RepositoryError> {
        let rows = match agent_id {
            Some(id) => {
                sqlx::query(&format!(
                    "{SELECT_COLUMNS} WHERE agent_id = ? ORDER BY timestamp DESC, context_id DESC LIMIT ?"
                ))
                .bind(id.to_string())
                .bind(limit as i64)
                .fetch_all(&self.pool.reader)
                .await
            }
            None => {
                sqlx::query(&format!(
                    "{SELECT_COLUMNS} ORDER BY timestamp DESC, context_id DESC LIMIT ?"
                ))
                .bind(limit as i64)
                .fetch_all(&self.pool.reader)
                .await
            }
        }
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|r| {
                ExecutionRow::from_row(r)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?
                    .into_result()
            })
            .collect()
    }
}
