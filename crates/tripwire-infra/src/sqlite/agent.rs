//! SQLite agent repository implementation.
//!
//! Implements `AgentRepository` from `tripwire-core`. Each row stores the
//! whole aggregate as a JSON snapshot next to a few scalar columns used for
//! ordering and ad-hoc inspection.

use chrono::{DateTime, Utc};
use sqlx::Row;
use tripwire_core::repository::agent::AgentRepository;
use tripwire_types::agent::{Agent, AgentId};
use tripwire_types::error::RepositoryError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `AgentRepository`.
pub struct SqliteAgentRepository {
    pool: DatabasePool,
}

impl SqliteAgentRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to a domain Agent.
struct AgentRow {
    id: String,
    snapshot: String,
}

impl AgentRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            snapshot: row.try_get("snapshot")?,
        })
    }

    fn into_agent(self) -> Result<Agent, RepositoryError> {
        let agent: Agent = serde_json::from_str(&self.snapshot)
            .map_err(|e| RepositoryError::Query(format!("invalid agent snapshot {}: {e}", self.id)))?;
        if agent.id.to_string() != self.id {
            return Err(RepositoryError::Query(format!(
                "snapshot id {} does not match row id {}",
                agent.id, self.id
            )));
        }
        Ok(agent)
    }
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

impl AgentRepository for SqliteAgentRepository {
    async fn save(&self, agent: &Agent) -> Result<(), RepositoryError> {
        let snapshot =
            serde_json::to_string(agent).map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query(
            "INSERT INTO agents (id, name, description, active, snapshot, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                active = excluded.active,
                snapshot = excluded.snapshot,
                updated_at = excluded.updated_at",
        )
        .bind(agent.id.to_string())
        .bind(&agent.name)
        .bind(&agent.description)
        .bind(agent.active)
        .bind(&snapshot)
        .bind(format_datetime(&agent.created_at))
        .bind(format_datetime(&agent.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn get(&self, id: &AgentId) -> Result<Option<Agent>, RepositoryError> {
        let row = sqlx::query("SELECT id, snapshot FROM agents WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(ref r) => {
                let agent_row =
                    AgentRow::from_row(r).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(agent_row.into_agent()?))
            }
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Agent>, RepositoryError> {
        let rows = sqlx::query("SELECT id, snapshot FROM agents ORDER BY created_at ASC, id ASC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|r| {
                AgentRow::from_row(r)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?
                    .into_agent()
            })
            .collect()
    }

    async fn delete(&self, id: &AgentId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM agents WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}
