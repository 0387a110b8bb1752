//! Execution history handlers.

use axum::extract::{Path, Query, State};
use uuid::Uuid;

use tripwire_types::execution::{ExecutionResult, InFlightExecution};

use super::agent::parse_agent_id;
use crate::http::error::AppError;
use crate::http::extractors::query::ExecutionListQuery;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// GET /api/v1/executions - newest first, optionally `?agentId=`.
pub async fn list_executions(
    State(state): State<AppState>,
    Query(query): Query<ExecutionListQuery>,
) -> Result<ApiResponse<Vec<ExecutionResult>>, AppError> {
    let timer = RequestTimer::start();
    let agent_id = query.agent_id.as_deref().map(parse_agent_id).transpose()?;

    let executions = state
        .engine
        .tracker()
        .query(agent_id.as_ref(), query.limit)
        .await?;
    Ok(timer.finish(executions).with_link("self", "/api/v1/executions"))
}

/// GET /api/v1/executions/active - pipelines not yet persisted.
pub async fn list_active(State(state): State<AppState>) -> ApiResponse<Vec<InFlightExecution>> {
    let timer = RequestTimer::start();
    timer
        .finish(state.engine.tracker().in_flight())
        .with_link("self", "/api/v1/executions/active")
}

/// GET /api/v1/executions/{id}
pub async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<ExecutionResult>, AppError> {
    let timer = RequestTimer::start();
    let context_id = Uuid::parse_str(&id)
        .map_err(|_| AppError::NotFound(format!("Execution '{id}' not found")))?;

    let execution = state
        .engine
        .tracker()
        .get(&context_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Execution '{id}' not found")))?;

    let agent_link = format!("/api/v1/agents/{}", execution.agent_id);
    Ok(timer
        .finish(execution)
        .with_link("self", &format!("/api/v1/executions/{id}"))
        .with_link("agent", &agent_link))
}
