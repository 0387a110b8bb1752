//! Agent CRUD handlers for the REST API.

use axum::Json;
use axum::extract::{Path, Query, State};

use tripwire_types::agent::{Agent, AgentId, CreateAgentRequest, UpdateAgentRequest};
use tripwire_types::error::AgentError;
use tripwire_types::execution::ExecutionResult;

use crate::http::error::AppError;
use crate::http::extractors::query::ExecutionListQuery;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

pub(crate) fn parse_agent_id(raw: &str) -> Result<AgentId, AppError> {
    raw.parse::<AgentId>()
        .map_err(|_| AppError::Agent(AgentError::NotFound))
}

fn agent_links(resp: ApiResponse<Agent>, id: &AgentId) -> ApiResponse<Agent> {
    resp.with_link("self", &format!("/api/v1/agents/{id}"))
        .with_link("executions", &format!("/api/v1/agents/{id}/executions"))
}

/// POST /api/v1/agents
pub async fn create_agent(
    State(state): State<AppState>,
    Json(body): Json<CreateAgentRequest>,
) -> Result<ApiResponse<Agent>, AppError> {
    let timer = RequestTimer::start();
    let agent = state.registry().create(body).await?;
    let id = agent.id;
    Ok(agent_links(timer.finish(agent), &id))
}

/// GET /api/v1/agents
pub async fn list_agents(State(state): State<AppState>) -> ApiResponse<Vec<Agent>> {
    let timer = RequestTimer::start();
    let agents = state.registry().list().await;
    timer.finish(agents).with_link("self", "/api/v1/agents")
}

/// GET /api/v1/agents/{id}
pub async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Agent>, AppError> {
    let timer = RequestTimer::start();
    let id = parse_agent_id(&id)?;
    let agent = state.registry().get(&id).await?;
    Ok(agent_links(timer.finish(agent), &id))
}

/// PUT /api/v1/agents/{id}
pub async fn update_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateAgentRequest>,
) -> Result<ApiResponse<Agent>, AppError> {
    let timer = RequestTimer::start();
    let id = parse_agent_id(&id)?;
    let agent = state.registry().update(&id, body).await?;
    Ok(agent_links(timer.finish(agent), &id))
}

/// DELETE /api/v1/agents/{id}
pub async fn delete_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();
    let id = parse_agent_id(&id)?;
    state.registry().delete(&id).await?;
    Ok(timer.finish(serde_json::json!({ "deleted": true, "id": id })))
}

/// GET /api/v1/agents/{id}/executions
pub async fn list_agent_executions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ExecutionListQuery>,
) -> Result<ApiResponse<Vec<ExecutionResult>>, AppError> {
    let timer = RequestTimer::start();
    let id = parse_agent_id(&id)?;
    state.registry().get(&id).await?;

    let executions = state.engine.tracker().query(Some(&id), query.limit).await?;
    Ok(timer
        .finish(executions)
        .with_link("self", &format!("/api/v1/agents/{id}/executions"))
        .with_link("agent", &format!("/api/v1/agents/{id}")))
}
