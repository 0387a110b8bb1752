//! Axum router configuration with middleware.
//!
//! Management routes live under `/api/v1/`. The Dialect webhook is mounted
//! both there and at the root (`/webhooks/dialect`), which is the URL most
//! provider dashboards are configured with.
//! Middleware: CORS, tracing.

use axum::Router;
use axum::extract::State;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Agents
        .route(
            "/agents",
            post(handlers::agent::create_agent).get(handlers::agent::list_agents),
        )
        .route(
            "/agents/{id}",
            get(handlers::agent::get_agent)
                .put(handlers::agent::update_agent)
                .delete(handlers::agent::delete_agent),
        )
        .route(
            "/agents/{id}/executions",
            get(handlers::agent::list_agent_executions),
        )
        // Execution history
        .route("/executions", get(handlers::execution::list_executions))
        .route("/executions/active", get(handlers::execution::list_active))
        .route("/executions/{id}", get(handlers::execution::get_execution))
        // Ingress
        .route("/webhooks/dialect", post(handlers::webhook::receive_dialect));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/webhooks/dialect", post(handlers::webhook::receive_dialect))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - liveness plus a few engine gauges.
async fn health_check(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "agents": state.registry().list().await.len(),
        "triggers": state.registry().matcher().trigger_count().await,
        "inFlight": state.engine.tracker().in_flight().len(),
    }))
}
