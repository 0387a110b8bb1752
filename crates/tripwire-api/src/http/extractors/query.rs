//! Query parameter extractors for list endpoints.

use serde::Deserialize;

/// Query parameters for execution history endpoints.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionListQuery {
    /// Maximum results (default 50, clamped to 1..=500).
    pub limit: Option<u32>,
    /// Restrict to one agent. Ignored on agent-scoped routes.
    pub agent_id: Option<String>,
}
