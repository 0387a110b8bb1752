use thiserror::Error;

/// Errors related to agent management.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent not found")]
    NotFound,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    StorageError(String),
}

/// Failure of a single action. Captured into its `ActionResult`, never
/// propagated past the trigger pipeline.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("action '{0}' not found on agent")]
    NotFound(String),

    #[error("action limit exceeded ({limit} per trigger)")]
    LimitExceeded { limit: usize },

    #[error("invalid action configuration: {0}")]
    InvalidConfig(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Failed(String),
}

/// Errors from repository operations (used by trait definitions in tripwire-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_error_display() {
        let err = AgentError::Validation("name cannot be empty".to_string());
        assert_eq!(err.to_string(), "validation failed: name cannot be empty");
    }

    #[test]
    fn test_action_error_display() {
        let err = ActionError::Upstream {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("bad gateway"));
    }

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }
}
