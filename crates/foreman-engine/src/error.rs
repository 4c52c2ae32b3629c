//! Engine error types.

use foreman_config::ConfigError;
use foreman_context::FirewallError;
use foreman_cost::CostError;

use crate::router::RoutingError;

/// Result type alias using the engine error type.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the orchestrator and workflow engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Routing failed and no fallback resolved a repository.
    #[error("routing error: {0}")]
    Routing(#[from] RoutingError),

    /// Session assembly failed.
    #[error("session error: {0}")]
    Session(String),

    /// Configuration loading failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Budget or context-health gate fired.
    #[error(transparent)]
    Cost(#[from] CostError),

    /// Firewall operation failed.
    #[error(transparent)]
    Firewall(#[from] FirewallError),

    /// The workflow was cancelled cooperatively.
    #[error("task cancelled")]
    Cancelled,
}

impl EngineError {
    /// Create a session error.
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_display() {
        let err = EngineError::session("no router available");
        assert!(err.to_string().contains("Session error") || err.to_string().contains("session error"));
        assert!(err.to_string().contains("no router available"));
    }

    #[test]
    fn test_cost_error_transparent() {
        let err: EngineError = CostError::ContextBudget("context is critical".to_string()).into();
        assert!(err.to_string().contains("context is critical"));
    }
}
