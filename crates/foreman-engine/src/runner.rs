//! Agent runner contract.
//!
//! The runner — the component that actually streams an LLM conversation
//! and dispatches tool calls — lives outside the core. This module pins
//! down the contract the engine relies on:
//!
//! - Every streamed message MUST be fed to the session's shared
//!   [`CostTracker`] via `process_message`.
//! - Before each new turn the runner MUST consult `check_context_health`
//!   and `enforce_plan_requirement`; a [`CostError::ContextBudget`] is a
//!   clean stop (`success = false`), not a crash, and a budget trip stops
//!   the stream at the next message boundary.
//! - Tool calls are dispatched only against names whose schema has been
//!   loaded from the session's registry; unknown names fail with a
//!   tool-not-found error, never silently.
//!
//! [`CostTracker`]: foreman_cost::CostTracker
//! [`CostError::ContextBudget`]: foreman_cost::CostError

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use foreman_context::SessionContext;
use foreman_cost::CostSummary;

/// Result of one agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    /// Whether the agent completed its objective.
    pub success: bool,
    /// Session id the run executed under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Structured output the agent produced, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_output: Option<serde_json::Value>,
    /// Final cost summary from the session's tracker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_summary: Option<CostSummary>,
    /// Cost of the run in USD.
    pub cost_usd: f64,
}

impl AgentResult {
    /// A failed result with an error message.
    pub fn failed(session_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            session_id: Some(session_id.into()),
            error: Some(error.into()),
            structured_output: None,
            cost_summary: None,
            cost_usd: 0.0,
        }
    }
}

/// Streams LLM conversations and dispatches tool calls for a session.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Run an agent against a prepared session until it completes, fails,
    /// or is stopped by a budget gate.
    async fn run_agent(
        &self,
        agent_id: &str,
        objective: &str,
        session: &mut SessionContext,
    ) -> AgentResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result() {
        let result = AgentResult::failed("sess-1", "budget exceeded");
        assert!(!result.success);
        assert_eq!(result.session_id.as_deref(), Some("sess-1"));
        assert_eq!(result.error.as_deref(), Some("budget exceeded"));
        assert_eq!(result.cost_usd, 0.0);
    }

    #[test]
    fn test_result_serde_omits_absent_fields() {
        let json = serde_json::to_string(&AgentResult::failed("s", "e")).unwrap();
        assert!(!json.contains("structured_output"));
        assert!(!json.contains("cost_summary"));
    }
}
