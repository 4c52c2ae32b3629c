//! LLM-backed repository routing.
//!
//! The router builds a deterministic classification prompt listing every
//! registered repository and asks the backend to return **only** an id (or
//! the literal `UNKNOWN`). Low temperature and a tiny output budget keep
//! the call cheap and stable.

use tracing::{debug, warn};

use crate::backend::{CompletionRequest, SharedBackend};
use crate::orchestrator::SharedRepoRegistry;

/// Default model used for routing classification.
pub const DEFAULT_ROUTER_MODEL: &str = "claude-3-haiku-20240307";

/// Output budget for the routing call; a repo id is short.
const ROUTING_MAX_TOKENS: u32 = 50;

/// Temperature for deterministic routing.
const ROUTING_TEMPERATURE: f32 = 0.1;

/// Result type alias for routing operations.
pub type Result<T> = std::result::Result<T, RoutingError>;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised while routing a prompt to a repository.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RoutingError {
    /// The user prompt was empty.
    #[error("user prompt cannot be empty")]
    EmptyPrompt,

    /// The backend call failed.
    #[error("backend error during routing: {0}")]
    Backend(String),

    /// The backend returned no usable text.
    #[error("empty response from routing LLM")]
    EmptyResponse,

    /// The backend could not match the task to any repository.
    #[error("could not match task to any repository. Task: '{0}'")]
    Unmatched(String),

    /// The backend returned an id that is not registered.
    #[error("invalid repository id '{id}' returned by router. Valid ids: {valid}")]
    InvalidRepoId { id: String, valid: String },
}

// ─────────────────────────────────────────────────────────────────────────────
// Repo Router
// ─────────────────────────────────────────────────────────────────────────────

/// Routes user prompts to repositories via LLM classification.
pub struct RepoRouter {
    registry: SharedRepoRegistry,
    backend: SharedBackend,
    model: String,
}

impl RepoRouter {
    /// Create a router over the given registry and backend.
    pub fn new(registry: SharedRepoRegistry, backend: SharedBackend) -> Self {
        Self {
            registry,
            backend,
            model: DEFAULT_ROUTER_MODEL.to_string(),
        }
    }

    /// Override the routing model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Build the classification prompt for a user task.
    async fn build_routing_prompt(&self, user_prompt: &str) -> String {
        let registry = self.registry.read().await;
        let repo_descriptions = registry
            .all()
            .iter()
            .map(|repo| format!("- **{}**: {}", repo.id, repo.description.trim()))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are a repository routing assistant. Your task is to analyze the user's request \
             and determine which repository is the best match.\n\n\
             ## Available Repositories:\n{repo_descriptions}\n\n\
             ## User's Task:\n\"{user_prompt}\"\n\n\
             ## Instructions:\n\
             1. Analyze the user's task and match it to the most relevant repository.\n\
             2. Consider keywords, technical stack, and the nature of the work described.\n\
             3. Return ONLY the repository ID that best matches the task.\n\
             4. If the task clearly doesn't match any repository, return \"UNKNOWN\".\n\n\
             ## Response Format:\n\
             Return only the repository ID (e.g., \"auth-service\" or \"frontend-dashboard\"). \
             No explanation needed."
        )
    }

    /// Route a user prompt to a repository id.
    pub async fn route(&self, user_prompt: &str) -> Result<String> {
        if user_prompt.trim().is_empty() {
            return Err(RoutingError::EmptyPrompt);
        }

        let routing_prompt = self.build_routing_prompt(user_prompt).await;
        let request = CompletionRequest::new(self.model.as_str(), routing_prompt, ROUTING_MAX_TOKENS)
            .with_temperature(ROUTING_TEMPERATURE);

        let response = self
            .backend
            .complete(request)
            .await
            .map_err(|e| RoutingError::Backend(e.to_string()))?;

        if response.text.trim().is_empty() {
            return Err(RoutingError::EmptyResponse);
        }

        // Strip quotes and markdown, keep the first line only.
        let repo_id = response
            .text
            .trim()
            .trim_matches('"')
            .trim_matches('\'')
            .lines()
            .next()
            .unwrap_or("")
            .trim()
            .to_string();

        if repo_id.eq_ignore_ascii_case("UNKNOWN") {
            let preview: String = user_prompt.chars().take(100).collect();
            return Err(RoutingError::Unmatched(preview));
        }

        let registry = self.registry.read().await;
        if registry.contains(&repo_id) {
            debug!(repo_id = %repo_id, "Routed prompt to repository");
            return Ok(repo_id);
        }

        // Rescue: the response may wrap a valid id in extra text.
        let repo_id_lower = repo_id.to_lowercase();
        for valid_id in registry.ids() {
            if repo_id_lower.contains(&valid_id.to_lowercase()) {
                warn!(raw = %repo_id, rescued = %valid_id, "Rescued repo id from router response");
                return Ok(valid_id);
            }
        }

        Err(RoutingError::InvalidRepoId {
            id: repo_id,
            valid: registry.ids().join(", "),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CompletionResponse, MockBackend};
    use crate::orchestrator::shared_repo_registry;
    use foreman_config::{RepoConfig, RepoRegistry};
    use foreman_types::TokenUsage;
    use std::sync::Arc;

    fn test_registry() -> SharedRepoRegistry {
        shared_repo_registry(RepoRegistry::from_configs([
            RepoConfig::new(
                "auth-service",
                "Authentication and session management",
                "https://github.com/acme/auth-service",
            ),
            RepoConfig::new(
                "frontend-dashboard",
                "Customer-facing dashboard",
                "https://github.com/acme/frontend-dashboard",
            ),
        ]))
    }

    fn router_with_response(text: &str) -> (RepoRouter, Arc<MockBackend>) {
        let backend = Arc::new(MockBackend::with_text(text));
        let router = RepoRouter::new(test_registry(), backend.clone());
        (router, backend)
    }

    #[tokio::test]
    async fn test_route_valid_id() {
        let (router, backend) = router_with_response("auth-service");
        let repo_id = router.route("Fix the login token refresh").await.unwrap();
        assert_eq!(repo_id, "auth-service");

        // The routing prompt carries the stable contract pieces.
        let prompt = backend.requests()[0].prompt.clone();
        assert!(prompt.contains("## Available Repositories:"));
        assert!(prompt.contains("- **auth-service**: Authentication and session management"));
        assert!(prompt.contains("\"Fix the login token refresh\""));
        assert!(prompt.contains("Return ONLY the repository ID"));
        assert_eq!(backend.requests()[0].max_tokens, 50);
        assert_eq!(backend.requests()[0].temperature, Some(0.1));
    }

    #[tokio::test]
    async fn test_route_strips_quotes_and_extra_lines() {
        let (router, _) = router_with_response("\"auth-service\"\nBecause it handles login.");
        let repo_id = router.route("Fix login").await.unwrap();
        assert_eq!(repo_id, "auth-service");
    }

    #[tokio::test]
    async fn test_route_empty_prompt() {
        let (router, _) = router_with_response("auth-service");
        let err = router.route("   ").await.unwrap_err();
        assert!(matches!(err, RoutingError::EmptyPrompt));
    }

    #[tokio::test]
    async fn test_route_unknown() {
        let (router, _) = router_with_response("UNKNOWN");
        let err = router.route("Order a pizza").await.unwrap_err();
        assert!(matches!(err, RoutingError::Unmatched(_)));
    }

    #[tokio::test]
    async fn test_route_substring_rescue() {
        let (router, _) = router_with_response("The best match is Auth-Service.");
        let repo_id = router.route("Fix login").await.unwrap();
        assert_eq!(repo_id, "auth-service");
    }

    #[tokio::test]
    async fn test_route_invalid_id() {
        let (router, _) = router_with_response("billing-api");
        let err = router.route("Fix billing").await.unwrap_err();
        match err {
            RoutingError::InvalidRepoId { id, valid } => {
                assert_eq!(id, "billing-api");
                assert!(valid.contains("auth-service"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_route_backend_failure() {
        let backend = Arc::new(MockBackend::new(vec![]));
        let router = RepoRouter::new(test_registry(), backend);
        let err = router.route("Fix login").await.unwrap_err();
        assert!(matches!(err, RoutingError::Backend(_)));
    }

    #[tokio::test]
    async fn test_route_empty_response() {
        let backend = Arc::new(MockBackend::new(vec![CompletionResponse::new(
            "1",
            "m",
            "   ",
            TokenUsage::new(1, 1),
        )]));
        let router = RepoRouter::new(test_registry(), backend);
        let err = router.route("Fix login").await.unwrap_err();
        assert!(matches!(err, RoutingError::EmptyResponse));
    }
}
