//! External-service client seams.
//!
//! The orchestration core never speaks HTTP itself. GitHub, ticket, and
//! code-navigation services are collaborators behind [`ServiceClient`];
//! the sandboxed container runtime sits behind [`CodeExecutor`]. Absence
//! of any client is non-fatal and simply means fewer registered tools.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use foreman_tools::McpToolSpec;
use foreman_types::ExecutionOutput;

// ─────────────────────────────────────────────────────────────────────────────
// Repo Context
// ─────────────────────────────────────────────────────────────────────────────

/// Repository binding injected into every external client.
///
/// Pinning the clients to the routed repository and branch means tool calls
/// cannot drift to a different repo than the one the session was prepared
/// for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoContext {
    /// Full repository URL.
    pub repo_url: Option<String>,
    /// Repository owner.
    pub repo_owner: Option<String>,
    /// Repository name.
    pub repo_name: Option<String>,
    /// Branch agents operate on.
    pub branch: Option<String>,
    /// External ticket id bound to the session, if any.
    pub ticket_id: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Service Client
// ─────────────────────────────────────────────────────────────────────────────

/// An external service exposing tools to agent sessions.
///
/// Implementations (GitHub, ticketing, code navigation) live outside the
/// core; only this surface crosses the boundary.
pub trait ServiceClient: Send + Sync {
    /// Server name used for MCP tool paths (`servers/<name>/...`).
    fn name(&self) -> &str;

    /// Pin the client to a repository context.
    fn set_context(&self, context: &RepoContext);

    /// Tools this client contributes to the registry.
    fn tools(&self) -> Vec<McpToolSpec>;
}

/// Sandboxed script execution, provided by the container runtime.
///
/// The runtime's lifecycle is a black box; the core only sees this
/// contract.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Run a script in the given language, returning its captured output.
    async fn run(&self, script: &str, lang: &str) -> ExecutionOutput;
}

// ─────────────────────────────────────────────────────────────────────────────
// Client Bundle
// ─────────────────────────────────────────────────────────────────────────────

/// The optional external clients attached to a session.
///
/// Forks share these by reference; completing a fork never tears a client
/// down.
#[derive(Clone, Default)]
pub struct ServiceClients {
    /// Repository host client (pull requests, commits).
    pub github: Option<Arc<dyn ServiceClient>>,
    /// Ticketing client.
    pub ticketing: Option<Arc<dyn ServiceClient>>,
    /// Structural code-navigation client.
    pub navigation: Option<Arc<dyn ServiceClient>>,
    /// Sandboxed code executor, present only when the repository allows it.
    pub executor: Option<Arc<dyn CodeExecutor>>,
}

impl std::fmt::Debug for ServiceClients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClients")
            .field("github", &self.github.is_some())
            .field("ticketing", &self.ticketing.is_some())
            .field("navigation", &self.navigation.is_some())
            .field("executor", &self.executor.is_some())
            .finish()
    }
}

impl ServiceClients {
    /// Fan a repository context out to every present client.
    pub fn inject_context(&self, context: &RepoContext) {
        for client in [&self.github, &self.ticketing, &self.navigation]
            .into_iter()
            .flatten()
        {
            client.set_context(context);
        }
    }

    /// The present tool-contributing clients.
    pub fn tool_providers(&self) -> Vec<&Arc<dyn ServiceClient>> {
        [&self.github, &self.ticketing, &self.navigation]
            .into_iter()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingClient {
        name: String,
        contexts: Mutex<Vec<RepoContext>>,
    }

    impl RecordingClient {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                contexts: Mutex::new(Vec::new()),
            })
        }
    }

    impl ServiceClient for RecordingClient {
        fn name(&self) -> &str {
            &self.name
        }

        fn set_context(&self, context: &RepoContext) {
            self.contexts.lock().unwrap().push(context.clone());
        }

        fn tools(&self) -> Vec<McpToolSpec> {
            vec![McpToolSpec {
                name: format!("{}_tool", self.name),
                description: String::new(),
                input_schema: None,
            }]
        }
    }

    #[test]
    fn test_inject_context_reaches_all_clients() {
        let github = RecordingClient::new("github");
        let nav = RecordingClient::new("navigation");
        let clients = ServiceClients {
            github: Some(github.clone()),
            ticketing: None,
            navigation: Some(nav.clone()),
            executor: None,
        };

        let context = RepoContext {
            repo_url: Some("https://github.com/acme/svc".to_string()),
            repo_owner: Some("acme".to_string()),
            repo_name: Some("svc".to_string()),
            branch: Some("main".to_string()),
            ticket_id: None,
        };
        clients.inject_context(&context);

        assert_eq!(github.contexts.lock().unwrap().len(), 1);
        assert_eq!(nav.contexts.lock().unwrap()[0].repo_owner.as_deref(), Some("acme"));
    }

    #[test]
    fn test_tool_providers_skips_absent() {
        let clients = ServiceClients {
            github: Some(RecordingClient::new("github")),
            ..Default::default()
        };
        assert_eq!(clients.tool_providers().len(), 1);
    }
}
