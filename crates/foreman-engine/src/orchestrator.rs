//! Session orchestration.
//!
//! Turns a prompt (plus an optional ticket id) into a ready-to-run
//! [`SessionContext`]: resolve the repository (discovery → prompt
//! extraction → router), load project config, ensure the memory bank,
//! build the tool registry, pin every external client to the repo binding,
//! and expose only the four meta-tools.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use foreman_config::{RepoConfig, RepoRegistry, ensure_memory_path, load_project_config};
use foreman_context::{
    ContextCompactor, ContextFirewall, IsolationLevel, ServiceClients, SessionContext,
};
use foreman_cost::{CostTracker, SharedCostTracker, shared_tracker};
use foreman_tools::{META_TOOL_NAMES, ToolDefinition, ToolRegistry, shared_registry};

use crate::discovery::{RepoDiscovery, extract_repo_name};
use crate::error::{EngineError, Result};
use crate::router::RepoRouter;
use crate::workflow::RpiWorkflow;

/// A registry shared between the orchestrator, the router, and discovery
/// auto-registration.
pub type SharedRepoRegistry = Arc<RwLock<RepoRegistry>>;

/// Wrap a registry for sharing.
pub fn shared_repo_registry(registry: RepoRegistry) -> SharedRepoRegistry {
    Arc::new(RwLock::new(registry))
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Options
// ─────────────────────────────────────────────────────────────────────────────

/// Options controlling session preparation and workflow construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Model id used for pricing and agent settings.
    pub model_profile: String,
    /// Whether to try ticket/prompt discovery before the router.
    pub enable_discovery: bool,
    /// Money cap per session, when set.
    pub budget_usd: Option<f64>,
    /// Context window size.
    pub max_tokens: u64,
    /// Maximum conversation turns for the root session.
    pub max_turns: u32,
    /// TDD loop iterations.
    pub max_retries: u32,
    /// Firewall fan-out cap.
    pub max_active_contexts: usize,
    /// Default shell command for test runs.
    pub test_command: String,
    /// Compactor relevance threshold.
    pub min_relevance: f64,
    /// Compactor retention cap.
    pub max_findings: usize,
    /// Fork isolation discipline.
    pub isolation_level: IsolationLevel,
    /// Root under which repository `local_path`s are resolved.
    pub project_root: PathBuf,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            model_profile: "claude-sonnet-4-20250514".to_string(),
            enable_discovery: true,
            budget_usd: None,
            max_tokens: 200_000,
            max_turns: 50,
            max_retries: 5,
            max_active_contexts: 10,
            test_command: "make test".to_string(),
            min_relevance: 0.5,
            max_findings: 100,
            isolation_level: IsolationLevel::Full,
            project_root: PathBuf::from("."),
        }
    }
}

/// Summary row for listing registered repositories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoListing {
    pub id: String,
    pub description: String,
    pub github_url: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Context Orchestrator
// ─────────────────────────────────────────────────────────────────────────────

/// Orchestrates context preparation for multi-repository agent sessions.
///
/// Coordinates the registry (data), the router (decision), and session
/// assembly (configuration): user input → routed repository → prepared
/// session with tools and context.
pub struct ContextOrchestrator {
    registry: SharedRepoRegistry,
    router: Option<RepoRouter>,
    discovery: Option<Arc<dyn RepoDiscovery>>,
    clients: ServiceClients,
    options: SessionOptions,
}

impl ContextOrchestrator {
    /// Create an orchestrator over a shared registry.
    pub fn new(registry: SharedRepoRegistry, options: SessionOptions) -> Self {
        Self {
            registry,
            router: None,
            discovery: None,
            clients: ServiceClients::default(),
            options,
        }
    }

    /// Attach an LLM router for prompt classification.
    pub fn with_router(mut self, router: RepoRouter) -> Self {
        self.router = Some(router);
        self
    }

    /// Attach a discovery source.
    pub fn with_discovery(mut self, discovery: Arc<dyn RepoDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// Attach external service clients.
    pub fn with_clients(mut self, clients: ServiceClients) -> Self {
        self.clients = clients;
        self
    }

    /// The options this orchestrator was configured with.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Prepare a complete session context for a prompt.
    pub async fn prepare_session(
        &self,
        user_prompt: &str,
        ticket_id: Option<&str>,
    ) -> Result<SessionContext> {
        let repo = self.resolve_repo(user_prompt, ticket_id).await?;
        self.assemble_session(repo, ticket_id).await
    }

    /// Prepare a session for a specific repository, bypassing routing.
    pub async fn prepare_session_for_repo(&self, repo_id: &str) -> Result<SessionContext> {
        let repo = {
            let registry = self.registry.read().await;
            registry.get(repo_id)?.clone()
        };
        self.assemble_session(repo, None).await
    }

    /// List all registered repositories.
    pub async fn list_repositories(&self) -> Vec<RepoListing> {
        let registry = self.registry.read().await;
        registry
            .all()
            .iter()
            .map(|repo| RepoListing {
                id: repo.id.clone(),
                description: if repo.description.chars().count() > 100 {
                    let truncated: String = repo.description.chars().take(100).collect();
                    format!("{truncated}...")
                } else {
                    repo.description.clone()
                },
                github_url: repo.github_url.clone(),
            })
            .collect()
    }

    /// Build an RPI workflow wired to this orchestrator's options for a
    /// prepared session, along with the session's shared cost tracker.
    pub fn build_workflow(&self, session: &SessionContext) -> (RpiWorkflow, SharedCostTracker) {
        let tracker = shared_tracker({
            let mut tracker =
                CostTracker::new(self.options.model_profile.as_str(), self.options.max_tokens)
                    .with_session_id(session.session_id.as_str());
            if let Some(budget) = self.options.budget_usd {
                tracker = tracker.with_budget(budget);
            }
            tracker
        });

        let compactor = ContextCompactor::new(self.options.max_findings, self.options.min_relevance)
            .with_test_command(self.options.test_command.as_str());
        let firewall = ContextFirewall::new(self.options.max_active_contexts);

        let workflow = RpiWorkflow::new(tracker.clone())
            .with_compactor(compactor)
            .with_firewall(firewall)
            .with_max_retries(self.options.max_retries)
            .with_test_command(self.options.test_command.as_str());

        (workflow, tracker)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Repository resolution
    // ─────────────────────────────────────────────────────────────────────

    async fn resolve_repo(&self, user_prompt: &str, ticket_id: Option<&str>) -> Result<RepoConfig> {
        // Step 1: discovery, when enabled.
        if self.options.enable_discovery {
            if let Some(repo) = self.try_discovery(user_prompt, ticket_id).await {
                return Ok(repo);
            }
        }

        // Step 2: the router decides.
        let Some(router) = &self.router else {
            return Err(EngineError::session("no router available for routing"));
        };
        let repo_id = router.route(user_prompt).await?;
        let registry = self.registry.read().await;
        Ok(registry.get(&repo_id)?.clone())
    }

    async fn try_discovery(&self, user_prompt: &str, ticket_id: Option<&str>) -> Option<RepoConfig> {
        // A ticket is the strongest signal.
        if let (Some(ticket), Some(discovery)) = (ticket_id, &self.discovery) {
            if let Some(repo) = discovery.discover_ticket(ticket).await {
                info!(ticket, repo_id = %repo.id, "Repository discovered from ticket");
                self.auto_register(&repo).await;
                return Some(repo);
            }
        }

        // Otherwise try to pull a repo name out of the prompt.
        let name = extract_repo_name(user_prompt)?;
        {
            let registry = self.registry.read().await;
            if let Ok(repo) = registry.get(&name) {
                debug!(repo_id = %name, "Repository named in prompt");
                return Some(repo.clone());
            }
        }
        if let Some(discovery) = &self.discovery {
            if let Some(repo) = discovery.discover_name(&name).await {
                info!(repo_id = %repo.id, "Repository discovered by name");
                self.auto_register(&repo).await;
                return Some(repo);
            }
        }
        None
    }

    async fn auto_register(&self, repo: &RepoConfig) {
        let mut registry = self.registry.write().await;
        if !registry.contains(&repo.id) {
            registry.register(repo.clone());
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session assembly
    // ─────────────────────────────────────────────────────────────────────

    async fn assemble_session(
        &self,
        repo: RepoConfig,
        ticket_id: Option<&str>,
    ) -> Result<SessionContext> {
        let target_dir = self.options.project_root.join(&repo.local_path);

        // Project config is optional; a missing file is normal.
        let project_config = match load_project_config(&target_dir) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Project config unreadable; continuing without");
                None
            }
        };

        let memory_path = ensure_memory_path(&target_dir, project_config.as_ref())?;

        // Build the tool registry: builtins, then client-contributed MCP
        // tools, then batch execution tools for repos that allow it.
        let mut tool_registry = ToolRegistry::new();
        for client in self.clients.tool_providers() {
            tool_registry.register_mcp_server(client.name(), &client.tools());
        }
        if repo.enable_code_execution {
            tool_registry.register(
                ToolDefinition::new(
                    "batch_process_files",
                    "Process multiple files with a single script (replaces N individual tool calls)",
                    foreman_tools::ToolCategory::Execution,
                )
                .with_path("execution/batch_process_files")
                .writable()
                .confirmed(),
            );
            tool_registry.register(ToolDefinition::new(
                "batch_search",
                "Search across multiple directories with a single execution",
                foreman_tools::ToolCategory::Execution,
            )
            .with_path("execution/batch_search"));
        }

        let repo = Arc::new(repo);
        let mut session = SessionContext::new(Arc::clone(&repo), memory_path.clone());
        if let Some(ticket) = ticket_id {
            session.repo_context.ticket_id = Some(ticket.to_string());
        }

        // Context injection: pin every external client to this repository
        // and branch so tool calls cannot drift.
        self.clients.inject_context(&session.repo_context);

        session.isolation_level = self.options.isolation_level;
        session.max_turns = self.options.max_turns;
        session.max_tokens = self.options.max_tokens;
        session.project_config = project_config.map(Arc::new);
        session.tool_registry = Some(shared_registry(tool_registry));
        session.clients = self.clients.clone();

        // Progressive disclosure: a fresh session exposes only the four
        // meta-tools; everything else is discovered on demand.
        session.tools = META_TOOL_NAMES.iter().map(|s| s.to_string()).collect();

        session.agent_settings = foreman_context::AgentSettings {
            cwd: target_dir,
            model: self.options.model_profile.clone(),
            allowed_tools: session.tools.clone(),
            memory_path,
            repo_id: repo.id.clone(),
            repo_branch: repo.branch.clone(),
        };

        info!(
            session = %session.session_id,
            repo_id = %repo.id,
            branch = %repo.branch,
            "Session prepared"
        );
        Ok(session)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
