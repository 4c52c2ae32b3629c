//! Per-task session contexts and isolated forking.
//!
//! A [`SessionContext`] bundles everything an agent needs to work against
//! one repository: the repo binding, resource limits, the shared tool
//! registry, and external clients. Forking produces a sub-session that
//! inherits configuration **by reference** but starts with a pristine
//! conversation: no history, no findings, no parent tool list beyond the
//! subset explicitly granted.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use foreman_config::{ProjectConfig, RepoConfig};
use foreman_tools::SharedToolRegistry;

use crate::clients::{RepoContext, ServiceClients};

/// Default turn cap for sub-agent forks.
pub const FORK_DEFAULT_MAX_TURNS: u32 = 10;

/// Default token budget for sub-agent forks.
pub const FORK_DEFAULT_MAX_TOKENS: u64 = 30_000;

// ─────────────────────────────────────────────────────────────────────────────
// Isolation Level
// ─────────────────────────────────────────────────────────────────────────────

/// How strongly a fork is insulated from its parent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationLevel {
    /// Complete firewall: nothing crosses back except the distilled result.
    #[default]
    Full,
    /// Reserved for future partial-sharing relaxations; treated as `Full`.
    Shared,
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent Settings
// ─────────────────────────────────────────────────────────────────────────────

/// Runner-facing configuration derived from the chosen model profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Working directory for the agent (the repo checkout).
    pub cwd: PathBuf,
    /// Model id the runner should use.
    pub model: String,
    /// Tool names the runner may dispatch.
    pub allowed_tools: Vec<String>,
    /// Memory-bank path for this repository.
    pub memory_path: PathBuf,
    /// Routed repository id.
    pub repo_id: String,
    /// Branch agents operate on.
    pub repo_branch: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Token Budget
// ─────────────────────────────────────────────────────────────────────────────

/// Raised when a session enters a turn past its token budget.
#[derive(Debug, Clone, thiserror::Error)]
#[error("session '{session_id}' consumed {consumed} of {max_tokens} tokens")]
pub struct TokenBudgetExceeded {
    pub session_id: String,
    pub consumed: u64,
    pub max_tokens: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Context
// ─────────────────────────────────────────────────────────────────────────────

/// The per-task execution envelope handed to the agent runner.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Unique session id.
    pub session_id: String,
    /// Parent session id, set on forks.
    pub parent_session_id: Option<String>,
    /// Whether this context is a sub-agent fork.
    pub is_subagent: bool,
    /// Isolation discipline for forks.
    pub isolation_level: IsolationLevel,

    /// The routed repository's configuration.
    pub repo: Arc<RepoConfig>,
    /// Routed repository id.
    pub repo_id: String,
    /// Repository binding injected into external clients.
    pub repo_context: RepoContext,

    /// Memory-bank path (shared with forks).
    pub memory_path: PathBuf,
    /// Project configuration from the target repo, when present.
    pub project_config: Option<Arc<ProjectConfig>>,
    /// The shared tool registry (never copied into forks).
    pub tool_registry: Option<SharedToolRegistry>,
    /// Tool names available in this context.
    pub tools: Vec<String>,
    /// External service clients (shared by reference with forks).
    pub clients: ServiceClients,
    /// Runner-facing configuration.
    pub agent_settings: AgentSettings,

    /// Maximum conversation turns.
    pub max_turns: u32,
    /// Token budget for this context.
    pub max_tokens: u64,
    /// Tokens consumed so far.
    pub tokens_consumed: u64,
}

impl SessionContext {
    /// Create a root session for a repository.
    pub fn new(repo: Arc<RepoConfig>, memory_path: impl Into<PathBuf>) -> Self {
        let repo_id = repo.id.clone();
        let repo_context = RepoContext {
            repo_url: Some(repo.github_url.clone()),
            repo_owner: repo.owner().map(String::from),
            repo_name: repo.name().map(String::from),
            branch: Some(repo.branch.clone()),
            ticket_id: None,
        };
        Self {
            session_id: Uuid::new_v4().to_string(),
            parent_session_id: None,
            is_subagent: false,
            isolation_level: IsolationLevel::Full,
            repo,
            repo_id,
            repo_context,
            memory_path: memory_path.into(),
            project_config: None,
            tool_registry: None,
            tools: Vec::new(),
            clients: ServiceClients::default(),
            agent_settings: AgentSettings::default(),
            max_turns: 50,
            max_tokens: 200_000,
            tokens_consumed: 0,
        }
    }

    /// Bind an external ticket id to this session.
    pub fn with_ticket(mut self, ticket_id: impl Into<String>) -> Self {
        self.repo_context.ticket_id = Some(ticket_id.into());
        self
    }

    /// The working directory for agents in this session.
    pub fn cwd(&self) -> &PathBuf {
        &self.agent_settings.cwd
    }

    /// Record tokens consumed by this context.
    pub fn record_tokens(&mut self, tokens: u64) {
        self.tokens_consumed += tokens;
    }

    /// Check the token budget on entry to a new turn.
    ///
    /// The invariant `tokens_consumed <= max_tokens` must hold before any
    /// new turn starts; a breach is a context-budget failure.
    pub fn check_token_budget(&self) -> Result<(), TokenBudgetExceeded> {
        if self.tokens_consumed > self.max_tokens {
            return Err(TokenBudgetExceeded {
                session_id: self.session_id.clone(),
                consumed: self.tokens_consumed,
                max_tokens: self.max_tokens,
            });
        }
        Ok(())
    }

    /// Create an isolated context fork for a sub-agent.
    ///
    /// The fork shares configuration with the parent — repo binding, memory
    /// bank, project config, tool registry, external clients — all by
    /// reference. It does **not** inherit conversation history, accumulated
    /// findings, or the parent's tool list: only the parent tools named in
    /// `tools` are granted, and resource counters start fresh. The context
    /// tax of exploration is paid by the fork; only a distilled summary
    /// crosses back through the firewall.
    pub fn create_isolated_fork(
        &self,
        objective: &str,
        tools: &[String],
        max_turns: u32,
        max_tokens: u64,
    ) -> SessionContext {
        let parent_label = if self.session_id.is_empty() {
            "main"
        } else {
            self.session_id.as_str()
        };
        let fork_id = format!(
            "{}-sub-{}",
            parent_label,
            &Uuid::new_v4().simple().to_string()[..8]
        );

        // Principle of least privilege: only the granted subset of the
        // parent's tools survives the fork.
        let filtered_tools: Vec<String> = self
            .tools
            .iter()
            .filter(|name| tools.contains(name))
            .cloned()
            .collect();

        debug!(
            parent = %self.session_id,
            fork = %fork_id,
            objective,
            tools = filtered_tools.len(),
            "Creating isolated fork"
        );

        SessionContext {
            session_id: fork_id,
            parent_session_id: Some(self.session_id.clone()),
            is_subagent: true,
            isolation_level: IsolationLevel::Full,

            repo: Arc::clone(&self.repo),
            repo_id: self.repo_id.clone(),
            repo_context: self.repo_context.clone(),

            memory_path: self.memory_path.clone(),
            project_config: self.project_config.clone(),
            tool_registry: self.tool_registry.clone(),
            tools: filtered_tools,
            clients: self.clients.clone(),
            agent_settings: self.agent_settings.clone(),

            max_turns,
            max_tokens,
            tokens_consumed: 0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
