//! The context firewall.
//!
//! Tracks live sub-agent forks, bounds their fan-out, and finalises them.
//! Completion is the kill switch: the fork's operational state is dropped
//! and only the fields explicitly passed in the report — summary, findings,
//! file references — ever reach the parent context.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use foreman_types::{FirewallResult, estimate_tokens};

use crate::session::{
    FORK_DEFAULT_MAX_TOKENS, FORK_DEFAULT_MAX_TURNS, SessionContext,
};

/// Default cap on simultaneously live forks.
pub const DEFAULT_MAX_ACTIVE_CONTEXTS: usize = 10;

/// Result type alias for firewall operations.
pub type Result<T> = std::result::Result<T, FirewallError>;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised by firewall operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FirewallError {
    /// Fan-out cap reached.
    #[error(
        "maximum active contexts ({max}) exceeded; complete or cancel existing sub-agent contexts first"
    )]
    CapacityExceeded { max: usize },

    /// Attempted to track a context that is not a sub-agent fork.
    #[error("can only track sub-agent forks")]
    NotSubagent,

    /// The named fork is not active.
    #[error("fork '{0}' not found in active forks")]
    UnknownFork(String),

    /// The session id was already completed or cancelled.
    #[error("fork '{0}' was already finalised; create a new isolated context instead")]
    ForkRetired(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Fork Report
// ─────────────────────────────────────────────────────────────────────────────

/// What a finished sub-agent hands back for distillation.
///
/// Only these fields cross the firewall; everything else the fork
/// accumulated dies with it.
#[derive(Debug, Clone, Default)]
pub struct ForkReport {
    /// Distilled summary for the parent context.
    pub summary: String,
    /// Key findings worth surfacing individually.
    pub findings: Vec<String>,
    /// `file:line` references backing the findings.
    pub file_references: Vec<String>,
    /// Named artifacts (e.g. code snippets) to pass back.
    pub artifacts: HashMap<String, String>,
    /// Tokens the sub-agent consumed.
    pub tokens_consumed: u64,
    /// Conversation turns the sub-agent used.
    pub turns_used: u32,
    /// Error message when execution failed.
    pub error: Option<String>,
}

impl ForkReport {
    /// Create a report with just a summary.
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Default::default()
        }
    }

    /// Attach key findings.
    pub fn with_findings(mut self, findings: Vec<String>) -> Self {
        self.findings = findings;
        self
    }

    /// Attach file references.
    pub fn with_file_references(mut self, references: Vec<String>) -> Self {
        self.file_references = references;
        self
    }

    /// Record tokens consumed.
    pub fn with_tokens_consumed(mut self, tokens: u64) -> Self {
        self.tokens_consumed = tokens;
        self
    }

    /// Record turns used.
    pub fn with_turns_used(mut self, turns: u32) -> Self {
        self.turns_used = turns;
        self
    }

    /// Mark the execution as failed.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Callbacks
// ─────────────────────────────────────────────────────────────────────────────

/// Invoked when a fork is registered.
pub type ContextCreatedCallback = Box<dyn Fn(&SessionContext) + Send + Sync>;

/// Invoked when a fork is completed.
pub type ContextCompletedCallback = Box<dyn Fn(&FirewallResult) + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// Context Firewall
// ─────────────────────────────────────────────────────────────────────────────

/// Manages isolated context forks for sub-agents.
pub struct ContextFirewall {
    max_active_contexts: usize,
    active_forks: HashMap<String, SessionContext>,
    completed_results: HashMap<String, FirewallResult>,
    retired: HashSet<String>,
    on_context_created: Option<ContextCreatedCallback>,
    on_context_completed: Option<ContextCompletedCallback>,
}

impl std::fmt::Debug for ContextFirewall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextFirewall")
            .field("max_active_contexts", &self.max_active_contexts)
            .field("active_forks", &self.active_forks.len())
            .field("completed_results", &self.completed_results.len())
            .finish()
    }
}

impl Default for ContextFirewall {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ACTIVE_CONTEXTS)
    }
}

impl ContextFirewall {
    /// Create a firewall with the given fan-out cap.
    pub fn new(max_active_contexts: usize) -> Self {
        Self {
            max_active_contexts,
            active_forks: HashMap::new(),
            completed_results: HashMap::new(),
            retired: HashSet::new(),
            on_context_created: None,
            on_context_completed: None,
        }
    }

    /// Set the fork-created callback.
    pub fn on_context_created(&mut self, callback: ContextCreatedCallback) {
        self.on_context_created = Some(callback);
    }

    /// Set the fork-completed callback.
    pub fn on_context_completed(&mut self, callback: ContextCompletedCallback) {
        self.on_context_completed = Some(callback);
    }

    /// Track a fork created by [`SessionContext::create_isolated_fork`].
    ///
    /// Rejects non-sub-agent contexts, finalised session ids, and anything
    /// past the fan-out cap. Existing forks are unaffected by a rejection.
    pub fn track_fork(&mut self, fork: SessionContext) -> Result<()> {
        if !fork.is_subagent {
            return Err(FirewallError::NotSubagent);
        }
        if self.retired.contains(&fork.session_id) {
            return Err(FirewallError::ForkRetired(fork.session_id));
        }
        if self.active_forks.len() >= self.max_active_contexts {
            return Err(FirewallError::CapacityExceeded {
                max: self.max_active_contexts,
            });
        }

        debug!(fork = %fork.session_id, active = self.active_forks.len() + 1, "Fork tracked");
        if let Some(callback) = &self.on_context_created {
            callback(&fork);
        }
        self.active_forks.insert(fork.session_id.clone(), fork);
        Ok(())
    }

    /// Fork a parent session and track the fork in one step.
    pub fn create_isolated_context(
        &mut self,
        parent: &SessionContext,
        objective: &str,
        allowed_tools: &[String],
        max_tokens: u64,
        max_turns: u32,
    ) -> Result<SessionContext> {
        let fork = parent.create_isolated_fork(objective, allowed_tools, max_turns, max_tokens);
        self.track_fork(fork.clone())?;
        Ok(fork)
    }

    /// Fork with the default sub-agent limits.
    pub fn create_default_context(
        &mut self,
        parent: &SessionContext,
        objective: &str,
        allowed_tools: &[String],
    ) -> Result<SessionContext> {
        self.create_isolated_context(
            parent,
            objective,
            allowed_tools,
            FORK_DEFAULT_MAX_TOKENS,
            FORK_DEFAULT_MAX_TURNS,
        )
    }

    /// Complete an active fork — the kill switch.
    ///
    /// The fork is removed from the active set and its operational state
    /// dropped. The returned [`FirewallResult`] carries only the distilled
    /// report fields; `tokens_returned` is estimated from the summary,
    /// findings, and references crossing back.
    pub fn complete_context(&mut self, session_id: &str, report: ForkReport) -> Result<FirewallResult> {
        // Kill switch: the fork's state dies here.
        let fork = self
            .active_forks
            .remove(session_id)
            .ok_or_else(|| FirewallError::UnknownFork(session_id.to_string()))?;
        drop(fork);
        self.retired.insert(session_id.to_string());

        let mut tokens_returned = estimate_tokens(&report.summary);
        for finding in &report.findings {
            tokens_returned += estimate_tokens(finding);
        }
        for reference in &report.file_references {
            tokens_returned += estimate_tokens(reference);
        }

        let result = FirewallResult {
            success: report.error.is_none(),
            context_id: session_id.to_string(),
            summary: report.summary,
            key_findings: report.findings,
            file_references: report.file_references,
            tokens_consumed: report.tokens_consumed,
            tokens_returned: tokens_returned as u64,
            turns_used: report.turns_used,
            error: report.error,
        };

        debug!(
            fork = session_id,
            tokens_consumed = result.tokens_consumed,
            tokens_returned = result.tokens_returned,
            success = result.success,
            "Fork completed"
        );

        if let Some(callback) = &self.on_context_completed {
            callback(&result);
        }
        self.completed_results
            .insert(session_id.to_string(), result.clone());
        Ok(result)
    }

    /// Drop an active fork without emitting a result.
    ///
    /// Returns whether a fork was actually cancelled.
    pub fn cancel_context(&mut self, session_id: &str) -> bool {
        if self.active_forks.remove(session_id).is_some() {
            self.retired.insert(session_id.to_string());
            warn!(fork = session_id, "Fork cancelled without result");
            true
        } else {
            false
        }
    }

    /// Get an active fork by session id.
    pub fn get_fork(&self, session_id: &str) -> Option<&SessionContext> {
        self.active_forks.get(session_id)
    }

    /// Get the result of a completed fork.
    pub fn get_result(&self, context_id: &str) -> Option<&FirewallResult> {
        self.completed_results.get(context_id)
    }

    /// All currently active forks.
    pub fn active_forks(&self) -> Vec<&SessionContext> {
        self.active_forks.values().collect()
    }

    /// Number of currently active forks.
    pub fn active_count(&self) -> usize {
        self.active_forks.len()
    }

    /// Format a completed fork's result for injection into the parent
    /// agent's context.
    pub fn summary_for_parent(&self, context_id: &str) -> Option<String> {
        let result = self.completed_results.get(context_id)?;

        let mut parts = vec![format!("## Sub-Agent Result: {context_id}")];
        parts.push(format!("\n{}", result.summary));

        if !result.key_findings.is_empty() {
            parts.push("\n### Findings:".to_string());
            for finding in &result.key_findings {
                parts.push(format!("- {finding}"));
            }
        }

        if !result.file_references.is_empty() {
            parts.push("\n### References:".to_string());
            for reference in &result.file_references {
                parts.push(format!("- `{reference}`"));
            }
        }

        Some(parts.join("\n"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
