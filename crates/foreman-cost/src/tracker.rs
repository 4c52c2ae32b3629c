//! Per-session cost tracking and context-health gating.
//!
//! The tracker deduplicates usage by message id, treats the final result
//! message as authoritative, and classifies context-window utilization into
//! four health levels that gate further work.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use foreman_types::{AgentMessage, TokenUsage};

use crate::error::{CostError, Result};
use crate::pricing::ModelPricing;

/// Default context window size when none is configured.
pub const DEFAULT_MAX_TOKENS: u64 = 200_000;

/// Maximum retained health-history entries.
const HEALTH_HISTORY_CAP: usize = 256;

// ─────────────────────────────────────────────────────────────────────────────
// Context Health
// ─────────────────────────────────────────────────────────────────────────────

/// Health of the context window, derived from token utilization.
///
/// The bands gate work: past 85% utilization without a compacted plan, the
/// agent is in a low-signal regime and must stop to plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextHealth {
    /// Below 70% capacity.
    Healthy,
    /// 70–85% capacity; compaction is advisable.
    Warning,
    /// 85–95% capacity; a plan is required before implementation.
    Critical,
    /// 95%+ capacity; compaction is mandatory.
    Saturated,
}

impl ContextHealth {
    fn from_utilization(utilization: f64) -> Self {
        if utilization >= 0.95 {
            ContextHealth::Saturated
        } else if utilization >= 0.85 {
            ContextHealth::Critical
        } else if utilization >= 0.70 {
            ContextHealth::Warning
        } else {
            ContextHealth::Healthy
        }
    }

    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextHealth::Healthy => "healthy",
            ContextHealth::Warning => "warning",
            ContextHealth::Critical => "critical",
            ContextHealth::Saturated => "saturated",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Step Usage & Summary
// ─────────────────────────────────────────────────────────────────────────────

/// Usage recorded for a single assistant step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepUsage {
    /// Provider message id that produced this step.
    pub message_id: String,
    /// When the step was recorded.
    pub timestamp: DateTime<Utc>,
    /// Token counts for the step.
    pub usage: TokenUsage,
    /// Estimated cost of the step in USD.
    pub estimated_cost_usd: f64,
}

/// Snapshot of a tracker's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostSummary {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cache_read_tokens: u64,
    pub total_cache_creation_tokens: u64,
    pub estimated_cost_usd: f64,
    pub actual_cost_usd: Option<f64>,
    pub step_count: usize,
    pub budget_usd: Option<f64>,
    pub budget_exceeded: bool,
    pub budget_remaining_usd: Option<f64>,
    pub context_health: ContextHealth,
    pub max_tokens: u64,
    pub utilization: f64,
    /// Number of compactions applied to the working set.
    pub compaction_count: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Cost Tracker
// ─────────────────────────────────────────────────────────────────────────────

/// Tracks tokens, cost, and context health for one agent session.
///
/// All mutation goes through `&mut self`, so per-session serialisation is
/// enforced by ownership. Share across the runner and the engine via
/// [`SharedCostTracker`].
#[derive(Debug)]
pub struct CostTracker {
    budget_usd: Option<f64>,
    model: String,
    session_id: Option<String>,
    max_tokens: u64,
    pricing: ModelPricing,

    processed_ids: HashSet<String>,
    step_usages: Vec<StepUsage>,

    total_input_tokens: u64,
    total_output_tokens: u64,
    total_cache_read_tokens: u64,
    total_cache_creation_tokens: u64,
    estimated_cost_usd: f64,
    actual_cost_usd: Option<f64>,

    has_plan: bool,
    compaction_count: u32,
    health_history: VecDeque<ContextHealth>,
}

impl CostTracker {
    /// Create a tracker for the given model and context window.
    pub fn new(model: impl Into<String>, max_tokens: u64) -> Self {
        let model = model.into();
        let pricing = ModelPricing::for_model(&model);
        Self {
            budget_usd: None,
            model,
            session_id: None,
            max_tokens,
            pricing,
            processed_ids: HashSet::new(),
            step_usages: Vec::new(),
            total_input_tokens: 0,
            total_output_tokens: 0,
            total_cache_read_tokens: 0,
            total_cache_creation_tokens: 0,
            estimated_cost_usd: 0.0,
            actual_cost_usd: None,
            has_plan: false,
            compaction_count: 0,
            health_history: VecDeque::new(),
        }
    }

    /// Set the money cap for this session.
    pub fn with_budget(mut self, budget_usd: f64) -> Self {
        self.budget_usd = Some(budget_usd);
        self
    }

    /// Attach a session id for log correlation.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// The model this tracker prices against.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ingest one message from the agent stream.
    ///
    /// Result messages overwrite the token totals and cost with the
    /// provider's authoritative figures. Assistant steps are billed exactly
    /// once per message id; repeats and id-less messages are skipped.
    /// Returns the recorded step, if any.
    pub fn process_message(&mut self, message: &AgentMessage) -> Option<StepUsage> {
        match message {
            AgentMessage::Result {
                total_cost_usd: Some(cost),
                usage,
            } => {
                self.actual_cost_usd = Some(*cost);
                if let Some(usage) = usage {
                    self.total_input_tokens = usage.input_tokens;
                    self.total_output_tokens = usage.output_tokens;
                    self.total_cache_read_tokens = usage.cache_read_input_tokens;
                    self.total_cache_creation_tokens = usage.cache_creation_input_tokens;
                    self.estimated_cost_usd = self.cost_of(usage);
                }
                debug!(
                    session = self.session_id.as_deref().unwrap_or("-"),
                    actual_cost_usd = cost,
                    "Authoritative cost recorded"
                );
                None
            }
            AgentMessage::Assistant {
                id: Some(id),
                usage: Some(usage),
            } => {
                if !self.processed_ids.insert(id.clone()) {
                    return None;
                }

                let step_cost = self.cost_of(usage);
                let step = StepUsage {
                    message_id: id.clone(),
                    timestamp: Utc::now(),
                    usage: *usage,
                    estimated_cost_usd: step_cost,
                };

                self.total_input_tokens += usage.input_tokens;
                self.total_output_tokens += usage.output_tokens;
                self.total_cache_read_tokens += usage.cache_read_input_tokens;
                self.total_cache_creation_tokens += usage.cache_creation_input_tokens;
                self.estimated_cost_usd += step_cost;

                self.step_usages.push(step.clone());
                Some(step)
            }
            // Missing usage or id, result without a final cost, other
            // stream events: nothing to bill.
            _ => None,
        }
    }

    fn cost_of(&self, usage: &TokenUsage) -> f64 {
        self.pricing.cost(
            usage.input_tokens,
            usage.output_tokens,
            usage.cache_read_input_tokens,
            usage.cache_creation_input_tokens,
        )
    }

    /// Current cost: actual when known, estimated otherwise.
    pub fn current_cost(&self) -> f64 {
        self.actual_cost_usd.unwrap_or(self.estimated_cost_usd)
    }

    /// Whether the money cap has been reached.
    pub fn budget_exceeded(&self) -> bool {
        match self.budget_usd {
            Some(budget) => self.current_cost() >= budget,
            None => false,
        }
    }

    /// Remaining budget, or `None` when no cap is set.
    pub fn budget_remaining(&self) -> Option<f64> {
        self.budget_usd
            .map(|budget| (budget - self.current_cost()).max(0.0))
    }

    /// Total tokens across all four counters.
    pub fn total_tokens(&self) -> u64 {
        self.total_input_tokens
            + self.total_output_tokens
            + self.total_cache_read_tokens
            + self.total_cache_creation_tokens
    }

    /// Context-window utilization in `[0, ∞)`. Zero when `max_tokens` is 0.
    pub fn token_utilization(&self) -> f64 {
        if self.max_tokens == 0 {
            return 0.0;
        }
        self.total_tokens() as f64 / self.max_tokens as f64
    }

    /// Classify current utilization, appending to the health history.
    pub fn check_context_health(&mut self) -> ContextHealth {
        let health = ContextHealth::from_utilization(self.token_utilization());
        if self.health_history.len() >= HEALTH_HISTORY_CAP {
            self.health_history.pop_front();
        }
        self.health_history.push_back(health);
        health
    }

    /// The Dumb-Zone guard.
    ///
    /// In the `Critical`/`Saturated` band, implementation work requires a
    /// compacted plan: either the caller vouches for one or the tracker has
    /// been told one exists via [`CostTracker::set_has_plan`].
    pub fn enforce_plan_requirement(&mut self, has_plan: bool) -> Result<()> {
        let health = self.check_context_health();
        if matches!(health, ContextHealth::Critical | ContextHealth::Saturated)
            && !has_plan
            && !self.has_plan
        {
            let utilization = self.token_utilization();
            warn!(
                session = self.session_id.as_deref().unwrap_or("-"),
                health = health.as_str(),
                utilization,
                "Plan requirement violated"
            );
            return Err(CostError::ContextBudget(format!(
                "context is {} ({:.1}% full); cannot proceed to implementation without a plan. \
                 Run the planning phase to compact research findings first",
                health.as_str(),
                utilization * 100.0
            )));
        }
        Ok(())
    }

    /// Record that a compacted plan artefact now exists.
    pub fn set_has_plan(&mut self, has_plan: bool) {
        self.has_plan = has_plan;
    }

    /// Whether a plan artefact has been recorded.
    pub fn has_plan(&self) -> bool {
        self.has_plan
    }

    /// Record a context compaction.
    ///
    /// Models the compacted plan replacing raw research in the working set:
    /// input tokens drop by `tokens_saved` and cache-read tokens by half of
    /// it, both floored at zero.
    pub fn record_compaction(&mut self, tokens_saved: u64) {
        self.compaction_count += 1;
        self.total_input_tokens = self.total_input_tokens.saturating_sub(tokens_saved);
        self.total_cache_read_tokens = self
            .total_cache_read_tokens
            .saturating_sub(tokens_saved / 2);
        debug!(
            session = self.session_id.as_deref().unwrap_or("-"),
            tokens_saved,
            compactions = self.compaction_count,
            "Compaction recorded"
        );
    }

    /// Whether compaction is recommended (critical or saturated).
    pub fn should_compact(&mut self) -> bool {
        matches!(
            self.check_context_health(),
            ContextHealth::Critical | ContextHealth::Saturated
        )
    }

    /// Number of compactions recorded.
    pub fn compaction_count(&self) -> u32 {
        self.compaction_count
    }

    /// All recorded step usages.
    pub fn step_usages(&self) -> &[StepUsage] {
        &self.step_usages
    }

    /// Recorded health history, oldest first.
    pub fn health_history(&self) -> impl Iterator<Item = ContextHealth> + '_ {
        self.health_history.iter().copied()
    }

    /// Snapshot the tracker's state.
    pub fn summary(&mut self) -> CostSummary {
        let context_health = self.check_context_health();
        CostSummary {
            total_input_tokens: self.total_input_tokens,
            total_output_tokens: self.total_output_tokens,
            total_cache_read_tokens: self.total_cache_read_tokens,
            total_cache_creation_tokens: self.total_cache_creation_tokens,
            estimated_cost_usd: self.estimated_cost_usd,
            actual_cost_usd: self.actual_cost_usd,
            step_count: self.step_usages.len(),
            budget_usd: self.budget_usd,
            budget_exceeded: self.budget_exceeded(),
            budget_remaining_usd: self.budget_remaining(),
            context_health,
            max_tokens: self.max_tokens,
            utilization: self.token_utilization(),
            compaction_count: self.compaction_count,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared Tracker
// ─────────────────────────────────────────────────────────────────────────────

/// A tracker shared between the runner (message ingestion) and the engine
/// (budget/health gating). The mutex serialises message processing.
pub type SharedCostTracker = Arc<Mutex<CostTracker>>;

/// Wrap a tracker for sharing.
pub fn shared_tracker(tracker: CostTracker) -> SharedCostTracker {
    Arc::new(Mutex::new(tracker))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
