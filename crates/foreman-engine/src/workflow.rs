//! The Research → Plan → Implement workflow engine.
//!
//! A state machine enforcing the core discipline: code cannot be written
//! without a compacted plan, and the implement phase cannot return success
//! until tests pass.
//!
//! ```text
//! IDLE ──research_phase──▶ RESEARCH ──planning_phase──▶ PLANNING
//!         ▲                                               │
//!         │                                               ▼
//!      reset()                                       IMPLEMENT
//!                                                    │       │
//!                                          tests pass│       │retries exhausted
//!                                                    ▼       ▼
//!                                                COMPLETE   FAILED
//! ```
//!
//! Research fans out over firewalled sub-session forks; planning is the
//! compaction point; implementation is a bounded test-driven retry loop
//! that feeds failure output back to the fixer.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use foreman_context::{
    CompactionStrategy, ContextCompactor, ContextFirewall, ForkReport, SessionContext,
};
use foreman_cost::{CostError, SharedCostTracker};
use foreman_types::{
    FirewallResult, Plan, PlanStep, ResearchContext, ResearchFinding, TestResult,
};

use crate::error::{EngineError, Result};
use crate::exec::ShellTestRunner;

/// Default TDD loop iterations.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Token cost attributed to a simulated research task when no sub-agent
/// executor is injected (test mode).
const SIMULATED_TASK_TOKENS: u64 = 5_000;

/// Cap on error output fed back to the fixer.
const ERROR_CONTEXT_CAP: usize = 2_000;

// ─────────────────────────────────────────────────────────────────────────────
// State Machine
// ─────────────────────────────────────────────────────────────────────────────

/// State in the RPI workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RpiState {
    Idle,
    /// Divergent exploration; high context, messy.
    Research,
    /// The compaction point.
    Planning,
    /// The TDD loop.
    Implement,
    Complete,
    Failed,
}

/// A recorded state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: RpiState,
    pub to: RpiState,
    pub timestamp: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Results
// ─────────────────────────────────────────────────────────────────────────────

/// Result from the implementation phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImplementationResult {
    /// Whether tests ultimately passed.
    pub success: bool,
    /// Objective of the plan that was implemented.
    pub plan_objective: String,
    /// Steps considered completed.
    pub steps_completed: usize,
    /// Total steps in the plan.
    pub steps_total: usize,
    /// Whether the final test run passed.
    pub tests_passed: bool,
    /// TDD iterations used.
    pub attempts: u32,
    /// Error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Number of test executions.
    pub test_runs: u32,
    /// Number of fixes applied.
    pub fixes_applied: u32,
    /// Whether failures were recovered from within the loop.
    pub self_healed: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Injected Collaborators
// ─────────────────────────────────────────────────────────────────────────────

/// Runs the plan's tests.
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Run tests for a plan, normalising every failure into a result.
    async fn run_tests(&self, plan: &Plan) -> TestResult;
}

/// Applies a fix given the extracted error context.
#[async_trait]
pub trait FixApplier: Send + Sync {
    /// Attempt a fix; the next loop iteration re-runs the tests.
    async fn apply_fix(&self, error_context: &str, plan: &Plan);
}

/// Executes a research task in a sub-agent and returns its distilled
/// result. Implemented by the agent runner outside the core.
#[async_trait]
pub trait SubagentExecutor: Send + Sync {
    /// Run a named research task with the given tool subset.
    async fn execute(
        &self,
        task_name: &str,
        objective: &str,
        tools: &[String],
    ) -> std::result::Result<FirewallResult, String>;
}

/// Notified on every state transition.
pub type StateChangeCallback = Box<dyn Fn(RpiState, RpiState) + Send + Sync>;

/// Notified after every test run.
pub type TestResultCallback = Box<dyn Fn(&TestResult) + Send + Sync>;

/// Notified after every applied fix, with the error context that drove it.
pub type FixAppliedCallback = Box<dyn Fn(&str) + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// RPI Workflow
// ─────────────────────────────────────────────────────────────────────────────

/// Research-Plan-Implement workflow with a TDD verification loop.
pub struct RpiWorkflow {
    cost_tracker: SharedCostTracker,
    compactor: ContextCompactor,
    firewall: ContextFirewall,
    max_retries: u32,
    test_command: String,

    state: RpiState,
    current_plan: Option<Plan>,
    history: Vec<StateTransition>,
    cancel: CancellationToken,

    test_runner: Option<Arc<dyn TestRunner>>,
    fix_applier: Option<Arc<dyn FixApplier>>,
    subagent_executor: Option<Arc<dyn SubagentExecutor>>,

    on_state_change: Option<StateChangeCallback>,
    on_test_result: Option<TestResultCallback>,
    on_fix_applied: Option<FixAppliedCallback>,
}

impl RpiWorkflow {
    /// Create a workflow over a shared cost tracker, with default
    /// compactor, firewall, and retry settings.
    pub fn new(cost_tracker: SharedCostTracker) -> Self {
        Self {
            cost_tracker,
            compactor: ContextCompactor::default(),
            firewall: ContextFirewall::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            test_command: "make test".to_string(),
            state: RpiState::Idle,
            current_plan: None,
            history: Vec::new(),
            cancel: CancellationToken::new(),
            test_runner: None,
            fix_applier: None,
            subagent_executor: None,
            on_state_change: None,
            on_test_result: None,
            on_fix_applied: None,
        }
    }

    /// Replace the compactor.
    pub fn with_compactor(mut self, compactor: ContextCompactor) -> Self {
        self.compactor = compactor;
        self
    }

    /// Replace the firewall.
    pub fn with_firewall(mut self, firewall: ContextFirewall) -> Self {
        self.firewall = firewall;
        self
    }

    /// Set the TDD retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the default test command.
    pub fn with_test_command(mut self, command: impl Into<String>) -> Self {
        self.test_command = command.into();
        self
    }

    /// Inject the test runner.
    pub fn with_test_runner(mut self, runner: Arc<dyn TestRunner>) -> Self {
        self.test_runner = Some(runner);
        self
    }

    /// Inject the fix applier.
    pub fn with_fix_applier(mut self, applier: Arc<dyn FixApplier>) -> Self {
        self.fix_applier = Some(applier);
        self
    }

    /// Inject the sub-agent executor.
    pub fn with_subagent_executor(mut self, executor: Arc<dyn SubagentExecutor>) -> Self {
        self.subagent_executor = Some(executor);
        self
    }

    /// Set the state-change callback.
    pub fn on_state_change(&mut self, callback: StateChangeCallback) {
        self.on_state_change = Some(callback);
    }

    /// Set the test-result callback.
    pub fn on_test_result(&mut self, callback: TestResultCallback) {
        self.on_test_result = Some(callback);
    }

    /// Set the fix-applied callback.
    pub fn on_fix_applied(&mut self, callback: FixAppliedCallback) {
        self.on_fix_applied = Some(callback);
    }

    /// Current workflow state.
    pub fn state(&self) -> RpiState {
        self.state
    }

    /// Ordered transition history.
    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    /// The current plan, when planning has run.
    pub fn current_plan(&self) -> Option<&Plan> {
        self.current_plan.as_ref()
    }

    /// The firewall tracking this workflow's research forks.
    pub fn firewall(&self) -> &ContextFirewall {
        &self.firewall
    }

    /// Cooperative cancellation handle; cancel it to stop the workflow at
    /// the next transition point.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the implement phase may be entered. False until a plan
    /// artefact exists.
    pub fn can_implement(&self) -> bool {
        self.current_plan.is_some()
    }

    fn transition(&mut self, new_state: RpiState) {
        let old_state = self.state;
        self.state = new_state;
        self.history.push(StateTransition {
            from: old_state,
            to: new_state,
            timestamp: Utc::now(),
        });
        debug!(from = ?old_state, to = ?new_state, "Workflow transition");
        if let Some(callback) = &self.on_state_change {
            callback(old_state, new_state);
        }
    }

    fn check_cancelled(&mut self) -> Result<()> {
        if self.cancel.is_cancelled() {
            self.transition(RpiState::Failed);
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Research
    // ─────────────────────────────────────────────────────────────────────

    /// Execute the research phase.
    ///
    /// Spawns up to `max_subagents` firewalled sub-agents, each bound to a
    /// predetermined tool subset. With no injected executor, results are
    /// simulated (test mode). Every fork is terminated — completed or
    /// cancelled — before this method returns.
    pub async fn research_phase(
        &mut self,
        objective: &str,
        parent_session: Option<&SessionContext>,
        _scope: Option<&[String]>,
        max_subagents: usize,
    ) -> Result<ResearchContext> {
        self.check_cancelled()?;
        self.transition(RpiState::Research);

        let mut research = ResearchContext::default();

        let tasks = research_tasks(objective);
        for (task_name, task_objective, tools) in tasks.into_iter().take(max_subagents) {
            // Fork an isolated context per task and register it with the
            // firewall. A capacity overflow cancels this phase's forks.
            let fork_id = match parent_session {
                Some(parent) => {
                    let fork = parent.create_isolated_fork(&task_objective, &tools, 10, 30_000);
                    let fork_id = fork.session_id.clone();
                    if let Err(e) = self.firewall.track_fork(fork) {
                        self.cancel_phase_forks();
                        return Err(e.into());
                    }
                    Some(fork_id)
                }
                None => None,
            };

            match &self.subagent_executor {
                Some(executor) => {
                    match executor.execute(task_name, &task_objective, &tools).await {
                        Ok(result) => {
                            if let Some(fork_id) = &fork_id {
                                self.firewall.complete_context(
                                    fork_id,
                                    ForkReport::new(result.summary.clone())
                                        .with_findings(result.key_findings.clone())
                                        .with_file_references(result.file_references.clone())
                                        .with_tokens_consumed(result.tokens_consumed)
                                        .with_turns_used(result.turns_used),
                                )?;
                            }

                            for finding in &result.key_findings {
                                research.findings.push(
                                    ResearchFinding::new(finding.clone(), task_name)
                                        .with_category(task_name),
                                );
                            }
                            research
                                .files_explored
                                .extend(result.file_references.iter().cloned());
                            research.total_tokens += result.tokens_consumed;
                        }
                        Err(e) => {
                            // The executor timed out or failed; drop the
                            // fork without a result and move on.
                            warn!(task = task_name, error = %e, "Research sub-agent failed");
                            if let Some(fork_id) = &fork_id {
                                self.firewall.cancel_context(fork_id);
                            }
                        }
                    }
                }
                None => {
                    // Test mode: simulate a completed sub-agent.
                    if let Some(fork_id) = &fork_id {
                        self.firewall.complete_context(
                            fork_id,
                            ForkReport::new(format!("Research complete for: {task_objective}"))
                                .with_findings(vec![format!(
                                    "Found relevant information for {task_name}"
                                )])
                                .with_tokens_consumed(SIMULATED_TASK_TOKENS),
                        )?;
                    }
                    research.findings.push(
                        ResearchFinding::new(
                            format!("Simulated finding for {task_name}"),
                            task_name,
                        )
                        .with_category(task_name),
                    );
                    research.total_tokens += SIMULATED_TASK_TOKENS;
                }
            }
        }

        info!(
            findings = research.findings.len(),
            tokens = research.total_tokens,
            "Research phase complete"
        );
        Ok(research)
    }

    fn cancel_phase_forks(&mut self) {
        let active: Vec<String> = self
            .firewall
            .active_forks()
            .iter()
            .map(|f| f.session_id.clone())
            .collect();
        for session_id in active {
            self.firewall.cancel_context(&session_id);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Planning
    // ─────────────────────────────────────────────────────────────────────

    /// Execute the planning phase — the compaction point.
    ///
    /// Feeds all research findings into the compactor, converts the drafted
    /// steps into a [`Plan`], and records the compaction with the cost
    /// tracker so the context-health gate opens.
    pub async fn planning_phase(
        &mut self,
        research: &ResearchContext,
        objective: Option<&str>,
    ) -> Result<Plan> {
        self.check_cancelled()?;
        self.transition(RpiState::Planning);

        for finding in &research.findings {
            self.compactor.add_finding(finding.clone());
        }

        let result = self.compactor.compact(CompactionStrategy::Plan, objective);

        let steps: Vec<PlanStep> = result
            .plan_steps
            .iter()
            .enumerate()
            .map(|(i, draft)| PlanStep {
                id: format!("step_{}", i + 1),
                description: draft.description.clone(),
                target_file: draft.target_file.clone(),
                action: draft.action,
                details: draft.details.clone(),
                test_command: draft
                    .test_command
                    .clone()
                    .or_else(|| Some(self.test_command.clone())),
                completed: false,
                verified: false,
            })
            .collect();

        let mut plan = Plan::new(
            objective.unwrap_or("Implementation plan").to_string(),
            steps,
        );
        if !plan.test_commands.contains(&self.test_command) {
            plan.test_commands.push(self.test_command.clone());
        }
        if let Some(summary) = &result.summary {
            plan.constraints = summary.constraints.clone();
        }
        plan.research_tokens = result.original_token_count;
        plan.compacted_tokens = result.compacted_token_count;

        self.current_plan = Some(plan.clone());

        // The plan artefact unlocks implementation and shrinks the working
        // set the tracker accounts for.
        {
            let mut tracker = self.cost_tracker.lock();
            tracker.set_has_plan(true);
            tracker.record_compaction(result.tokens_saved as u64);
        }

        self.compactor.clear();

        info!(
            steps = plan.steps.len(),
            target_files = plan.target_files.len(),
            tokens_saved = result.tokens_saved,
            "Plan created at compaction point"
        );
        Ok(plan)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Implementation (TDD loop)
    // ─────────────────────────────────────────────────────────────────────

    /// Execute the implementation phase with the TDD verification loop.
    ///
    /// Precondition: a plan exists (`can_implement()`); otherwise a
    /// context-budget error is raised and the state is unchanged. Passing
    /// `None` implements the stored plan from the last planning phase.
    ///
    /// The loop runs tests, and on failure feeds the extracted error
    /// context to the fix applier, up to `max_retries` times. It cannot
    /// return success unless a test run actually passed.
    pub async fn implement_phase(
        &mut self,
        plan: Option<&Plan>,
    ) -> Result<ImplementationResult> {
        let Some(stored) = self.current_plan.clone() else {
            return Err(EngineError::Cost(CostError::ContextBudget(
                "cannot implement without a plan; run the planning phase first".to_string(),
            )));
        };
        let plan = plan.cloned().unwrap_or(stored);

        self.check_cancelled()?;
        self.transition(RpiState::Implement);

        let mut test_runs = 0u32;
        let mut fixes_applied = 0u32;

        for attempt in 0..self.max_retries {
            self.check_cancelled()?;

            // Tests are presumed to exist by now; an external
            // test-generation step runs before this phase.
            self.ensure_test_exists(&plan).await;

            let test_result = self.run_tests(&plan).await;
            test_runs += 1;
            if let Some(callback) = &self.on_test_result {
                callback(&test_result);
            }

            if test_result.passed_all() {
                self.transition(RpiState::Complete);
                return Ok(ImplementationResult {
                    success: true,
                    plan_objective: plan.objective.clone(),
                    steps_completed: plan.steps.len(),
                    steps_total: plan.steps.len(),
                    tests_passed: true,
                    attempts: attempt + 1,
                    error: None,
                    test_runs,
                    fixes_applied,
                    self_healed: fixes_applied > 0,
                });
            }

            // Feed the failure back for self-healing.
            let error_context = extract_error_context(&test_result);
            debug!(attempt, "Tests failed; applying fix");
            if let Some(applier) = &self.fix_applier {
                applier.apply_fix(&error_context, &plan).await;
            }
            fixes_applied += 1;
            if let Some(callback) = &self.on_fix_applied {
                callback(&error_context);
            }
        }

        self.transition(RpiState::Failed);
        Ok(ImplementationResult {
            success: false,
            plan_objective: plan.objective.clone(),
            steps_completed: 0,
            steps_total: plan.steps.len(),
            tests_passed: false,
            attempts: self.max_retries,
            error: Some("Max retries exceeded - tests still failing".to_string()),
            test_runs,
            fixes_applied,
            self_healed: false,
        })
    }

    /// Placeholder: test generation happens outside the engine before
    /// `implement_phase` is invoked.
    async fn ensure_test_exists(&self, _plan: &Plan) {}

    async fn run_tests(&self, plan: &Plan) -> TestResult {
        match &self.test_runner {
            Some(runner) => runner.run_tests(plan).await,
            None => {
                ShellTestRunner::new(self.test_command.as_str())
                    .run_tests(plan)
                    .await
            }
        }
    }

    /// Reset the workflow for a new cycle.
    pub fn reset(&mut self) {
        self.state = RpiState::Idle;
        self.current_plan = None;
        self.compactor.clear();
        self.cost_tracker.lock().set_has_plan(false);
    }
}

/// The fixed, ordered research task table: each task is bound to a
/// predetermined tool subset.
fn research_tasks(objective: &str) -> Vec<(&'static str, String, Vec<String>)> {
    let tools = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
    vec![
        (
            "codebase_search",
            format!("Search codebase for: {objective}"),
            tools(&["Read", "Grep", "Glob", "list_symbols"]),
        ),
        (
            "pattern_analysis",
            format!("Find patterns related to: {objective}"),
            tools(&["Read", "Grep", "find_definition"]),
        ),
        (
            "dependency_check",
            format!("Check dependencies for: {objective}"),
            tools(&["Read", "Glob", "get_call_graph"]),
        ),
    ]
}

/// Extract actionable error context from a failed test run.
///
/// Takes up to the first 2 000 characters of stderr, plus stdout when it
/// mentions an error.
fn extract_error_context(test_result: &TestResult) -> String {
    let mut parts = Vec::new();

    if !test_result.stderr.is_empty() {
        let stderr: String = test_result.stderr.chars().take(ERROR_CONTEXT_CAP).collect();
        parts.push(format!("STDERR:\n{stderr}"));
    }
    if !test_result.stdout.is_empty() && test_result.stdout.to_lowercase().contains("error") {
        let stdout: String = test_result.stdout.chars().take(ERROR_CONTEXT_CAP).collect();
        parts.push(format!("STDOUT (errors):\n{stdout}"));
    }

    if parts.is_empty() {
        "Tests failed with no error output".to_string()
    } else {
        parts.join("\n\n")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
