//! The context compactor.
//!
//! Converts an unbounded bag of research findings into a bounded artefact:
//! a key-point summary, extracted references, a per-category hierarchy, or
//! a concrete implementation plan. The plan strategy is the compaction
//! point of the RPI workflow — the transition from high-noise research to
//! disciplined implementation.

use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use foreman_types::{ResearchFinding, StepAction, estimate_tokens};

/// Default cap on retained findings.
pub const DEFAULT_MAX_FINDINGS: usize = 100;

/// Default relevance threshold for accepting a finding.
pub const DEFAULT_MIN_RELEVANCE: f64 = 0.5;

/// Default test command attached to generated plan steps.
pub const DEFAULT_TEST_COMMAND: &str = "make test";

/// Keywords that mark a finding as carrying a constraint.
const CONSTRAINT_KEYWORDS: [&str; 4] = ["must", "required", "constraint", "cannot"];

/// Keywords that mark a finding as naming a dependency.
const DEPENDENCY_KEYWORDS: [&str; 4] = ["import", "require", "depends", "uses"];

// ─────────────────────────────────────────────────────────────────────────────
// Strategy
// ─────────────────────────────────────────────────────────────────────────────

/// Strategy for compacting research context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompactionStrategy {
    /// Summarize findings into key points.
    Summarize,
    /// Extract specific artefacts (files, constraints, dependencies).
    Extract,
    /// Per-category hierarchy of the most relevant findings.
    Hierarchical,
    /// Generate an actionable plan. The compaction point.
    Plan,
}

// ─────────────────────────────────────────────────────────────────────────────
// Outputs
// ─────────────────────────────────────────────────────────────────────────────

/// Compacted summary of research findings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchSummary {
    pub key_findings: Vec<String>,
    pub relevant_files: Vec<String>,
    pub constraints: Vec<String>,
    pub dependencies: Vec<String>,
    pub patterns_found: Vec<String>,
}

impl ResearchSummary {
    /// Render as Markdown sections suitable for context injection.
    pub fn to_context_string(&self) -> String {
        let mut sections = Vec::new();

        let render = |title: &str, items: &[String], code: bool| {
            let body = items
                .iter()
                .map(|item| {
                    if code {
                        format!("- `{item}`")
                    } else {
                        format!("- {item}")
                    }
                })
                .collect::<Vec<_>>()
                .join("\n");
            format!("## {title}\n{body}")
        };

        if !self.key_findings.is_empty() {
            sections.push(render("Key Findings", &self.key_findings, false));
        }
        if !self.relevant_files.is_empty() {
            sections.push(render("Relevant Files", &self.relevant_files, true));
        }
        if !self.constraints.is_empty() {
            sections.push(render("Constraints", &self.constraints, false));
        }
        if !self.dependencies.is_empty() {
            sections.push(render("Dependencies", &self.dependencies, false));
        }
        if !self.patterns_found.is_empty() {
            sections.push(render("Patterns", &self.patterns_found, false));
        }

        sections.join("\n\n")
    }
}

/// A plan step drafted by the compactor; the workflow engine assigns ids
/// and finalises test commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftStep {
    pub description: String,
    pub target_file: String,
    pub action: StepAction,
    pub details: String,
    pub test_command: Option<String>,
    pub verification: Option<String>,
}

/// Result of a compaction, with compression metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionResult {
    pub strategy: CompactionStrategy,
    pub summary: Option<ResearchSummary>,
    pub plan_steps: Vec<DraftStep>,
    /// Estimated tokens of everything that was fed in.
    pub original_token_count: usize,
    /// Estimated tokens of the compacted output (never above the input).
    pub compacted_token_count: usize,
    /// Tokens freed by replacing the research with the compacted artefact.
    pub tokens_saved: usize,
    /// Wall-clock time the compaction took.
    pub compaction_time_ms: f64,
}

impl CompactionResult {
    /// Fraction of the input filtered out (0 for empty input).
    pub fn compression_ratio(&self) -> f64 {
        if self.original_token_count == 0 {
            return 0.0;
        }
        1.0 - (self.compacted_token_count as f64 / self.original_token_count as f64)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Context Compactor
// ─────────────────────────────────────────────────────────────────────────────

/// Compacts research findings into clean, actionable artefacts.
///
/// Findings below the relevance threshold are discarded on entry; at
/// compaction time the retained set is sorted by relevance and capped.
#[derive(Debug)]
pub struct ContextCompactor {
    max_findings: usize,
    min_relevance: f64,
    test_command: String,
    findings: Vec<ResearchFinding>,
    total_input_tokens: usize,
}

impl Default for ContextCompactor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FINDINGS, DEFAULT_MIN_RELEVANCE)
    }
}

impl ContextCompactor {
    /// Create a compactor with the given retention cap and relevance
    /// threshold.
    pub fn new(max_findings: usize, min_relevance: f64) -> Self {
        Self {
            max_findings,
            min_relevance,
            test_command: DEFAULT_TEST_COMMAND.to_string(),
            findings: Vec::new(),
            total_input_tokens: 0,
        }
    }

    /// Override the test command attached to generated plan steps.
    pub fn with_test_command(mut self, command: impl Into<String>) -> Self {
        self.test_command = command.into();
        self
    }

    /// Add a research finding.
    ///
    /// Findings below the relevance threshold are dropped, but their token
    /// cost still counts toward the original-size metric — the noise was
    /// paid for even if it is not retained.
    pub fn add_finding(&mut self, finding: ResearchFinding) {
        self.total_input_tokens += estimate_tokens(&finding.content);
        if finding.relevance_score >= self.min_relevance {
            self.findings.push(finding);
        }
    }

    /// Add raw content as a finding.
    pub fn add_raw_content(
        &mut self,
        content: impl Into<String>,
        source: impl Into<String>,
        category: impl Into<String>,
        relevance: f64,
    ) {
        self.add_finding(
            ResearchFinding::new(content, source)
                .with_category(category)
                .with_relevance(relevance),
        );
    }

    /// Number of retained findings.
    pub fn finding_count(&self) -> usize {
        self.findings.len()
    }

    /// Compact the retained findings.
    pub fn compact(
        &self,
        strategy: CompactionStrategy,
        objective: Option<&str>,
    ) -> CompactionResult {
        let start = Instant::now();

        let mut sorted: Vec<&ResearchFinding> = self.findings.iter().collect();
        sorted.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted.truncate(self.max_findings);

        let (summary, plan_steps) = match strategy {
            CompactionStrategy::Summarize => (Some(self.summarize(&sorted)), Vec::new()),
            CompactionStrategy::Extract => (Some(self.extract(&sorted)), Vec::new()),
            CompactionStrategy::Hierarchical => (Some(self.hierarchical(&sorted)), Vec::new()),
            CompactionStrategy::Plan => self.plan(&sorted, objective),
        };

        let original_token_count = self.total_input_tokens;
        let mut compacted_token_count = 0;
        if let Some(summary) = &summary {
            compacted_token_count += estimate_tokens(&summary.to_context_string());
        }
        for step in &plan_steps {
            compacted_token_count += estimate_tokens(&step.description);
            compacted_token_count += estimate_tokens(&step.details);
        }
        // The compacted artefact replaces the research in the working set;
        // it never counts as larger than what it replaced.
        compacted_token_count = compacted_token_count.min(original_token_count);

        let result = CompactionResult {
            strategy,
            summary,
            plan_steps,
            original_token_count,
            compacted_token_count,
            tokens_saved: original_token_count - compacted_token_count,
            compaction_time_ms: start.elapsed().as_secs_f64() * 1000.0,
        };

        debug!(
            strategy = ?strategy,
            original = result.original_token_count,
            compacted = result.compacted_token_count,
            saved = result.tokens_saved,
            "Compaction complete"
        );
        result
    }

    /// Discard all findings for the next cycle.
    pub fn clear(&mut self) {
        self.findings.clear();
        self.total_input_tokens = 0;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Strategies
    // ─────────────────────────────────────────────────────────────────────

    fn summarize(&self, findings: &[&ResearchFinding]) -> ResearchSummary {
        let mut key_findings = Vec::new();
        let mut relevant_files = Vec::new();

        for finding in findings {
            let mut key_point: String = finding.content.chars().take(200).collect();
            key_point = key_point.trim().to_string();
            key_point.push_str(&format!(" ({})", finding.reference()));
            key_findings.push(key_point);

            if !relevant_files.contains(&finding.source) {
                relevant_files.push(finding.source.clone());
            }
        }

        key_findings.truncate(20);
        relevant_files.truncate(15);
        ResearchSummary {
            key_findings,
            relevant_files,
            ..Default::default()
        }
    }

    fn extract(&self, findings: &[&ResearchFinding]) -> ResearchSummary {
        let mut relevant_files = Vec::new();
        let mut constraints = Vec::new();
        let mut dependencies = Vec::new();

        for finding in findings {
            relevant_files.push(finding.reference());

            let content_lower = finding.content.to_lowercase();
            if CONSTRAINT_KEYWORDS.iter().any(|kw| content_lower.contains(kw)) {
                constraints.push(finding.content.chars().take(100).collect());
            }
            if DEPENDENCY_KEYWORDS.iter().any(|kw| content_lower.contains(kw)) {
                dependencies.push(finding.reference());
            }
        }

        relevant_files.truncate(20);
        constraints.truncate(10);
        dependencies.truncate(10);
        ResearchSummary {
            relevant_files,
            constraints,
            dependencies,
            ..Default::default()
        }
    }

    fn hierarchical(&self, findings: &[&ResearchFinding]) -> ResearchSummary {
        let mut by_category: HashMap<&str, Vec<&ResearchFinding>> = HashMap::new();
        let mut category_order: Vec<&str> = Vec::new();
        for finding in findings {
            let entry = by_category.entry(finding.category.as_str()).or_default();
            if entry.is_empty() {
                category_order.push(finding.category.as_str());
            }
            entry.push(finding);
        }

        let mut key_findings = Vec::new();
        for category in &category_order {
            for finding in by_category[category].iter().take(5) {
                let snippet: String = finding.content.chars().take(100).collect();
                key_findings.push(format!("[{category}] {snippet} ({})", finding.reference()));
            }
        }
        key_findings.truncate(25);

        ResearchSummary {
            key_findings,
            relevant_files: findings.iter().take(15).map(|f| f.source.clone()).collect(),
            patterns_found: category_order.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    fn plan(
        &self,
        findings: &[&ResearchFinding],
        objective: Option<&str>,
    ) -> (Option<ResearchSummary>, Vec<DraftStep>) {
        // Group findings by source file; one step per file.
        let mut by_file: HashMap<&str, Vec<&ResearchFinding>> = HashMap::new();
        let mut file_order: Vec<&str> = Vec::new();
        for finding in findings {
            let entry = by_file.entry(finding.source.as_str()).or_default();
            if entry.is_empty() {
                file_order.push(finding.source.as_str());
            }
            entry.push(finding);
        }

        let plan_steps: Vec<DraftStep> = file_order
            .iter()
            .map(|file| {
                let details = by_file[file]
                    .iter()
                    .take(3)
                    .map(|f| f.content.chars().take(50).collect::<String>())
                    .collect::<Vec<_>>()
                    .join("; ");
                DraftStep {
                    description: format!("Update {file}"),
                    target_file: file.to_string(),
                    action: StepAction::Modify,
                    details,
                    test_command: Some(self.test_command.clone()),
                    verification: Some(format!("Verify changes in {file}")),
                }
            })
            .collect();

        let summary = ResearchSummary {
            key_findings: vec![match objective {
                Some(objective) => format!("Found {} relevant items for: {objective}", findings.len()),
                None => format!("Found {} relevant items", findings.len()),
            }],
            relevant_files: file_order.iter().map(|f| f.to_string()).collect(),
            ..Default::default()
        };

        (Some(summary), plan_steps)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(content: &str, source: &str, relevance: f64) -> ResearchFinding {
        ResearchFinding::new(content, source).with_relevance(relevance)
    }

    fn loaded_compactor() -> ContextCompactor {
        let mut compactor = ContextCompactor::default();
        compactor.add_finding(
            finding(
                "User class handles authentication and role checks for every request",
                "src/models/user.ts",
                0.9,
            )
            .with_lines("45-67")
            .with_category("core_logic"),
        );
        compactor.add_finding(
            finding(
                "Sessions must be validated before any handler runs",
                "src/middleware/session.ts",
                0.8,
            )
            .with_category("constraints"),
        );
        compactor.add_finding(
            finding(
                "Auth module imports the token helper from src/lib/token.ts",
                "src/auth/index.ts",
                0.7,
            )
            .with_category("dependencies"),
        );
        compactor
    }

    #[test]
    fn test_relevance_filter() {
        let mut compactor = ContextCompactor::default();
        compactor.add_finding(finding("relevant enough to keep around", "a.rs", 0.5));
        compactor.add_finding(finding("noise that should be discarded", "b.rs", 0.3));
        assert_eq!(compactor.finding_count(), 1);
    }

    #[test]
    fn test_filtered_findings_still_count_as_input() {
        let mut compactor = ContextCompactor::default();
        compactor.add_finding(finding("noise noise noise noise", "b.rs", 0.1));
        let result = compactor.compact(CompactionStrategy::Summarize, None);
        assert!(result.original_token_count > 0);
    }

    #[test]
    fn test_summarize_shapes() {
        let compactor = loaded_compactor();
        let result = compactor.compact(CompactionStrategy::Summarize, None);

        let summary = result.summary.unwrap();
        assert_eq!(summary.key_findings.len(), 3);
        // Most relevant finding first, with a file:line reference.
        assert!(summary.key_findings[0].contains("src/models/user.ts:45-67"));
        assert_eq!(summary.relevant_files.len(), 3);
        assert!(result.plan_steps.is_empty());
    }

    #[test]
    fn test_extract_lifts_constraints_and_dependencies() {
        let compactor = loaded_compactor();
        let result = compactor.compact(CompactionStrategy::Extract, None);

        let summary = result.summary.unwrap();
        assert!(summary.constraints.iter().any(|c| c.contains("must be validated")));
        assert!(
            summary
                .dependencies
                .iter()
                .any(|d| d.contains("src/auth/index.ts"))
        );
        assert_eq!(summary.relevant_files.len(), 3);
    }

    #[test]
    fn test_hierarchical_groups_by_category() {
        let compactor = loaded_compactor();
        let result = compactor.compact(CompactionStrategy::Hierarchical, None);

        let summary = result.summary.unwrap();
        assert!(summary.key_findings.iter().any(|f| f.starts_with("[core_logic]")));
        assert!(summary.patterns_found.contains(&"core_logic".to_string()));
        assert!(summary.patterns_found.contains(&"constraints".to_string()));
    }

    #[test]
    fn test_plan_one_step_per_file() {
        let mut compactor = loaded_compactor();
        compactor.add_finding(
            finding("second finding about the user model internals", "src/models/user.ts", 0.6)
                .with_category("core_logic"),
        );

        let result = compactor.compact(CompactionStrategy::Plan, Some("add idempotency"));

        // One step per distinct source file.
        assert_eq!(result.plan_steps.len(), 3);
        let user_step = result
            .plan_steps
            .iter()
            .find(|s| s.target_file == "src/models/user.ts")
            .unwrap();
        assert_eq!(user_step.action, StepAction::Modify);
        assert!(user_step.details.contains(';'));
        assert_eq!(user_step.test_command.as_deref(), Some("make test"));

        let summary = result.summary.unwrap();
        assert!(summary.key_findings[0].contains("add idempotency"));
        assert_eq!(summary.relevant_files.len(), 3);
    }

    #[test]
    fn test_plan_custom_test_command() {
        let mut compactor = ContextCompactor::default().with_test_command("cargo test");
        compactor.add_finding(finding("relevant content for the planner", "src/lib.rs", 1.0));
        let result = compactor.compact(CompactionStrategy::Plan, None);
        assert_eq!(result.plan_steps[0].test_command.as_deref(), Some("cargo test"));
    }

    #[test]
    fn test_compaction_shrinks() {
        let mut compactor = ContextCompactor::default();
        for i in 0..30 {
            compactor.add_finding(finding(
                &format!(
                    "finding {i} with a fairly long body of text describing the handler \
                     registration flow and how the middleware chain validates tokens before \
                     dispatching to the controller layer"
                ),
                &format!("src/module_{}.rs", i % 4),
                0.9,
            ));
        }

        let result = compactor.compact(CompactionStrategy::Plan, None);
        assert!(result.compacted_token_count <= result.original_token_count);
        assert_eq!(
            result.tokens_saved,
            result.original_token_count - result.compacted_token_count
        );
        assert!(result.compression_ratio() > 0.0);
    }

    #[test]
    fn test_empty_compaction() {
        let compactor = ContextCompactor::default();
        let result = compactor.compact(CompactionStrategy::Plan, None);
        assert!(result.plan_steps.is_empty());
        assert_eq!(result.original_token_count, 0);
        assert_eq!(result.compression_ratio(), 0.0);
    }

    #[test]
    fn test_max_findings_cap() {
        let mut compactor = ContextCompactor::new(5, 0.0);
        for i in 0..20 {
            compactor.add_finding(finding(
                &format!("finding number {i}"),
                &format!("src/f{i}.rs"),
                (i as f64) / 20.0,
            ));
        }

        let result = compactor.compact(CompactionStrategy::Plan, None);
        // Capped to the 5 most relevant findings, each in its own file.
        assert_eq!(result.plan_steps.len(), 5);
        assert!(result.plan_steps.iter().any(|s| s.target_file == "src/f19.rs"));
    }

    #[test]
    fn test_clear_resets_state() {
        let mut compactor = loaded_compactor();
        compactor.clear();
        assert_eq!(compactor.finding_count(), 0);
        let result = compactor.compact(CompactionStrategy::Summarize, None);
        assert_eq!(result.original_token_count, 0);
    }

    #[test]
    fn test_summary_markdown_rendering() {
        let summary = ResearchSummary {
            key_findings: vec!["a".to_string()],
            relevant_files: vec!["src/a.rs".to_string()],
            constraints: vec!["must not block".to_string()],
            ..Default::default()
        };
        let rendered = summary.to_context_string();
        assert!(rendered.contains("## Key Findings\n- a"));
        assert!(rendered.contains("## Relevant Files\n- `src/a.rs`"));
        assert!(rendered.contains("## Constraints\n- must not block"));
        assert!(!rendered.contains("## Dependencies"));
    }
}
