//! Research findings and firewalled sub-agent results.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Research Finding
// ─────────────────────────────────────────────────────────────────────────────

/// A single finding from the research phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchFinding {
    /// The finding text.
    pub content: String,
    /// Where it came from: a file path, a tool name, a sub-agent task.
    pub source: String,
    /// Caller-assigned relevance in `[0, 1]`.
    #[serde(default = "default_relevance")]
    pub relevance_score: f64,
    /// Category for grouping (`core_logic`, `pattern_analysis`, ...).
    #[serde(default = "default_category")]
    pub category: String,
    /// Line range within the source, e.g. `"45-67"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_numbers: Option<String>,
}

fn default_relevance() -> f64 {
    1.0
}

fn default_category() -> String {
    "general".to_string()
}

impl ResearchFinding {
    /// Create a finding with default relevance and category.
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
            relevance_score: 1.0,
            category: "general".to_string(),
            line_numbers: None,
        }
    }

    /// Set the relevance score.
    pub fn with_relevance(mut self, score: f64) -> Self {
        self.relevance_score = score;
        self
    }

    /// Set the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Set the line range.
    pub fn with_lines(mut self, lines: impl Into<String>) -> Self {
        self.line_numbers = Some(lines.into());
        self
    }

    /// Compact `source:lines` reference form.
    pub fn reference(&self) -> String {
        match &self.line_numbers {
            Some(lines) => format!("{}:{}", self.source, lines),
            None => self.source.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Research Context
// ─────────────────────────────────────────────────────────────────────────────

/// Aggregated output of the research phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchContext {
    /// All findings gathered by research sub-agents.
    pub findings: Vec<ResearchFinding>,
    /// Files the sub-agents explored.
    pub files_explored: Vec<String>,
    /// Recurring patterns identified.
    pub patterns_found: Vec<String>,
    /// Constraints the implementation must respect.
    pub constraints_identified: Vec<String>,
    /// Dependencies discovered.
    pub dependencies: Vec<String>,
    /// Total tokens consumed gathering this context.
    pub total_tokens: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Firewall Result
// ─────────────────────────────────────────────────────────────────────────────

/// The distilled artefact a completed sub-agent fork returns to its parent.
///
/// By construction `tokens_returned` is far smaller than `tokens_consumed`:
/// the fork pays the context tax, the parent only receives the summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallResult {
    /// Whether the sub-agent completed without error.
    pub success: bool,
    /// Session id of the fork that produced this result.
    pub context_id: String,
    /// Distilled summary injected into the parent context.
    pub summary: String,
    /// Key findings worth surfacing individually.
    #[serde(default)]
    pub key_findings: Vec<String>,
    /// `file:line` references backing the findings.
    #[serde(default)]
    pub file_references: Vec<String>,
    /// Tokens the fork consumed while working.
    #[serde(default)]
    pub tokens_consumed: u64,
    /// Estimated tokens crossing back into the parent.
    #[serde(default)]
    pub tokens_returned: u64,
    /// Conversation turns the fork used.
    #[serde(default)]
    pub turns_used: u32,
    /// Error message when the fork failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FirewallResult {
    /// Fraction of consumed context that was filtered out (0 when nothing
    /// was consumed).
    pub fn compression_ratio(&self) -> f64 {
        if self.tokens_consumed == 0 {
            return 0.0;
        }
        1.0 - (self.tokens_returned as f64 / self.tokens_consumed as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finding_reference() {
        let finding = ResearchFinding::new("User class handles auth", "src/models/user.ts")
            .with_lines("45-67");
        assert_eq!(finding.reference(), "src/models/user.ts:45-67");

        let bare = ResearchFinding::new("config lives here", "src/config.rs");
        assert_eq!(bare.reference(), "src/config.rs");
    }

    #[test]
    fn test_compression_ratio() {
        let result = FirewallResult {
            success: true,
            context_id: "main-sub-abc12345".to_string(),
            summary: "found it".to_string(),
            key_findings: vec![],
            file_references: vec![],
            tokens_consumed: 5000,
            tokens_returned: 500,
            turns_used: 4,
            error: None,
        };
        assert!((result.compression_ratio() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_compression_ratio_zero_consumed() {
        let result = FirewallResult {
            success: true,
            context_id: "x".to_string(),
            summary: String::new(),
            key_findings: vec![],
            file_references: vec![],
            tokens_consumed: 0,
            tokens_returned: 0,
            turns_used: 0,
            error: None,
        };
        assert_eq!(result.compression_ratio(), 0.0);
    }
}
