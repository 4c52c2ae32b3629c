//! Implementation plans.
//!
//! A [`Plan`] is the compacted artefact produced by the planning phase. It
//! is the gate into implementation: the workflow engine refuses to enter the
//! implement phase without one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Step Action
// ─────────────────────────────────────────────────────────────────────────────

/// What a plan step does to its target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    /// Create a new file.
    Create,
    /// Modify an existing file.
    Modify,
    /// Delete a file.
    Delete,
}

impl StepAction {
    /// Stable string form used in serialized plans.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepAction::Create => "create",
            StepAction::Modify => "modify",
            StepAction::Delete => "delete",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plan Step
// ─────────────────────────────────────────────────────────────────────────────

/// A single step in an implementation plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// Step identifier (`step_1`, `step_2`, ...).
    pub id: String,
    /// What this step accomplishes.
    pub description: String,
    /// The file this step touches.
    pub target_file: String,
    /// The action taken on the target file.
    pub action: StepAction,
    /// Supporting detail distilled from research findings.
    #[serde(default)]
    pub details: String,
    /// Test command verifying this step, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_command: Option<String>,
    /// Whether the step has been executed.
    #[serde(default)]
    pub completed: bool,
    /// Whether the step's test command has passed.
    #[serde(default)]
    pub verified: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Plan
// ─────────────────────────────────────────────────────────────────────────────

/// An actionable implementation plan produced at the compaction point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// The objective this plan implements.
    pub objective: String,
    /// Ordered steps.
    pub steps: Vec<PlanStep>,
    /// Distinct files touched by the plan.
    pub target_files: Vec<String>,
    /// Test commands used to verify the plan.
    pub test_commands: Vec<String>,
    /// Constraints lifted from research findings.
    #[serde(default)]
    pub constraints: Vec<String>,
    /// When this plan was created.
    pub created_at: DateTime<Utc>,
    /// Estimated tokens consumed by the research that fed this plan.
    #[serde(default)]
    pub research_tokens: usize,
    /// Estimated tokens the compacted plan occupies.
    #[serde(default)]
    pub compacted_tokens: usize,
}

impl Plan {
    /// Create a plan from steps, deriving target files and test commands.
    pub fn new(objective: impl Into<String>, steps: Vec<PlanStep>) -> Self {
        let mut target_files = Vec::new();
        let mut test_commands = Vec::new();
        for step in &steps {
            if !target_files.contains(&step.target_file) {
                target_files.push(step.target_file.clone());
            }
            if let Some(cmd) = &step.test_command {
                if !test_commands.contains(cmd) {
                    test_commands.push(cmd.clone());
                }
            }
        }
        Self {
            objective: objective.into(),
            steps,
            target_files,
            test_commands,
            constraints: Vec::new(),
            created_at: Utc::now(),
            research_tokens: 0,
            compacted_tokens: 0,
        }
    }

    /// Number of steps in the plan.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, file: &str, cmd: Option<&str>) -> PlanStep {
        PlanStep {
            id: id.to_string(),
            description: format!("Update {file}"),
            target_file: file.to_string(),
            action: StepAction::Modify,
            details: String::new(),
            test_command: cmd.map(String::from),
            completed: false,
            verified: false,
        }
    }

    #[test]
    fn test_plan_derives_unique_targets() {
        let plan = Plan::new(
            "add auth",
            vec![
                step("step_1", "src/a.rs", Some("cargo test")),
                step("step_2", "src/a.rs", Some("cargo test")),
                step("step_3", "src/b.rs", None),
            ],
        );
        assert_eq!(plan.target_files, vec!["src/a.rs", "src/b.rs"]);
        assert_eq!(plan.test_commands, vec!["cargo test"]);
        assert_eq!(plan.step_count(), 3);
    }

    #[test]
    fn test_action_as_str() {
        assert_eq!(StepAction::Create.as_str(), "create");
        assert_eq!(StepAction::Delete.as_str(), "delete");
    }
}
