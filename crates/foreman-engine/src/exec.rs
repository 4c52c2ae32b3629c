//! Default shell test execution.
//!
//! Runs the plan's test command through the system shell with a hard
//! wall-clock timeout. Every failure mode — non-zero exit, timeout, spawn
//! error — is normalised into a [`TestResult`] so the TDD loop treats them
//! uniformly.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use foreman_types::{Plan, TestResult};

use crate::workflow::TestRunner;

/// Default wall-clock timeout for a test run.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Shell-based test runner.
#[derive(Debug, Clone)]
pub struct ShellTestRunner {
    /// Command used when the plan carries none.
    default_command: String,
    /// Hard timeout for one test run.
    timeout: Duration,
    /// Working directory override.
    working_dir: Option<std::path::PathBuf>,
}

impl ShellTestRunner {
    /// Create a runner with the given fallback command.
    pub fn new(default_command: impl Into<String>) -> Self {
        Self {
            default_command: default_command.into(),
            timeout: DEFAULT_TEST_TIMEOUT,
            working_dir: None,
        }
    }

    /// Set the test timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the working directory for test commands.
    pub fn with_working_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    async fn run_command(&self, command: &str) -> TestResult {
        debug!(command, "Running test command");

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        match timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => TestResult {
                exit_code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                passed: 0,
                failed: 0,
                test_count: 0,
            },
            Ok(Err(e)) => TestResult::failing(-1, e.to_string()),
            Err(_) => TestResult::failing(-1, "Test execution timed out"),
        }
    }
}

#[async_trait]
impl TestRunner for ShellTestRunner {
    async fn run_tests(&self, plan: &Plan) -> TestResult {
        let command = plan
            .test_commands
            .first()
            .map(String::as_str)
            .unwrap_or(&self.default_command);
        self.run_command(command).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use foreman_types::{PlanStep, StepAction};

    fn plan_with_command(command: &str) -> Plan {
        Plan::new(
            "test objective",
            vec![PlanStep {
                id: "step_1".to_string(),
                description: "step".to_string(),
                target_file: "src/lib.rs".to_string(),
                action: StepAction::Modify,
                details: String::new(),
                test_command: Some(command.to_string()),
                completed: false,
                verified: false,
            }],
        )
    }

    #[tokio::test]
    async fn test_passing_command() {
        let runner = ShellTestRunner::new("true");
        let result = runner.run_tests(&plan_with_command("echo ok")).await;
        assert_eq!(result.exit_code, 0);
        assert!(result.passed_all());
        assert!(result.stdout.contains("ok"));
    }

    #[tokio::test]
    async fn test_failing_command() {
        let runner = ShellTestRunner::new("true");
        let result = runner
            .run_tests(&plan_with_command("echo boom >&2; exit 3"))
            .await;
        assert_eq!(result.exit_code, 3);
        assert!(!result.passed_all());
        assert!(result.stderr.contains("boom"));
    }

    #[tokio::test]
    async fn test_timeout_normalised() {
        let runner =
            ShellTestRunner::new("true").with_timeout(Duration::from_millis(50));
        let result = runner.run_tests(&plan_with_command("sleep 5")).await;
        assert_eq!(result.exit_code, -1);
        assert_eq!(result.stderr, "Test execution timed out");
    }

    #[tokio::test]
    async fn test_fallback_to_default_command() {
        let runner = ShellTestRunner::new("echo fallback");
        let plan = Plan::new("obj", vec![]);
        let result = runner.run_tests(&plan).await;
        assert!(result.stdout.contains("fallback"));
    }
}
