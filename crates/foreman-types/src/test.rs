//! Test execution results and container execution output.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Test Result
// ─────────────────────────────────────────────────────────────────────────────

/// Normalised result from running a test command.
///
/// Timeouts and runner exceptions are folded into this shape with a
/// non-zero exit code so the TDD loop treats every failure uniformly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    /// Process exit code (`-1` for timeouts and spawn failures).
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Number of tests that passed, when the runner can tell.
    #[serde(default)]
    pub passed: u32,
    /// Number of tests that failed, when the runner can tell.
    #[serde(default)]
    pub failed: u32,
    /// Total tests discovered, when the runner can tell.
    #[serde(default)]
    pub test_count: u32,
}

impl TestResult {
    /// A passing result with no output.
    pub fn passing() -> Self {
        Self {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            passed: 0,
            failed: 0,
            test_count: 0,
        }
    }

    /// A failing result with the given exit code and stderr.
    pub fn failing(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            passed: 0,
            failed: 0,
            test_count: 0,
        }
    }

    /// All tests passed: zero exit code and zero recorded failures.
    pub fn passed_all(&self) -> bool {
        self.exit_code == 0 && self.failed == 0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Execution Output
// ─────────────────────────────────────────────────────────────────────────────

/// Output of a script run inside the sandboxed container runtime.
///
/// The container lifecycle itself is a collaborator concern; only this
/// product shape crosses the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutput {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Process exit code.
    pub exit_code: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passed_all() {
        assert!(TestResult::passing().passed_all());
        assert!(!TestResult::failing(1, "AssertionError").passed_all());

        // Zero exit code but recorded failures still fails.
        let mut flaky = TestResult::passing();
        flaky.failed = 2;
        assert!(!flaky.passed_all());
    }
}
