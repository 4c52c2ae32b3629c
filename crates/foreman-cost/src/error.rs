//! Cost and context-budget error types.
//!
//! Both variants are reportable rather than fatal: the workflow engine and
//! the runner decide how to wind down when one surfaces.

/// Result type alias for cost operations.
pub type Result<T> = std::result::Result<T, CostError>;

/// Errors raised by the cost tracker.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CostError {
    /// The session's money cap has been reached.
    #[error("budget exceeded: ${spent:.4} of ${budget:.4} used")]
    BudgetExceeded { spent: f64, budget: f64 },

    /// The context-health gate demands a plan before further work.
    #[error("context budget violated: {0}")]
    ContextBudget(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_exceeded_display() {
        let err = CostError::BudgetExceeded {
            spent: 0.1234,
            budget: 0.1,
        };
        assert!(err.to_string().contains("$0.1234"));
        assert!(err.to_string().contains("$0.1000"));
    }
}
