//! Shared types for the Foreman orchestration framework.
//!
//! This crate defines the data model exchanged between the orchestration
//! components:
//!
//! - [`AgentMessage`] / [`TokenUsage`]: messages from an agent's LLM stream,
//!   consumed by the cost tracker
//! - [`Plan`] / [`PlanStep`]: the compacted implementation plan that unlocks
//!   the implement phase
//! - [`ResearchFinding`] / [`ResearchContext`]: raw research output
//! - [`FirewallResult`]: the distilled artefact a sub-agent returns to its
//!   parent
//! - [`TestResult`]: normalised output from a test run

pub mod message;
pub mod plan;
pub mod research;
pub mod test;
pub mod tokens;

pub use message::{AgentMessage, TokenUsage};
pub use plan::{Plan, PlanStep, StepAction};
pub use research::{FirewallResult, ResearchContext, ResearchFinding};
pub use test::{ExecutionOutput, TestResult};
pub use tokens::estimate_tokens;
