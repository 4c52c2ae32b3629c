//! Routing, session orchestration, and the RPI workflow engine.
//!
//! This crate assembles the orchestration core end to end:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  ContextOrchestrator                                         │
//! │  prompt ─▶ router / discovery ─▶ SessionContext              │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  RpiWorkflow                                                 │
//! │  RESEARCH (firewalled forks) ─▶ PLANNING (compaction point)  │
//! │  ─▶ IMPLEMENT (TDD loop, bounded retries)                    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! LLM transports, external REST clients, and the agent runner itself are
//! collaborators; only their contracts live here ([`LlmBackend`],
//! [`RepoDiscovery`], [`AgentRunner`]).

pub mod backend;
pub mod discovery;
pub mod error;
pub mod exec;
pub mod orchestrator;
pub mod router;
pub mod runner;
pub mod workflow;


pub use backend::{
    CompletionRequest, CompletionResponse, LlmBackend, LlmError, MockBackend, SharedBackend,
};
pub use discovery::{RepoDiscovery, extract_repo_name};
pub use error::{EngineError, Result};
pub use exec::ShellTestRunner;
pub use orchestrator::{
    ContextOrchestrator, RepoListing, SessionOptions, SharedRepoRegistry, shared_repo_registry,
};
pub use router::{RepoRouter, RoutingError};
pub use runner::{AgentResult, AgentRunner};
pub use workflow::{
    FixApplier, ImplementationResult, RpiState, RpiWorkflow, StateTransition, SubagentExecutor,
    TestRunner,
};
