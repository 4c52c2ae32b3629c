//! Session contexts, isolated forking, the context firewall, and the
//! context compactor.
//!
//! Three disciplines live in this crate:
//!
//! - [`SessionContext`]: the per-task execution envelope, able to fork
//!   isolated sub-sessions that inherit configuration but never
//!   conversation history.
//! - [`ContextFirewall`]: tracks live forks, bounds their fan-out, and
//!   finalises them so only a distilled [`FirewallResult`] ever reaches
//!   the parent.
//! - [`ContextCompactor`]: converts messy research findings into a summary
//!   or a concrete plan — the compaction point between the high-noise
//!   research phase and disciplined implementation.
//!
//! [`FirewallResult`]: foreman_types::FirewallResult

pub mod clients;
pub mod compactor;
pub mod firewall;
pub mod session;

pub use clients::{CodeExecutor, RepoContext, ServiceClient, ServiceClients};
pub use compactor::{
    CompactionResult, CompactionStrategy, ContextCompactor, DraftStep, ResearchSummary,
};
pub use firewall::{ContextFirewall, FirewallError, ForkReport};
pub use session::{AgentSettings, IsolationLevel, SessionContext, TokenBudgetExceeded};
