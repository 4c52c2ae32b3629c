//! Configuration system for the Foreman orchestration framework.
//!
//! Two configuration surfaces live here:
//!
//! - The **repository registry**: a YAML catalogue of the repositories a
//!   deployment can route work to ([`RepoRegistry`]).
//! - The **project config**: an optional `.sdlc/config.yaml` inside each
//!   target repository describing the project and its memory-bank location
//!   ([`ProjectConfig`]).

pub mod error;
pub mod project;
pub mod registry;

pub use error::{ConfigError, Result};
pub use project::{ProjectConfig, ensure_memory_path, load_project_config};
pub use registry::{RepoConfig, RepoRegistry};
