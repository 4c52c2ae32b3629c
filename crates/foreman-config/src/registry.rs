//! Repository registry.
//!
//! Loads repository definitions from a YAML file and provides lookups for
//! the router and the session orchestrator. The registry is strict on load
//! (unknown keys, duplicate ids, and malformed YAML all fail fast) but
//! accepts runtime registration of discovered repositories.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Default path of the registry file relative to a project root.
pub const DEFAULT_REGISTRY_PATH: &str = "config/repo_registry.yaml";

// ─────────────────────────────────────────────────────────────────────────────
// Repo Config
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for a single routable repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoConfig {
    /// Unique identifier used for routing.
    pub id: String,
    /// What this repository is for; fed verbatim to the routing prompt.
    pub description: String,
    /// GitHub URL of the repository.
    pub github_url: String,
    /// Local checkout path relative to the project root.
    #[serde(default = "default_local_path")]
    pub local_path: String,
    /// Branch agents operate on.
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Whether sandboxed batch code execution is allowed for this repo.
    #[serde(default)]
    pub enable_code_execution: bool,
}

fn default_local_path() -> String {
    "./repos".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

impl RepoConfig {
    /// Create a config with defaults for path, branch, and execution flag.
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        github_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            github_url: github_url.into(),
            local_path: default_local_path(),
            branch: default_branch(),
            enable_code_execution: false,
        }
    }

    /// Repository owner parsed from the GitHub URL, if present.
    pub fn owner(&self) -> Option<&str> {
        let path = self.github_url.split("github.com/").nth(1)?;
        path.split('/').next().filter(|s| !s.is_empty())
    }

    /// Repository name parsed from the GitHub URL, if present.
    pub fn name(&self) -> Option<&str> {
        let path = self.github_url.split("github.com/").nth(1)?;
        path.split('/')
            .nth(1)
            .map(|s| s.trim_end_matches(".git"))
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryFile {
    repositories: Vec<RepoConfig>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Repo Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Catalogue of routable repositories.
///
/// Listing preserves file order; id lookup is `O(1)`.
#[derive(Debug, Default)]
pub struct RepoRegistry {
    repos: Vec<RepoConfig>,
    by_id: HashMap<String, usize>,
}

impl RepoRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the registry from a YAML file.
    ///
    /// Fails on a missing file, malformed YAML, unknown keys, duplicate
    /// ids, or an empty `repositories` list.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::RegistryNotFound(path.display().to_string()));
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;

        let file: RegistryFile = serde_yaml::from_str(&raw)?;
        if file.repositories.is_empty() {
            return Err(ConfigError::EmptyRegistry);
        }

        let mut registry = Self::new();
        for repo in file.repositories {
            if registry.by_id.contains_key(&repo.id) {
                return Err(ConfigError::DuplicateRepo(repo.id));
            }
            registry.insert(repo);
        }

        debug!(count = registry.len(), path = %path.display(), "Repository registry loaded");
        Ok(registry)
    }

    /// Build a registry from in-memory configs (used by tests and discovery
    /// bootstrapping). Later duplicates replace earlier entries.
    pub fn from_configs(configs: impl IntoIterator<Item = RepoConfig>) -> Self {
        let mut registry = Self::new();
        for config in configs {
            registry.register(config);
        }
        registry
    }

    fn insert(&mut self, repo: RepoConfig) {
        self.by_id.insert(repo.id.clone(), self.repos.len());
        self.repos.push(repo);
    }

    /// Register a repository at runtime (discovery auto-registration).
    ///
    /// Replaces any existing entry with the same id in place, preserving
    /// its listing position.
    pub fn register(&mut self, repo: RepoConfig) {
        match self.by_id.get(&repo.id) {
            Some(&idx) => self.repos[idx] = repo,
            None => {
                debug!(id = %repo.id, "Registering repository");
                self.insert(repo);
            }
        }
    }

    /// Get a repository by id.
    pub fn get(&self, repo_id: &str) -> Result<&RepoConfig> {
        self.by_id
            .get(repo_id)
            .map(|&idx| &self.repos[idx])
            .ok_or_else(|| ConfigError::RepoNotFound {
                id: repo_id.to_string(),
                available: if self.repos.is_empty() {
                    "none".to_string()
                } else {
                    self.ids().join(", ")
                },
            })
    }

    /// All repositories in insertion order.
    pub fn all(&self) -> &[RepoConfig] {
        &self.repos
    }

    /// All repository ids in insertion order.
    pub fn ids(&self) -> Vec<String> {
        self.repos.iter().map(|r| r.id.clone()).collect()
    }

    /// Whether a repository id is registered.
    pub fn contains(&self, repo_id: &str) -> bool {
        self.by_id.contains_key(repo_id)
    }

    /// Number of registered repositories.
    pub fn len(&self) -> usize {
        self.repos.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_registry(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const VALID: &str = r#"
repositories:
  - id: auth-service
    description: Authentication and session management service
    github_url: https://github.com/acme/auth-service
  - id: frontend-dashboard
    description: Customer-facing dashboard
    github_url: https://github.com/acme/frontend-dashboard
    local_path: ./repos/dashboard
    branch: develop
    enable_code_execution: true
"#;

    #[test]
    fn test_load_valid_registry() {
        let file = write_registry(VALID);
        let registry = RepoRegistry::load(file.path()).unwrap();

        assert_eq!(registry.len(), 2);
        let auth = registry.get("auth-service").unwrap();
        assert_eq!(auth.local_path, "./repos");
        assert_eq!(auth.branch, "main");
        assert!(!auth.enable_code_execution);

        let dash = registry.get("frontend-dashboard").unwrap();
        assert_eq!(dash.branch, "develop");
        assert!(dash.enable_code_execution);
    }

    #[test]
    fn test_listing_preserves_order() {
        let file = write_registry(VALID);
        let registry = RepoRegistry::load(file.path()).unwrap();
        assert_eq!(registry.ids(), vec!["auth-service", "frontend-dashboard"]);
    }

    #[test]
    fn test_missing_file() {
        let err = RepoRegistry::load("/nonexistent/registry.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::RegistryNotFound(_)));
    }

    #[test]
    fn test_malformed_yaml() {
        let file = write_registry("repositories: [not: closed");
        let err = RepoRegistry::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseYaml(_)));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let file = write_registry(
            r#"
repositories:
  - id: a
    description: d
    github_url: https://github.com/x/a
    surprise: true
"#,
        );
        let err = RepoRegistry::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseYaml(_)));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let file = write_registry(
            r#"
repositories:
  - id: a
    description: first
    github_url: https://github.com/x/a
  - id: a
    description: second
    github_url: https://github.com/x/a2
"#,
        );
        let err = RepoRegistry::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRepo(id) if id == "a"));
    }

    #[test]
    fn test_empty_registry_rejected() {
        let file = write_registry("repositories: []");
        let err = RepoRegistry::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyRegistry));
    }

    #[test]
    fn test_get_unknown_lists_available() {
        let file = write_registry(VALID);
        let registry = RepoRegistry::load(file.path()).unwrap();
        let err = registry.get("nope").unwrap_err();
        assert!(err.to_string().contains("auth-service"));
    }

    #[test]
    fn test_register_discovered_repo() {
        let mut registry = RepoRegistry::new();
        registry.register(RepoConfig::new(
            "billing-api",
            "Billing API",
            "https://github.com/acme/billing-api",
        ));
        assert!(registry.contains("billing-api"));

        // Re-registering replaces in place.
        let mut updated = RepoConfig::new(
            "billing-api",
            "Billing API v2",
            "https://github.com/acme/billing-api",
        );
        updated.branch = "next".to_string();
        registry.register(updated);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("billing-api").unwrap().branch, "next");
    }

    #[test]
    fn test_owner_and_name_parsing() {
        let repo = RepoConfig::new("x", "d", "https://github.com/acme/auth-service.git");
        assert_eq!(repo.owner(), Some("acme"));
        assert_eq!(repo.name(), Some("auth-service"));

        let bad = RepoConfig::new("x", "d", "not-a-url");
        assert_eq!(bad.owner(), None);
        assert_eq!(bad.name(), None);
    }
}
