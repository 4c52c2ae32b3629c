//! Repository discovery seam.
//!
//! Discovery resolves repositories from outside the static registry: a
//! ticket's metadata, a host organisation, a service catalogue. The
//! implementations live with the external clients; the orchestrator only
//! consumes this trait and auto-registers whatever it yields.

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

use foreman_config::RepoConfig;

/// Sources a repository from external systems.
#[async_trait]
pub trait RepoDiscovery: Send + Sync {
    /// Discover the repository a ticket refers to.
    async fn discover_ticket(&self, ticket_id: &str) -> Option<RepoConfig>;

    /// Discover a repository by name or identifier.
    async fn discover_name(&self, name: &str) -> Option<RepoConfig>;
}

/// Extract a likely repository name from a task prompt.
///
/// Matches the fixed phrasing set (`in <name>`, `repo: <name>`,
/// `repository: <name>`), case-insensitively. Returns the first capture.
pub fn extract_repo_name(prompt: &str) -> Option<String> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        [
            r"(?i)\bin\s+([\w-]+)",
            r"(?i)\brepo:\s*([\w-]+)",
            r"(?i)\brepository:\s*([\w-]+)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("discovery pattern must compile"))
        .collect()
    });

    for pattern in patterns {
        if let Some(captures) = pattern.captures(prompt) {
            return Some(captures[1].to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_in_phrase() {
        assert_eq!(
            extract_repo_name("Fix the rate limiter in auth-service"),
            Some("auth-service".to_string())
        );
    }

    #[test]
    fn test_extract_repo_prefix() {
        assert_eq!(
            extract_repo_name("repo: billing-api needs a new endpoint"),
            Some("billing-api".to_string())
        );
        assert_eq!(
            extract_repo_name("Repository: frontend-dashboard"),
            Some("frontend-dashboard".to_string())
        );
    }

    #[test]
    fn test_extract_case_insensitive() {
        assert_eq!(
            extract_repo_name("Add metrics IN payments-service"),
            Some("payments-service".to_string())
        );
    }

    #[test]
    fn test_extract_none() {
        assert_eq!(extract_repo_name("Add idempotency to the payment flow"), None);
        assert_eq!(extract_repo_name(""), None);
    }
}
