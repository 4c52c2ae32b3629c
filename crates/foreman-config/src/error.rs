//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to create a directory the config requires.
    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },

    /// Registry file missing at the expected path.
    #[error("registry configuration file not found: {0}")]
    RegistryNotFound(String),

    /// Failed to parse YAML.
    #[error("failed to parse YAML config: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    /// Registry contains no repositories.
    #[error("registry configuration has an empty 'repositories' list")]
    EmptyRegistry,

    /// Two registry entries share an id.
    #[error("duplicate repository id '{0}' in registry")]
    DuplicateRepo(String),

    /// Lookup for an unregistered repository id.
    #[error("repository '{id}' not found. Available repositories: {available}")]
    RepoNotFound { id: String, available: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_not_found_display() {
        let err = ConfigError::RepoNotFound {
            id: "svc-x".to_string(),
            available: "svc-a, svc-b".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("svc-x"));
        assert!(msg.contains("svc-a, svc-b"));
    }
}
