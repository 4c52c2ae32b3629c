//! Per-repository project configuration.
//!
//! Each target repository may carry a `.sdlc/config.yaml` describing the
//! project and where its agent memory bank lives. Absence is non-fatal; the
//! orchestrator falls back to the standard `.sdlc/memories/` layout.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Location of the project config inside a target repository.
pub const PROJECT_CONFIG_PATH: &str = ".sdlc/config.yaml";

/// Default memory-bank directory inside a target repository.
pub const DEFAULT_MEMORY_DIR: &str = ".sdlc/memories";

// ─────────────────────────────────────────────────────────────────────────────
// Project Config
// ─────────────────────────────────────────────────────────────────────────────

/// Project configuration loaded from `.sdlc/config.yaml`.
///
/// The orchestration core treats this as mostly opaque; it only consumes
/// the memory-bank location. The remaining fields ride along for prompt
/// template injection by the agent runner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name.
    pub name: Option<String>,
    /// Project type (`service`, `library`, `dashboard`, ...).
    #[serde(rename = "type")]
    pub project_type: Option<String>,
    /// Human description of the project.
    pub description: Option<String>,
    /// Technology stack, free-form.
    pub tech_stack: serde_json::Map<String, serde_json::Value>,
    /// Skills/capabilities the project advertises to agents.
    pub skills: Vec<String>,
    /// Memory-bank directory relative to the repository root.
    pub memory_dir: Option<String>,
}

impl ProjectConfig {
    /// Resolve the memory-bank path for a target repository directory.
    pub fn memory_path(&self, target_dir: impl AsRef<Path>) -> PathBuf {
        let dir = self.memory_dir.as_deref().unwrap_or(DEFAULT_MEMORY_DIR);
        target_dir.as_ref().join(dir)
    }
}

/// Load the project config from a target repository directory.
///
/// Returns `Ok(None)` when the file does not exist; parse failures are
/// surfaced so a broken config is not silently ignored.
pub fn load_project_config(target_dir: impl AsRef<Path>) -> Result<Option<ProjectConfig>> {
    let path = target_dir.as_ref().join(PROJECT_CONFIG_PATH);
    if !path.exists() {
        return Ok(None);
    }

    let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadFile {
        path: path.display().to_string(),
        source,
    })?;
    let config: ProjectConfig = serde_yaml::from_str(&raw)?;
    debug!(path = %path.display(), "Project config loaded");
    Ok(Some(config))
}

/// Ensure the memory bank exists for a target repository.
///
/// Idempotent; returns the resolved memory directory. The standard layout
/// is `<target>/.sdlc/memories/` unless the project config overrides it.
pub fn ensure_memory_path(
    target_dir: impl AsRef<Path>,
    project: Option<&ProjectConfig>,
) -> Result<PathBuf> {
    let path = match project {
        Some(config) => config.memory_path(&target_dir),
        None => target_dir.as_ref().join(DEFAULT_MEMORY_DIR),
    };
    std::fs::create_dir_all(&path).map_err(|source| ConfigError::CreateDir {
        path: path.display().to_string(),
        source,
    })?;
    Ok(path)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(load_project_config(tmp.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_and_memory_override() {
        let tmp = TempDir::new().unwrap();
        let sdlc = tmp.path().join(".sdlc");
        std::fs::create_dir_all(&sdlc).unwrap();
        std::fs::write(
            sdlc.join("config.yaml"),
            "name: billing\ntype: service\nmemory_dir: .sdlc/brain\nskills: [rust, grpc]\n",
        )
        .unwrap();

        let config = load_project_config(tmp.path()).unwrap().unwrap();
        assert_eq!(config.name.as_deref(), Some("billing"));
        assert_eq!(config.skills, vec!["rust", "grpc"]);
        assert_eq!(config.memory_path(tmp.path()), tmp.path().join(".sdlc/brain"));
    }

    #[test]
    fn test_load_malformed_fails() {
        let tmp = TempDir::new().unwrap();
        let sdlc = tmp.path().join(".sdlc");
        std::fs::create_dir_all(&sdlc).unwrap();
        std::fs::write(sdlc.join("config.yaml"), "name: [unclosed").unwrap();
        assert!(load_project_config(tmp.path()).is_err());
    }

    #[test]
    fn test_ensure_memory_path_default() {
        let tmp = TempDir::new().unwrap();
        let path = ensure_memory_path(tmp.path(), None).unwrap();
        assert_eq!(path, tmp.path().join(".sdlc/memories"));
        assert!(path.is_dir());

        // Idempotent.
        let again = ensure_memory_path(tmp.path(), None).unwrap();
        assert_eq!(again, path);
    }

    #[test]
    fn test_ensure_memory_path_with_config() {
        let tmp = TempDir::new().unwrap();
        let config = ProjectConfig {
            memory_dir: Some(".sdlc/brain".to_string()),
            ..Default::default()
        };
        let path = ensure_memory_path(tmp.path(), Some(&config)).unwrap();
        assert!(path.ends_with(".sdlc/brain"));
        assert!(path.is_dir());
    }
}
