//! Tool categories and definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

// ─────────────────────────────────────────────────────────────────────────────
// Tool Category
// ─────────────────────────────────────────────────────────────────────────────

/// Categories organising the virtual tool filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    /// File operations (read, write, search).
    File,
    /// Code-specific edits.
    Code,
    /// Structural code navigation (symbols, references).
    Navigation,
    /// Command and script execution.
    Execution,
    /// Git operations.
    Git,
    /// External API calls.
    Api,
    /// Code analysis.
    Analysis,
    /// Tools contributed by MCP servers.
    Mcp,
}

impl ToolCategory {
    /// All categories in display order.
    pub const ALL: [ToolCategory; 8] = [
        ToolCategory::File,
        ToolCategory::Code,
        ToolCategory::Navigation,
        ToolCategory::Execution,
        ToolCategory::Git,
        ToolCategory::Api,
        ToolCategory::Analysis,
        ToolCategory::Mcp,
    ];

    /// Stable string form used on the wire and in virtual paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCategory::File => "file",
            ToolCategory::Code => "code",
            ToolCategory::Navigation => "navigation",
            ToolCategory::Execution => "execution",
            ToolCategory::Git => "git",
            ToolCategory::Api => "api",
            ToolCategory::Analysis => "analysis",
            ToolCategory::Mcp => "mcp",
        }
    }

    /// Parse from the wire form.
    pub fn parse(s: &str) -> Option<ToolCategory> {
        ToolCategory::ALL.iter().copied().find(|c| c.as_str() == s)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Definition
// ─────────────────────────────────────────────────────────────────────────────

/// A registered tool.
///
/// The descriptor fields are always present; the full input schema sits in
/// a lazy slot and is only materialised when an agent asks for it.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    /// Tool name, the dispatch key.
    pub name: String,
    /// Short description shown in listings and search results.
    pub description: String,
    /// Category in the virtual filesystem.
    pub category: ToolCategory,
    /// Virtual path, e.g. `file/read` or `servers/github/get_pr`.
    pub path: String,
    /// Owning MCP server, when applicable.
    pub server: Option<String>,
    /// Full input schema, populated lazily.
    pub schema: Option<Value>,
    /// Whether the schema slot has been populated.
    pub schema_loaded: bool,
    /// How many times the schema has been fetched.
    pub usage_count: u64,
    /// When the schema was last fetched.
    pub last_used: Option<DateTime<Utc>>,
    /// Whether the tool only reads state.
    pub read_only: bool,
    /// Whether invocation needs user confirmation.
    pub requires_confirmation: bool,
}

impl ToolDefinition {
    /// Create a read-only definition with the default `category/name` path.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: ToolCategory,
    ) -> Self {
        let name = name.into();
        let path = format!("{}/{}", category.as_str(), name);
        Self {
            name,
            description: description.into(),
            category,
            path,
            server: None,
            schema: None,
            schema_loaded: false,
            usage_count: 0,
            last_used: None,
            read_only: true,
            requires_confirmation: false,
        }
    }

    /// Override the virtual path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Attach the owning MCP server name.
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    /// Provide the full schema up front.
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self.schema_loaded = true;
        self
    }

    /// Mark the tool as mutating state.
    pub fn writable(mut self) -> Self {
        self.read_only = false;
        self
    }

    /// Mark the tool as requiring user confirmation.
    pub fn confirmed(mut self) -> Self {
        self.requires_confirmation = true;
        self
    }

    /// Cheap serializable descriptor, without the schema.
    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            category: self.category,
            path: self.path.clone(),
            server: self.server.clone(),
            read_only: self.read_only,
            requires_confirmation: self.requires_confirmation,
            schema: None,
        }
    }

    /// The full schema for API consumption, synthesising a minimal one when
    /// none has been loaded.
    pub fn full_schema(&self) -> Value {
        match &self.schema {
            Some(schema) => schema.clone(),
            None => json!({
                "name": self.name,
                "description": self.description,
                "input_schema": {"type": "object", "properties": {}},
            }),
        }
    }
}

/// Serializable view of a tool, optionally carrying its schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub category: ToolCategory,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    pub read_only: bool,
    pub requires_confirmation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

/// Result of a keyword tool search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSearchResult {
    /// Matching tools, best first, truncated to the requested limit.
    pub tools: Vec<ToolDescriptor>,
    /// The original query.
    pub query: String,
    /// Matches before truncation.
    pub total_matches: usize,
    /// Categories the search considered.
    pub categories_searched: Vec<ToolCategory>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip() {
        for cat in ToolCategory::ALL {
            assert_eq!(ToolCategory::parse(cat.as_str()), Some(cat));
        }
        assert_eq!(ToolCategory::parse("bogus"), None);
    }

    #[test]
    fn test_default_path() {
        let tool = ToolDefinition::new("Read", "Read file contents", ToolCategory::File);
        assert_eq!(tool.path, "file/Read");
        assert!(tool.read_only);
        assert!(!tool.schema_loaded);
    }

    #[test]
    fn test_full_schema_synthesised() {
        let tool = ToolDefinition::new("Grep", "Search files", ToolCategory::File);
        let schema = tool.full_schema();
        assert_eq!(schema["name"], "Grep");
        assert_eq!(schema["input_schema"]["type"], "object");
    }

    #[test]
    fn test_with_schema_marks_loaded() {
        let tool = ToolDefinition::new("x", "y", ToolCategory::Mcp)
            .with_schema(json!({"name": "x", "input_schema": {"type": "object"}}));
        assert!(tool.schema_loaded);
        assert_eq!(tool.full_schema()["name"], "x");
    }
}
