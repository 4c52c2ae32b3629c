//! The tool registry.
//!
//! Holds every tool a session could use, keyed by name and organised into
//! categories. Descriptors are cheap to list; schemas load lazily via
//! [`ToolRegistry::get_tool_schema`]. A tool only counts as "in context"
//! once its schema has been fetched at least once.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::debug;

use crate::definition::{ToolCategory, ToolDefinition, ToolDescriptor, ToolSearchResult};
use crate::schema::default_schema;

/// Names of the four discovery meta-tools.
///
/// These are the only tools a fresh session exposes; agents use them to
/// discover (and pay for) everything else on demand.
pub const META_TOOL_NAMES: [&str; 4] = [
    "list_categories",
    "list_tools",
    "get_tool_schema",
    "search_tools",
];

/// A tool definition contributed by an MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolSpec {
    /// Tool name.
    pub name: String,
    /// Short description.
    #[serde(default)]
    pub description: String,
    /// Full input schema, if the server provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

/// Loader producing a schema for a tool on first fetch.
pub type SchemaLoader = Box<dyn Fn(&str) -> Value + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// Tool Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Registry of available tools with progressive disclosure.
pub struct ToolRegistry {
    tools: HashMap<String, ToolDefinition>,
    categories: HashMap<ToolCategory, Vec<String>>,
    loaded_schemas: HashSet<String>,
    schema_loaders: HashMap<String, SchemaLoader>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.len())
            .field("loaded_schemas", &self.loaded_schemas.len())
            .finish()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Create a registry preloaded with the built-in catalogue.
    pub fn new() -> Self {
        let mut registry = Self {
            tools: HashMap::new(),
            categories: HashMap::new(),
            loaded_schemas: HashSet::new(),
            schema_loaders: HashMap::new(),
        };
        for tool in builtin_tools() {
            registry.register(tool);
        }
        registry
    }

    /// Register a tool, replacing any existing definition with the same name.
    pub fn register(&mut self, tool: ToolDefinition) {
        let names = self.categories.entry(tool.category).or_default();
        if !names.contains(&tool.name) {
            names.push(tool.name.clone());
        }
        self.tools.insert(tool.name.clone(), tool);
    }

    /// Bulk-register tools contributed by an MCP server.
    ///
    /// Each tool lands in the [`ToolCategory::Mcp`] category under the
    /// virtual path `servers/<server>/<tool>`.
    pub fn register_mcp_server(&mut self, server_name: &str, tools: &[McpToolSpec]) -> usize {
        let mut registered = 0;
        for spec in tools {
            let mut tool = ToolDefinition::new(
                spec.name.as_str(),
                spec.description.as_str(),
                ToolCategory::Mcp,
            )
            .with_path(format!("servers/{}/{}", server_name, spec.name))
            .with_server(server_name);
            if let Some(schema) = &spec.input_schema {
                tool = tool.with_schema(schema.clone());
            }
            self.register(tool);
            registered += 1;
        }
        debug!(server = server_name, count = registered, "MCP server tools registered");
        registered
    }

    /// Categories that currently hold at least one tool.
    pub fn list_categories(&self) -> Vec<&'static str> {
        ToolCategory::ALL
            .iter()
            .filter(|cat| self.categories.get(cat).is_some_and(|v| !v.is_empty()))
            .map(|cat| cat.as_str())
            .collect()
    }

    /// List tools, optionally filtered by category.
    ///
    /// Descriptors carry no schema unless `include_schemas` is set, in
    /// which case schemas are force-loaded before return. An unknown
    /// category yields an empty list.
    pub fn list_tools(
        &mut self,
        category: Option<&str>,
        include_schemas: bool,
    ) -> Vec<ToolDescriptor> {
        let names: Vec<String> = match category {
            Some(cat) => match ToolCategory::parse(cat) {
                Some(cat) => self.categories.get(&cat).cloned().unwrap_or_default(),
                None => return Vec::new(),
            },
            None => {
                let mut all = Vec::new();
                for cat in ToolCategory::ALL {
                    if let Some(names) = self.categories.get(&cat) {
                        all.extend(names.iter().cloned());
                    }
                }
                all
            }
        };

        names
            .iter()
            .filter_map(|name| {
                if include_schemas {
                    self.ensure_schema(name);
                }
                let tool = self.tools.get(name)?;
                let mut descriptor = tool.descriptor();
                if include_schemas {
                    descriptor.schema = Some(tool.full_schema());
                }
                Some(descriptor)
            })
            .collect()
    }

    /// Get the full schema for a tool, loading it on first call.
    ///
    /// Bumps the usage counter and stamps `last_used`. Returns `None` for
    /// unknown tools.
    pub fn get_tool_schema(&mut self, tool_name: &str) -> Option<Value> {
        if !self.tools.contains_key(tool_name) {
            return None;
        }
        self.ensure_schema(tool_name);

        let tool = self.tools.get_mut(tool_name)?;
        tool.usage_count += 1;
        tool.last_used = Some(Utc::now());
        self.loaded_schemas.insert(tool_name.to_string());
        Some(tool.full_schema())
    }

    fn ensure_schema(&mut self, tool_name: &str) {
        let Some(tool) = self.tools.get(tool_name) else {
            return;
        };
        if tool.schema_loaded {
            return;
        }

        let schema = match self.schema_loaders.get(tool_name) {
            Some(loader) => loader(tool_name),
            None => default_schema(tool),
        };

        if let Some(tool) = self.tools.get_mut(tool_name) {
            tool.schema = Some(schema);
            tool.schema_loaded = true;
        }
    }

    /// Keyword search over names, descriptions, and virtual paths.
    ///
    /// Scoring: name substring +10, each query word found in the
    /// description +2, path substring +3. Results are sorted by score and
    /// truncated to `limit`.
    pub fn search_tools(
        &self,
        query: &str,
        categories: Option<&[String]>,
        limit: usize,
    ) -> ToolSearchResult {
        let query_lower = query.to_lowercase();
        let query_words: Vec<&str> = query_lower.split_whitespace().collect();

        let category_filter: Option<Vec<ToolCategory>> = categories.map(|cats| {
            cats.iter()
                .filter_map(|c| ToolCategory::parse(c))
                .collect()
        });

        let mut matches: Vec<(&ToolDefinition, u32)> = self
            .tools
            .values()
            .filter(|tool| {
                category_filter
                    .as_ref()
                    .is_none_or(|cats| cats.contains(&tool.category))
            })
            .filter_map(|tool| {
                let mut score = 0u32;
                if tool.name.to_lowercase().contains(&query_lower) {
                    score += 10;
                }
                let desc_lower = tool.description.to_lowercase();
                for word in &query_words {
                    if desc_lower.contains(word) {
                        score += 2;
                    }
                }
                if tool.path.to_lowercase().contains(&query_lower) {
                    score += 3;
                }
                (score > 0).then_some((tool, score))
            })
            .collect();

        matches.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.name.cmp(&b.0.name)));
        let total_matches = matches.len();

        let categories_searched = match &category_filter {
            Some(cats) => cats.clone(),
            None => ToolCategory::ALL
                .iter()
                .filter(|cat| self.categories.get(cat).is_some_and(|v| !v.is_empty()))
                .copied()
                .collect(),
        };

        ToolSearchResult {
            tools: matches
                .into_iter()
                .take(limit)
                .map(|(tool, _)| tool.descriptor())
                .collect(),
            query: query.to_string(),
            total_matches,
            categories_searched,
        }
    }

    /// Get a tool definition by name.
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// Names of tools whose schemas have been fetched.
    pub fn loaded_schemas(&self) -> Vec<String> {
        self.loaded_schemas.iter().cloned().collect()
    }

    /// Whether a tool's schema has been fetched (the tool is "in context").
    pub fn is_schema_loaded(&self, name: &str) -> bool {
        self.loaded_schemas.contains(name)
    }

    /// Install a custom schema loader for a tool.
    pub fn set_schema_loader(&mut self, tool_name: impl Into<String>, loader: SchemaLoader) {
        self.schema_loaders.insert(tool_name.into(), loader);
    }

    /// Usage statistics keyed by tool name.
    pub fn usage_stats(&self) -> Value {
        let stats: serde_json::Map<String, Value> = self
            .tools
            .values()
            .map(|tool| {
                (
                    tool.name.clone(),
                    json!({
                        "usage_count": tool.usage_count,
                        "last_used": tool.last_used.map(|t| t.to_rfc3339()),
                        "schema_loaded": tool.schema_loaded,
                    }),
                )
            })
            .collect();
        Value::Object(stats)
    }

    /// Project the registry as a virtual directory tree.
    pub fn filesystem_view(&self) -> Value {
        let mut tree = serde_json::Map::new();
        'tools: for tool in self.tools.values() {
            let parts: Vec<&str> = tool.path.split('/').collect();
            let Some((leaf, dirs)) = parts.split_last() else {
                continue;
            };

            let mut current = &mut tree;
            for part in dirs {
                let entry = current
                    .entry(part.to_string())
                    .or_insert_with(|| json!({}));
                if !entry.is_object() {
                    *entry = json!({});
                }
                match entry.as_object_mut() {
                    Some(obj) => current = obj,
                    None => continue 'tools,
                }
            }

            current.insert(
                leaf.to_string(),
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "read_only": tool.read_only,
                }),
            );
        }
        Value::Object(tree)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Meta-tools
    // ─────────────────────────────────────────────────────────────────────

    /// Descriptors for the four meta-tools, with full schemas inlined.
    ///
    /// Meta-tools are cheap enough to carry their schemas up front; they
    /// are the whole initial tool surface of a session.
    pub fn meta_tool_descriptors() -> Vec<Value> {
        vec![
            json!({
                "name": "list_categories",
                "description": "List available tool categories",
                "input_schema": {"type": "object", "properties": {}},
            }),
            json!({
                "name": "list_tools",
                "description": "List tools, optionally filtered by category",
                "input_schema": {
                    "type": "object",
                    "properties": {
                        "category": {"type": "string", "description": "Category filter"},
                        "include_schemas": {
                            "type": "boolean",
                            "description": "Load full schemas (higher token cost)",
                            "default": false
                        }
                    }
                },
            }),
            json!({
                "name": "get_tool_schema",
                "description": "Get the full input schema for a tool",
                "input_schema": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string", "description": "Tool name"}
                    },
                    "required": ["name"]
                },
            }),
            json!({
                "name": "search_tools",
                "description": "Keyword search for tools by capability",
                "input_schema": {
                    "type": "object",
                    "properties": {
                        "query": {"type": "string", "description": "What you need to do"},
                        "categories": {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "Restrict to these categories"
                        },
                        "limit": {"type": "integer", "default": 10}
                    },
                    "required": ["query"]
                },
            }),
        ]
    }

    /// Dispatch a meta-tool call from its wire-level JSON arguments.
    ///
    /// Failures come back as a tool result with `is_error: true` rather
    /// than an error, matching the tool invocation contract.
    pub fn dispatch_meta(&mut self, tool: &str, params: &Value) -> Value {
        match tool {
            "list_categories" => json!({"categories": self.list_categories()}),
            "list_tools" => {
                let category = params.get("category").and_then(|v| v.as_str());
                let include_schemas = params
                    .get("include_schemas")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                let tools = self.list_tools(category, include_schemas);
                json!({"tools": tools})
            }
            "get_tool_schema" => {
                let Some(name) = params.get("name").and_then(|v| v.as_str()) else {
                    return meta_error("missing required parameter 'name'");
                };
                match self.get_tool_schema(name) {
                    Some(schema) => schema,
                    None => Value::Null,
                }
            }
            "search_tools" => {
                let Some(query) = params.get("query").and_then(|v| v.as_str()) else {
                    return meta_error("missing required parameter 'query'");
                };
                let categories: Option<Vec<String>> =
                    params.get("categories").and_then(|v| v.as_array()).map(|a| {
                        a.iter()
                            .filter_map(|v| v.as_str().map(String::from))
                            .collect()
                    });
                let limit = params
                    .get("limit")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(10) as usize;
                let result = self.search_tools(query, categories.as_deref(), limit);
                serde_json::to_value(result).unwrap_or_else(|_| meta_error("serialization failed"))
            }
            other => meta_error(format!(
                "unknown meta-tool '{other}'. Valid meta-tools: {}",
                META_TOOL_NAMES.join(", ")
            )),
        }
    }
}

fn meta_error(message: impl Into<String>) -> Value {
    json!({"is_error": true, "error": message.into()})
}

// ─────────────────────────────────────────────────────────────────────────────
// Built-in Catalogue
// ─────────────────────────────────────────────────────────────────────────────

fn builtin_tools() -> Vec<ToolDefinition> {
    use ToolCategory::*;
    vec![
        // File tools
        ToolDefinition::new("Read", "Read file contents", File).with_path("file/read"),
        ToolDefinition::new("Write", "Write content to a file", File)
            .with_path("file/write")
            .writable()
            .confirmed(),
        ToolDefinition::new("Grep", "Search for patterns in files", File).with_path("file/grep"),
        ToolDefinition::new("Glob", "Find files matching a pattern", File).with_path("file/glob"),
        // Code tools
        ToolDefinition::new(
            "search_and_replace",
            "Edit file using unique anchor block (NOT line numbers)",
            Code,
        )
        .with_path("code/edit")
        .writable()
        .confirmed(),
        // Navigation tools
        ToolDefinition::new(
            "list_symbols",
            "List all symbols (classes, functions) in a file",
            Navigation,
        ),
        ToolDefinition::new("find_definition", "Find where a symbol is defined", Navigation),
        ToolDefinition::new("find_references", "Find all references to a symbol", Navigation),
        ToolDefinition::new("get_call_graph", "Build dependency graph for a function", Navigation),
        // Execution tools
        ToolDefinition::new("Bash", "Execute bash commands", Execution)
            .with_path("execution/bash")
            .writable()
            .confirmed(),
        ToolDefinition::new("execute_script", "Execute script in a sandboxed container", Execution)
            .with_path("execution/docker")
            .writable()
            .confirmed(),
        // Git tools
        ToolDefinition::new("git_status", "Get git repository status", Git).with_path("git/status"),
        ToolDefinition::new("git_diff", "Get diff of changes", Git).with_path("git/diff"),
        ToolDefinition::new("git_commit", "Create a commit", Git)
            .with_path("git/commit")
            .writable()
            .confirmed(),
        ToolDefinition::new("create_pull_request", "Create a pull request", Git)
            .with_path("git/create_pr")
            .writable()
            .confirmed(),
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared Registry
// ─────────────────────────────────────────────────────────────────────────────

/// A registry shared across sessions and their forks.
pub type SharedToolRegistry = Arc<RwLock<ToolRegistry>>;

/// Wrap a registry for sharing.
pub fn shared_registry(registry: ToolRegistry) -> SharedToolRegistry {
    Arc::new(RwLock::new(registry))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = ToolRegistry::new();
        assert!(registry.get("Read").is_some());
        assert!(registry.get("create_pull_request").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_list_categories_only_nonempty() {
        let registry = ToolRegistry::new();
        let categories = registry.list_categories();
        assert!(categories.contains(&"file"));
        assert!(categories.contains(&"git"));
        // No builtins in api/analysis/mcp.
        assert!(!categories.contains(&"api"));
        assert!(!categories.contains(&"mcp"));
    }

    #[test]
    fn test_categories_cover_all_listed_tools() {
        let mut registry = ToolRegistry::new();
        let categories = registry.list_categories();
        for tool in registry.list_tools(None, false) {
            assert!(
                categories.contains(&tool.category.as_str()),
                "category {} missing from list_categories",
                tool.category.as_str()
            );
        }
    }

    #[test]
    fn test_list_tools_by_category() {
        let mut registry = ToolRegistry::new();
        let nav = registry.list_tools(Some("navigation"), false);
        let names: Vec<&str> = nav.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["list_symbols", "find_definition", "find_references", "get_call_graph"]
        );
        // Descriptors are schema-free by default.
        assert!(nav.iter().all(|t| t.schema.is_none()));
    }

    #[test]
    fn test_list_tools_unknown_category_empty() {
        let mut registry = ToolRegistry::new();
        assert!(registry.list_tools(Some("bogus"), false).is_empty());
    }

    #[test]
    fn test_list_tools_with_schemas_forces_load() {
        let mut registry = ToolRegistry::new();
        let tools = registry.list_tools(Some("file"), true);
        assert!(tools.iter().all(|t| t.schema.is_some()));
        assert!(registry.get("Read").unwrap().schema_loaded);
    }

    #[test]
    fn test_lazy_schema_loading() {
        let mut registry = ToolRegistry::new();
        assert!(!registry.get("Read").unwrap().schema_loaded);
        assert!(registry.loaded_schemas().is_empty());

        let schema = registry.get_tool_schema("Read").unwrap();
        assert_eq!(schema["input_schema"]["required"], json!(["file_path"]));

        let tool = registry.get("Read").unwrap();
        assert!(tool.schema_loaded);
        assert_eq!(tool.usage_count, 1);
        assert!(tool.last_used.is_some());
        assert!(registry.loaded_schemas().contains(&"Read".to_string()));
        assert!(registry.is_schema_loaded("Read"));
    }

    #[test]
    fn test_schema_for_unknown_tool_is_none() {
        let mut registry = ToolRegistry::new();
        assert!(registry.get_tool_schema("not_a_tool").is_none());
    }

    #[test]
    fn test_usage_counter_monotonic() {
        let mut registry = ToolRegistry::new();
        registry.get_tool_schema("Grep");
        registry.get_tool_schema("Grep");
        registry.get_tool_schema("Grep");
        assert_eq!(registry.get("Grep").unwrap().usage_count, 3);
    }

    #[test]
    fn test_custom_schema_loader() {
        let mut registry = ToolRegistry::new();
        registry.set_schema_loader(
            "Bash",
            Box::new(|name| json!({"name": name, "custom": true})),
        );
        let schema = registry.get_tool_schema("Bash").unwrap();
        assert_eq!(schema["custom"], true);
    }

    #[test]
    fn test_register_mcp_server() {
        let mut registry = ToolRegistry::new();
        let count = registry.register_mcp_server(
            "github",
            &[
                McpToolSpec {
                    name: "get_pr".to_string(),
                    description: "Fetch a pull request".to_string(),
                    input_schema: None,
                },
                McpToolSpec {
                    name: "create_issue".to_string(),
                    description: "Open an issue".to_string(),
                    input_schema: Some(json!({"type": "object"})),
                },
            ],
        );
        assert_eq!(count, 2);

        let tool = registry.get("get_pr").unwrap();
        assert_eq!(tool.category, ToolCategory::Mcp);
        assert_eq!(tool.path, "servers/github/get_pr");
        assert_eq!(tool.server.as_deref(), Some("github"));

        // Pre-supplied schemas count as loaded.
        assert!(registry.get("create_issue").unwrap().schema_loaded);
        assert!(registry.list_categories().contains(&"mcp"));
    }

    #[test]
    fn test_search_scoring() {
        let registry = ToolRegistry::new();

        // Name substring dominates.
        let result = registry.search_tools("grep", None, 10);
        assert_eq!(result.tools[0].name, "Grep");
        assert!(result.total_matches >= 1);

        // Description words match.
        let result = registry.search_tools("pull request", None, 10);
        assert_eq!(result.tools[0].name, "create_pull_request");
    }

    #[test]
    fn test_search_category_filter_and_limit() {
        let registry = ToolRegistry::new();
        let cats = vec!["navigation".to_string()];
        let result = registry.search_tools("symbol", Some(&cats), 2);
        assert!(result.tools.len() <= 2);
        assert!(
            result
                .tools
                .iter()
                .all(|t| t.category == ToolCategory::Navigation)
        );
        assert_eq!(result.categories_searched, vec![ToolCategory::Navigation]);
    }

    #[test]
    fn test_search_no_match() {
        let registry = ToolRegistry::new();
        let result = registry.search_tools("zzzzz", None, 10);
        assert!(result.tools.is_empty());
        assert_eq!(result.total_matches, 0);
    }

    #[test]
    fn test_filesystem_view() {
        let mut registry = ToolRegistry::new();
        registry.register_mcp_server(
            "linear",
            &[McpToolSpec {
                name: "get_issue".to_string(),
                description: "Fetch an issue".to_string(),
                input_schema: None,
            }],
        );

        let tree = registry.filesystem_view();
        assert_eq!(tree["file"]["read"]["name"], "Read");
        assert_eq!(tree["file"]["write"]["read_only"], false);
        assert_eq!(tree["servers"]["linear"]["get_issue"]["name"], "get_issue");
    }

    #[test]
    fn test_meta_tool_descriptors() {
        let descriptors = ToolRegistry::meta_tool_descriptors();
        assert_eq!(descriptors.len(), 4);
        let names: Vec<&str> = descriptors
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, META_TOOL_NAMES);
    }

    #[test]
    fn test_dispatch_meta_list_categories() {
        let mut registry = ToolRegistry::new();
        let result = registry.dispatch_meta("list_categories", &json!({}));
        assert!(
            result["categories"]
                .as_array()
                .unwrap()
                .contains(&json!("file"))
        );
    }

    #[test]
    fn test_dispatch_meta_get_schema() {
        let mut registry = ToolRegistry::new();
        let result = registry.dispatch_meta("get_tool_schema", &json!({"name": "Read"}));
        assert_eq!(result["name"], "Read");

        // Unknown tool dispatches to null, not an error.
        let missing = registry.dispatch_meta("get_tool_schema", &json!({"name": "nope"}));
        assert!(missing.is_null());

        // Missing parameter is a tool error.
        let bad = registry.dispatch_meta("get_tool_schema", &json!({}));
        assert_eq!(bad["is_error"], true);
    }

    #[test]
    fn test_dispatch_meta_search() {
        let mut registry = ToolRegistry::new();
        let result = registry.dispatch_meta(
            "search_tools",
            &json!({"query": "commit", "limit": 3}),
        );
        assert!(result["total_matches"].as_u64().unwrap() >= 1);
        assert_eq!(result["tools"][0]["name"], "git_commit");
    }

    #[test]
    fn test_dispatch_meta_unknown_tool() {
        let mut registry = ToolRegistry::new();
        let result = registry.dispatch_meta("explode", &json!({}));
        assert_eq!(result["is_error"], true);
        assert!(result["error"].as_str().unwrap().contains("explode"));
    }
}
