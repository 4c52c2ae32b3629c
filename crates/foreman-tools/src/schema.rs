//! Default schema generation.
//!
//! A small allow-listed set of tools carries hand-authored schemas; every
//! other tool without an explicit schema or custom loader gets a minimal
//! object descriptor.

use serde_json::{Value, json};

use crate::definition::ToolDefinition;

/// Produce the schema for a tool with no explicit schema and no custom
/// loader registered.
pub fn default_schema(tool: &ToolDefinition) -> Value {
    match tool.name.as_str() {
        "Read" => json!({
            "name": "Read",
            "description": "Read file contents",
            "input_schema": {
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path to the file to read"
                    }
                },
                "required": ["file_path"]
            }
        }),
        "search_and_replace" => json!({
            "name": "search_and_replace",
            "description": "Edit file using unique anchor block",
            "input_schema": {
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path to the file to edit"
                    },
                    "find_block": {
                        "type": "string",
                        "description": "Unique anchor block to find (3-5 lines of context)"
                    },
                    "replace_block": {
                        "type": "string",
                        "description": "Content to replace the anchor with"
                    }
                },
                "required": ["file_path", "find_block", "replace_block"]
            }
        }),
        "list_symbols" => json!({
            "name": "list_symbols",
            "description": "List all symbols in a file",
            "input_schema": {
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path to the file"
                    },
                    "kinds": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Filter by symbol kind (class, function, etc.)"
                    }
                },
                "required": ["file_path"]
            }
        }),
        "find_definition" => json!({
            "name": "find_definition",
            "description": "Find where a symbol is defined",
            "input_schema": {
                "type": "object",
                "properties": {
                    "symbol": {
                        "type": "string",
                        "description": "Name of the symbol to find"
                    },
                    "scope": {
                        "type": "string",
                        "description": "Optional scope to narrow the search"
                    }
                },
                "required": ["symbol"]
            }
        }),
        "find_references" => json!({
            "name": "find_references",
            "description": "Find all references to a symbol",
            "input_schema": {
                "type": "object",
                "properties": {
                    "symbol": {
                        "type": "string",
                        "description": "Name of the symbol"
                    },
                    "include_definition": {
                        "type": "boolean",
                        "description": "Include the definition location",
                        "default": true
                    }
                },
                "required": ["symbol"]
            }
        }),
        _ => json!({
            "name": tool.name,
            "description": tool.description,
            "input_schema": {"type": "object", "properties": {}},
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ToolCategory;

    #[test]
    fn test_rich_schema_for_allowlisted_tool() {
        let tool = ToolDefinition::new("Read", "Read file contents", ToolCategory::File);
        let schema = default_schema(&tool);
        assert_eq!(schema["input_schema"]["required"], json!(["file_path"]));
    }

    #[test]
    fn test_generic_schema_for_other_tools() {
        let tool = ToolDefinition::new("git_status", "Get git status", ToolCategory::Git);
        let schema = default_schema(&tool);
        assert_eq!(schema["name"], "git_status");
        assert!(
            schema["input_schema"]["properties"]
                .as_object()
                .unwrap()
                .is_empty()
        );
    }
}
