//! Progressive tool registry for the Foreman orchestration framework.
//!
//! Implements the "tools as filesystem" pattern: tools live in a virtual
//! directory structure organised by category, descriptors are cheap, and
//! full input schemas are loaded lazily on first use.
//!
//! A fresh session sees only the four **meta-tools**
//! (`list_categories`, `list_tools`, `get_tool_schema`, `search_tools`);
//! everything else is discovered and paid for on demand, keeping the
//! initial context to a handful of descriptors instead of dozens of full
//! schemas.

pub mod definition;
pub mod registry;
pub mod schema;

pub use definition::{ToolCategory, ToolDefinition, ToolDescriptor, ToolSearchResult};
pub use registry::{
    META_TOOL_NAMES, McpToolSpec, SchemaLoader, SharedToolRegistry, ToolRegistry, shared_registry,
};
