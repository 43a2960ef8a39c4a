//! MCP `recall` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `recall` MCP tool. With no `query` it behaves like a filtered list.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RecallParams {
    #[schemars(description = "Search query to find relevant memories")]
    pub query: Option<String>,

    #[schemars(description = "Filter by category: 'decision', 'pattern', 'concept', 'note', 'task'")]
    pub category: Option<String>,

    #[schemars(description = "Search only this scope: 'project' or 'global'. Default: every enabled scope")]
    pub scope: Option<String>,

    #[schemars(description = "Maximum number of results. Default: 10")]
    pub limit: Option<usize>,
}
