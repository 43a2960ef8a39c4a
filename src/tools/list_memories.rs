//! MCP `list_memories` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `list_memories` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListMemoriesParams {
    #[schemars(description = "Filter by category: 'decision', 'pattern', 'concept', 'note', 'task'")]
    pub category: Option<String>,

    #[schemars(description = "List only this scope: 'project' or 'global'. Default: every enabled scope")]
    pub scope: Option<String>,

    #[schemars(description = "Maximum number of results. Default: 50")]
    pub limit: Option<usize>,
}
