//! MCP `remember` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `remember` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RememberParams {
    #[schemars(
        description = "Type of memory: 'decision' (architectural choices), 'pattern' (code conventions), 'concept' (domain knowledge), 'note' (observations), 'task' (work items)"
    )]
    pub category: String,

    #[schemars(description = "Short descriptive title for the memory")]
    pub title: String,

    #[schemars(description = "Full content of the memory")]
    pub content: String,

    #[schemars(description = "Optional tags for categorization")]
    pub tags: Option<Vec<String>>,

    /// 1–5; the configured default when absent.
    #[schemars(description = "Priority score 1-5 (5 is highest). Defaults to the configured importance.")]
    pub importance: Option<u8>,

    #[schemars(
        description = "Memory scope: 'project' (this project only) or 'global' (all projects). Defaults to 'project'."
    )]
    pub scope: Option<String>,
}
