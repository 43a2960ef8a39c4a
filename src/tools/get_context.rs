//! MCP `get_context` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `get_context` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetContextParams {
    #[schemars(
        description = "Which categories to include ('decision', 'pattern', 'concept', 'note', 'task'). Default: all"
    )]
    pub categories: Option<Vec<String>>,

    /// Characters allowed are `max_tokens * 4`.
    #[schemars(description = "Approximate token budget for context. Defaults to the configured max_context_tokens.")]
    pub max_tokens: Option<usize>,
}
