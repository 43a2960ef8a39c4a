//! MCP `update_memory` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `update_memory` MCP tool. Omitted fields are left unchanged.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateMemoryParams {
    #[schemars(description = "The ID of the memory to update")]
    pub id: String,

    #[schemars(description = "New title")]
    pub title: Option<String>,

    #[schemars(description = "New content")]
    pub content: Option<String>,

    #[schemars(description = "Replacement tag list")]
    pub tags: Option<Vec<String>>,

    #[schemars(description = "New priority score 1-5")]
    pub importance: Option<u8>,
}
