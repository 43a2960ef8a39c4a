pub mod forget;
pub mod get_context;
pub mod list_memories;
pub mod recall;
pub mod remember;
pub mod resources;
pub mod update_memory;

use forget::ForgetParams;
use get_context::GetContextParams;
use list_memories::ListMemoriesParams;
use recall::RecallParams;
use remember::RememberParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    ListResourcesResult, PaginatedRequestParams, ReadResourceRequestParams, ReadResourceResult,
};
use rmcp::service::RequestContext;
use rmcp::{tool, tool_handler, tool_router, ErrorData, RoleServer, ServerHandler};
use std::sync::Arc;
use update_memory::UpdateMemoryParams;

use lumencore::memory::types::{
    Category, ContextOptions, CreateMemoryInput, ListOptions, Memory, Scope, SearchOptions,
    UpdateMemoryInput,
};
use lumencore::memory::MemoryCore;

/// The LumenCore MCP tool handler. Holds the memory and search services for one
/// project and exposes them as MCP tools via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct LumenTools {
    tool_router: ToolRouter<Self>,
    core: Arc<MemoryCore>,
}

#[tool_router]
impl LumenTools {
    pub fn new(core: Arc<MemoryCore>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            core,
        }
    }

    /// Store a new memory.
    #[tool(description = "Store a new memory. Use this to save important project knowledge: decisions, patterns, concepts, notes, or tasks.")]
    async fn remember(
        &self,
        Parameters(params): Parameters<RememberParams>,
    ) -> Result<String, String> {
        let category: Category = params.category.parse()?;
        let scope = parse_optional::<Scope>(params.scope.as_deref())?;
        if let Some(importance) = params.importance {
            check_importance(importance)?;
        }

        tracing::info!(
            category = %category,
            title_len = params.title.len(),
            content_len = params.content.len(),
            "remember called"
        );

        let input = CreateMemoryInput {
            category,
            title: params.title,
            content: params.content,
            tags: params.tags,
            importance: params.importance,
            scope,
        };
        let memory = self
            .run(move |core| core.memories.create(input))
            .await?;

        tracing::info!(id = %memory.id, scope = %memory.scope, "memory stored");
        Ok(format!(
            "Memory stored successfully.\nID: {}\nTitle: {}\nCategory: {}\nScope: {}",
            memory.id, memory.title, memory.category, memory.scope
        ))
    }

    /// Keyword search over stored memories.
    #[tool(description = "Search and retrieve memories by query or filters. Results are ordered by importance, then recency.")]
    async fn recall(
        &self,
        Parameters(params): Parameters<RecallParams>,
    ) -> Result<String, String> {
        let options = SearchOptions {
            query: params.query,
            category: parse_optional(params.category.as_deref())?,
            scope: parse_optional(params.scope.as_deref())?,
            limit: params.limit,
        };
        tracing::info!(query = ?options.query, "recall called");

        let memories = self
            .run(move |core| core.search.search(&options))
            .await?;
        Ok(render_recall(&memories))
    }

    /// Delete a memory by id.
    #[tool(description = "Delete a memory by its ID.")]
    async fn forget(
        &self,
        Parameters(params): Parameters<ForgetParams>,
    ) -> Result<String, String> {
        let id = params.id;
        tracing::info!(id = %id, "forget called");

        let target = id.clone();
        let deleted = self
            .run(move |core| core.memories.delete(&target))
            .await?;

        if deleted {
            Ok(format!("Memory {id} deleted successfully."))
        } else {
            Ok(format!("Memory {id} not found."))
        }
    }

    /// List memories with optional filters.
    #[tool(description = "List all memories with optional filtering by category or scope.")]
    async fn list_memories(
        &self,
        Parameters(params): Parameters<ListMemoriesParams>,
    ) -> Result<String, String> {
        let options = ListOptions {
            category: parse_optional(params.category.as_deref())?,
            scope: parse_optional(params.scope.as_deref())?,
            limit: params.limit,
        };
        tracing::info!("list_memories called");

        let memories = self
            .run(move |core| core.memories.list(&options))
            .await?;
        Ok(render_list(&memories))
    }

    /// Bootstrap context for a new session.
    #[tool(description = "Get a summary of project knowledge for session bootstrapping. Call this at the start of a session to load relevant context.")]
    async fn get_context(
        &self,
        Parameters(params): Parameters<GetContextParams>,
    ) -> Result<String, String> {
        let categories = params
            .categories
            .unwrap_or_default()
            .iter()
            .map(|c| c.parse::<Category>())
            .collect::<Result<Vec<_>, _>>()?;
        let options = ContextOptions {
            categories,
            max_tokens: params.max_tokens,
        };
        tracing::info!(max_tokens = ?options.max_tokens, "get_context called");

        self.run(move |core| core.search.get_context(&options)).await
    }

    /// Partially update an existing memory.
    #[tool(description = "Update the title, content, tags, or importance of an existing memory. Omitted fields are unchanged.")]
    async fn update_memory(
        &self,
        Parameters(params): Parameters<UpdateMemoryParams>,
    ) -> Result<String, String> {
        if let Some(importance) = params.importance {
            check_importance(importance)?;
        }
        let id = params.id.clone();
        tracing::info!(id = %id, "update_memory called");

        let input = UpdateMemoryInput {
            id: params.id,
            title: params.title,
            content: params.content,
            tags: params.tags,
            importance: params.importance,
        };
        let updated = self
            .run(move |core| core.memories.update(input))
            .await?;

        match updated {
            Some(memory) => Ok(format!(
                "Memory updated successfully.\nID: {}\nTitle: {}\nImportance: {}\nUpdated: {}",
                memory.id, memory.title, memory.importance, memory.updated_at
            )),
            None => Ok(format!("Memory {id} not found.")),
        }
    }

    /// Record counts per store.
    #[tool(description = "Get memory counts for this project and, when enabled, the global store.")]
    async fn memory_stats(&self) -> Result<String, String> {
        tracing::info!("memory_stats called");
        let stats = self.run(|core| core.memories.get_stats()).await?;
        serde_json::to_string(&stats).map_err(|e| format!("serialization failed: {e}"))
    }
}

impl LumenTools {
    /// Run a synchronous service call on the blocking pool.
    async fn run<T, F>(&self, f: F) -> Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce(&MemoryCore) -> lumencore::Result<T> + Send + 'static,
    {
        let core = Arc::clone(&self.core);
        tokio::task::spawn_blocking(move || f(&core))
            .await
            .map_err(|e| format!("db task failed: {e}"))?
            .map_err(|e| {
                tracing::warn!(error = %e, "tool call failed");
                format!("Error: {e}")
            })
    }
}

#[tool_handler]
impl ServerHandler for LumenTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "LumenCore is a persistent project memory. Call get_context at the start of a \
                 session, remember to save knowledge, and recall to search it. The memory:// \
                 resources browse decisions, patterns, concepts and recent memories."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            ..Default::default()
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        Ok(ListResourcesResult::with_all_items(resources::list()))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        let uri = request.uri;
        tracing::info!(uri = %uri, "read_resource called");

        let text = match resources::category_for(&uri) {
            Some(category) => {
                let options = ListOptions {
                    category,
                    scope: None,
                    limit: Some(resources::READ_LIMIT),
                };
                let memories = self
                    .run(move |core| core.memories.list(&options))
                    .await
                    .map_err(|e| ErrorData::internal_error(e, None))?;
                resources::render(&memories)
            }
            None => resources::unknown(&uri),
        };

        Ok(ReadResourceResult {
            contents: vec![resources::text_contents(&uri, text)],
        })
    }
}

fn parse_optional<T>(value: Option<&str>) -> Result<Option<T>, String>
where
    T: std::str::FromStr<Err = String>,
{
    value.map(str::parse).transpose()
}

fn check_importance(importance: u8) -> Result<(), String> {
    if (1..=5).contains(&importance) {
        Ok(())
    } else {
        Err("importance must be between 1 and 5".into())
    }
}

fn render_recall(memories: &[Memory]) -> String {
    if memories.is_empty() {
        return "No memories found matching your query.".into();
    }
    let blocks: Vec<String> = memories
        .iter()
        .map(|m| {
            let tags = if m.tags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", m.tags.join(", "))
            };
            format!(
                "## {}: {}{}\nID: {} | Importance: {} | Scope: {}\n{}",
                m.category.as_str().to_uppercase(),
                m.title,
                tags,
                m.id,
                m.importance,
                m.scope,
                m.content
            )
        })
        .collect();
    format!("Found {} memories:\n\n{}", memories.len(), blocks.join("\n\n---\n\n"))
}

fn render_list(memories: &[Memory]) -> String {
    if memories.is_empty() {
        return "No memories stored yet.".into();
    }
    let lines: Vec<String> = memories
        .iter()
        .map(|m| {
            format!(
                "- [{}] {} (ID: {}, importance: {})",
                m.category, m.title, m.id, m.importance
            )
        })
        .collect();
    format!("Found {} memories:\n\n{}", memories.len(), lines.join("\n"))
}
