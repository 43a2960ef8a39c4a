//! Record-level CRUD with scope routing.
//!
//! [`MemoryService`] writes to the store picked by a record's scope and, on reads,
//! falls back to the other scope when the policy allows it. Absent ids are soft
//! misses (`None` / `false`), never errors.

use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;

use crate::error::{MemoryError, Result};
use crate::memory::scope::{select_memories, ScopedStores};
use crate::memory::types::{
    next_timestamp, now_timestamp, CreateMemoryInput, ListOptions, Memory, MemoryStats, Scope,
    UpdateMemoryInput, MEMORY_COLUMNS,
};

/// Default `limit` for [`MemoryService::list`].
pub const DEFAULT_LIST_LIMIT: usize = 50;

pub struct MemoryService {
    stores: Arc<ScopedStores>,
}

impl MemoryService {
    pub fn new(stores: Arc<ScopedStores>) -> Self {
        Self { stores }
    }

    /// Insert a new memory into the store chosen by its scope.
    ///
    /// Fails with [`MemoryError::ScopeDisabled`] for global records under the
    /// `project-only` policy; nothing is written in that case.
    pub fn create(&self, input: CreateMemoryInput) -> Result<Memory> {
        let scope = input.scope.unwrap_or(Scope::Project);
        if scope == Scope::Global && !self.stores.policy().allows_global() {
            return Err(MemoryError::ScopeDisabled);
        }

        let now = now_timestamp();
        let memory = Memory {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: self.stores.owner_id(scope).to_string(),
            scope,
            category: input.category,
            title: input.title,
            content: input.content,
            tags: input.tags.unwrap_or_default(),
            importance: input
                .importance
                .unwrap_or(self.stores.config().memory.default_importance),
            created_at: now.clone(),
            updated_at: now,
        };

        self.stores.with_store(scope, |conn| insert_memory(conn, &memory))?;

        tracing::debug!(id = %memory.id, scope = %scope, category = %memory.category, "memory created");
        Ok(memory)
    }

    /// Look up `id` in `scope`, then in the other scope if the policy permits global.
    pub fn get_by_id(&self, id: &str, scope: Scope) -> Result<Option<Memory>> {
        if let Some(memory) = self.find_in(id, scope)? {
            return Ok(Some(memory));
        }
        if self.stores.policy().allows_global() {
            return self.find_in(id, scope.other());
        }
        Ok(None)
    }

    /// Apply a partial update. Returns `None` when no store holds `id`.
    ///
    /// An input with no fields set returns the record untouched, `updated_at` included.
    pub fn update(&self, input: UpdateMemoryInput) -> Result<Option<Memory>> {
        let current = match self.find_in(&input.id, Scope::Project)? {
            Some(m) => m,
            None => match self.find_in(&input.id, Scope::Global)? {
                Some(m) => m,
                None => return Ok(None),
            },
        };

        if !input.has_changes() {
            return Ok(Some(current));
        }

        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(title) = input.title {
            sets.push("title = ?");
            values.push(Value::Text(title));
        }
        if let Some(content) = input.content {
            sets.push("content = ?");
            values.push(Value::Text(content));
        }
        if let Some(tags) = input.tags {
            sets.push("tags = ?");
            values.push(Value::Text(tags_to_json(&tags)));
        }
        if let Some(importance) = input.importance {
            sets.push("importance = ?");
            values.push(Value::Integer(i64::from(importance)));
        }
        sets.push("updated_at = ?");
        values.push(Value::Text(next_timestamp(&current.updated_at)));
        values.push(Value::Text(input.id.clone()));

        let sql = format!("UPDATE memories SET {} WHERE id = ?", sets.join(", "));
        let scope = current.scope;
        self.stores.with_store(scope, |conn| {
            conn.execute(&sql, rusqlite::params_from_iter(values))?;
            fetch_by_id(conn, &input.id)
        })
    }

    /// Delete `id` from the project store, then from the global store if permitted.
    /// Returns whether a row was removed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        if self.delete_in(id, Scope::Project)? {
            return Ok(true);
        }
        if self.stores.policy().allows_global() {
            return self.delete_in(id, Scope::Global);
        }
        Ok(false)
    }

    /// List memories by priority, across every permitted scope unless one is named.
    pub fn list(&self, options: &ListOptions) -> Result<Vec<Memory>> {
        let limit = options.limit.unwrap_or(DEFAULT_LIST_LIMIT);
        self.stores.fan_out(options.scope, limit, |scope, conn| {
            let mut filter = self.stores.base_filter(scope);
            filter.category(options.category);
            select_memories(conn, &filter, Some(limit))
        })
    }

    /// Project record count, plus the global count when the policy allows it.
    pub fn get_stats(&self) -> Result<MemoryStats> {
        let project_id = self.stores.project_id().to_string();
        let project = self.stores.with_store(Scope::Project, |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM memories WHERE project_id = ?1",
                params![project_id],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })?;

        let global = if self.stores.policy().allows_global() {
            let count = self.stores.with_store(Scope::Global, |conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;
                Ok(count as u64)
            })?;
            Some(count)
        } else {
            None
        };

        Ok(MemoryStats { project, global })
    }

    fn find_in(&self, id: &str, scope: Scope) -> Result<Option<Memory>> {
        if !self.stores.readable(scope) {
            return Ok(None);
        }
        self.stores.with_store(scope, |conn| fetch_by_id(conn, id))
    }

    fn delete_in(&self, id: &str, scope: Scope) -> Result<bool> {
        let removed = self
            .stores
            .with_store(scope, |conn| Ok(conn.execute("DELETE FROM memories WHERE id = ?1", params![id])?))?;
        if removed > 0 {
            tracing::debug!(id = %id, scope = %scope, "memory deleted");
        }
        Ok(removed > 0)
    }
}

fn insert_memory(conn: &Connection, memory: &Memory) -> Result<()> {
    conn.execute(
        "INSERT INTO memories (id, project_id, scope, category, title, content, tags, importance, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            memory.id,
            memory.project_id,
            memory.scope.as_str(),
            memory.category.as_str(),
            memory.title,
            memory.content,
            tags_to_json(&memory.tags),
            memory.importance,
            memory.created_at,
            memory.updated_at,
        ],
    )?;
    Ok(())
}

fn fetch_by_id(conn: &Connection, id: &str) -> Result<Option<Memory>> {
    let memory = conn
        .query_row(
            &format!("SELECT {MEMORY_COLUMNS} FROM memories m WHERE m.id = ?1"),
            params![id],
            Memory::from_row,
        )
        .optional()?;
    Ok(memory)
}

fn tags_to_json(tags: &[String]) -> String {
    serde_json::Value::from(tags.to_vec()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LumenConfig, ScopePolicy};
    use crate::db::StoreRegistry;
    use crate::memory::types::Category;
    use std::path::Path;

    fn service(dir: &Path, policy: ScopePolicy) -> MemoryService {
        let mut config = LumenConfig::default();
        config.storage.data_dir = dir.join("data").to_string_lossy().into_owned();
        config.storage.memory_scope = policy;
        let stores = ScopedStores::new(
            Arc::new(StoreRegistry::new()),
            Arc::new(config),
            &dir.join("project"),
        );
        MemoryService::new(Arc::new(stores))
    }

    #[test]
    fn create_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), ScopePolicy::ProjectOnly);

        let memory = svc
            .create(CreateMemoryInput::new(Category::Note, "Title", "Body"))
            .unwrap();

        assert_eq!(memory.scope, Scope::Project);
        assert_eq!(memory.importance, 3);
        assert!(memory.tags.is_empty());
        assert_eq!(memory.created_at, memory.updated_at);
        assert_eq!(memory.project_id.len(), 16);
        assert_eq!(uuid::Uuid::parse_str(&memory.id).unwrap().get_version_num(), 4);
    }

    #[test]
    fn tags_keep_order_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), ScopePolicy::ProjectOnly);

        let mut input = CreateMemoryInput::new(Category::Pattern, "Errors", "Use thiserror");
        input.tags = Some(vec!["rust".into(), "errors".into(), "rust".into()]);
        let created = svc.create(input).unwrap();

        let fetched = svc.get_by_id(&created.id, Scope::Project).unwrap().unwrap();
        assert_eq!(fetched.tags, vec!["rust", "errors", "rust"]);
    }

    #[test]
    fn global_store_records_use_global_project_id() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), ScopePolicy::ProjectAndGlobal);

        let mut input = CreateMemoryInput::new(Category::Concept, "Shared", "Everywhere");
        input.scope = Some(Scope::Global);
        let memory = svc.create(input).unwrap();
        assert_eq!(memory.project_id, "global");
        assert_eq!(memory.scope, Scope::Global);
    }

    #[test]
    fn update_changes_only_given_fields() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), ScopePolicy::ProjectOnly);

        let mut input = CreateMemoryInput::new(Category::Decision, "Use SQLite", "Embedded store");
        input.tags = Some(vec!["db".into()]);
        input.importance = Some(2);
        let created = svc.create(input).unwrap();

        let updated = svc
            .update(UpdateMemoryInput {
                id: created.id.clone(),
                importance: Some(5),
                ..Default::default()
            })
            .unwrap()
            .unwrap();

        assert_eq!(updated.importance, 5);
        assert_eq!(updated.title, "Use SQLite");
        assert_eq!(updated.content, "Embedded store");
        assert_eq!(updated.tags, vec!["db"]);
        assert_eq!(updated.category, Category::Decision);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);
    }

    #[test]
    fn update_missing_id_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), ScopePolicy::ProjectAndGlobal);
        let result = svc
            .update(UpdateMemoryInput {
                id: "no-such-id".into(),
                title: Some("x".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn update_miss_under_project_only_leaves_global_store_uncreated() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), ScopePolicy::ProjectOnly);
        let result = svc
            .update(UpdateMemoryInput {
                id: "no-such-id".into(),
                title: Some("x".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(result.is_none());
        assert!(svc.get_by_id("no-such-id", Scope::Global).unwrap().is_none());
        assert!(!crate::paths::global_db_path(&dir.path().join("data")).exists());
    }

    #[test]
    fn list_never_returns_other_projects_rows() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), ScopePolicy::ProjectOnly);
        svc.create(CreateMemoryInput::new(Category::Note, "Mine", "kept"))
            .unwrap();

        // A foreign row written straight into this project's store.
        svc.stores
            .with_store(Scope::Project, |conn| {
                conn.execute(
                    "INSERT INTO memories (id, project_id, scope, category, title, content, tags, importance, created_at, updated_at) \
                     VALUES ('foreign', 'someone-else', 'project', 'note', 'Theirs', 'hidden', '[]', 5, 'x', 'x')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let titles: Vec<String> = svc
            .list(&ListOptions::default())
            .unwrap()
            .into_iter()
            .map(|m| m.title)
            .collect();
        assert_eq!(titles, vec!["Mine"]);
        assert_eq!(svc.get_stats().unwrap().project, 1);
    }

    #[test]
    fn list_filters_by_category_and_limit() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), ScopePolicy::ProjectOnly);
        for i in 0..4 {
            svc.create(CreateMemoryInput::new(Category::Task, format!("task {i}"), "todo"))
                .unwrap();
        }
        svc.create(CreateMemoryInput::new(Category::Note, "note", "n"))
            .unwrap();

        let tasks = svc
            .list(&ListOptions {
                category: Some(Category::Task),
                limit: Some(3),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(tasks.len(), 3);
        assert!(tasks.iter().all(|m| m.category == Category::Task));
    }

    #[test]
    fn stats_omit_global_under_project_only() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), ScopePolicy::ProjectOnly);
        svc.create(CreateMemoryInput::new(Category::Note, "a", "b"))
            .unwrap();
        assert_eq!(
            svc.get_stats().unwrap(),
            MemoryStats {
                project: 1,
                global: None
            }
        );
    }
}
