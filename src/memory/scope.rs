//! Scope routing shared by the memory and search services.
//!
//! [`ScopedStores`] maps a [`Scope`] to its store file, knows which scopes the
//! policy permits, and implements the "query each scope, merge, re-sort, truncate"
//! fan-out once so both services use the same ordering.

use rusqlite::types::Value;
use rusqlite::Connection;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{LumenConfig, ScopePolicy};
use crate::db::{self, StoreRegistry};
use crate::error::Result;
use crate::memory::types::{Category, Memory, Scope};
use crate::paths;

/// Store routing for one project, bound to a config snapshot and a registry.
pub struct ScopedStores {
    registry: Arc<StoreRegistry>,
    config: Arc<LumenConfig>,
    project_id: String,
    project_db: PathBuf,
    global_db: PathBuf,
}

impl ScopedStores {
    pub fn new(registry: Arc<StoreRegistry>, config: Arc<LumenConfig>, project_path: &Path) -> Self {
        let data_dir = config.resolved_data_dir();
        Self {
            project_id: paths::project_id(project_path),
            project_db: paths::project_db_path(&data_dir, project_path),
            global_db: paths::global_db_path(&data_dir),
            registry,
            config,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn config(&self) -> &LumenConfig {
        &self.config
    }

    pub fn policy(&self) -> ScopePolicy {
        self.config.scope_policy()
    }

    pub fn store_path(&self, scope: Scope) -> &Path {
        match scope {
            Scope::Project => &self.project_db,
            Scope::Global => &self.global_db,
        }
    }

    /// Whether a lookup may open the store for `scope`. Opening creates the file,
    /// so a disabled global store is only read once it already exists.
    pub fn readable(&self, scope: Scope) -> bool {
        scope == Scope::Project || self.policy().allows_global() || self.global_db.exists()
    }

    /// Scopes read when the caller does not name one, in priority order.
    pub fn permitted_scopes(&self) -> Vec<Scope> {
        if self.policy().allows_global() {
            vec![Scope::Project, Scope::Global]
        } else {
            vec![Scope::Project]
        }
    }

    /// `project_id` stamped on new records in `scope`.
    pub fn owner_id(&self, scope: Scope) -> &str {
        match scope {
            Scope::Project => &self.project_id,
            Scope::Global => paths::GLOBAL_PROJECT_ID,
        }
    }

    /// Run `f` against the store for `scope`, holding its lock for the duration.
    pub fn with_store<T>(&self, scope: Scope, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let handle = self.registry.acquire(self.store_path(scope))?;
        let conn = db::lock(&handle)?;
        f(&conn)
    }

    /// Query one scope (if given) or every permitted scope, merge, sort by
    /// importance then recency, and keep the first `limit`.
    pub fn fan_out(
        &self,
        scope: Option<Scope>,
        limit: usize,
        mut query: impl FnMut(Scope, &Connection) -> Result<Vec<Memory>>,
    ) -> Result<Vec<Memory>> {
        let scopes = match scope {
            Some(s) => vec![s],
            None => self.permitted_scopes(),
        };

        let mut merged = Vec::new();
        for s in scopes {
            merged.extend(self.with_store(s, |conn| query(s, conn))?);
        }

        sort_by_priority(&mut merged);
        merged.truncate(limit);
        Ok(merged)
    }

    /// Base filter for a scope: project stores only ever yield this project's rows.
    pub(crate) fn base_filter(&self, scope: Scope) -> WhereClause {
        let mut filter = WhereClause::default();
        if scope == Scope::Project {
            filter.push("m.project_id = ?", [Value::Text(self.project_id.clone())]);
        }
        filter
    }
}

/// Importance descending, then most recently updated first.
pub fn compare_priority(a: &Memory, b: &Memory) -> Ordering {
    b.importance
        .cmp(&a.importance)
        .then_with(|| b.updated_at.cmp(&a.updated_at))
}

pub fn sort_by_priority(memories: &mut [Memory]) {
    memories.sort_by(compare_priority);
}

/// `ORDER BY` fragment matching [`compare_priority`].
pub(crate) const PRIORITY_ORDER: &str = "m.importance DESC, m.updated_at DESC";

/// Accumulates `AND`-joined conditions with positional `?` parameters.
#[derive(Debug, Default)]
pub(crate) struct WhereClause {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl WhereClause {
    pub fn push(&mut self, clause: impl Into<String>, params: impl IntoIterator<Item = Value>) {
        self.clauses.push(clause.into());
        self.params.extend(params);
    }

    pub fn category(&mut self, category: Option<Category>) {
        if let Some(c) = category {
            self.push("m.category = ?", [Value::Text(c.as_str().into())]);
        }
    }

    pub fn categories(&mut self, categories: &[Category]) {
        if categories.is_empty() {
            return;
        }
        let placeholders = vec!["?"; categories.len()].join(", ");
        self.push(
            format!("m.category IN ({placeholders})"),
            categories.iter().map(|c| Value::Text(c.as_str().into())),
        );
    }

    /// ` WHERE ...` or the empty string.
    pub fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

/// Select memories matching `filter`, in priority order.
pub(crate) fn select_memories(conn: &Connection, filter: &WhereClause, limit: Option<usize>) -> Result<Vec<Memory>> {
    let mut sql = format!(
        "SELECT {} FROM memories m{} ORDER BY {PRIORITY_ORDER}",
        crate::memory::types::MEMORY_COLUMNS,
        filter.sql()
    );
    let mut params = filter.params().to_vec();
    if let Some(limit) = limit {
        sql.push_str(" LIMIT ?");
        params.push(Value::Integer(limit as i64));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params), Memory::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(id: &str, importance: u8, updated_at: &str) -> Memory {
        Memory {
            id: id.into(),
            project_id: "p".into(),
            scope: Scope::Project,
            category: Category::Note,
            title: id.into(),
            content: String::new(),
            tags: vec![],
            importance,
            created_at: updated_at.into(),
            updated_at: updated_at.into(),
        }
    }

    #[test]
    fn priority_sorts_importance_then_recency() {
        let mut items = vec![
            memory("old-3", 3, "2024-01-01T00:00:00.000000Z"),
            memory("new-3", 3, "2024-06-01T00:00:00.000000Z"),
            memory("old-5", 5, "2023-01-01T00:00:00.000000Z"),
            memory("mid-4", 4, "2024-03-01T00:00:00.000000Z"),
        ];
        sort_by_priority(&mut items);
        let ids: Vec<&str> = items.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["old-5", "mid-4", "new-3", "old-3"]);
    }

    #[test]
    fn where_clause_renders_in_push_order() {
        let mut filter = WhereClause::default();
        assert_eq!(filter.sql(), "");

        filter.push("m.project_id = ?", [Value::Text("abc".into())]);
        filter.category(Some(Category::Task));
        filter.categories(&[Category::Decision, Category::Pattern]);

        assert_eq!(
            filter.sql(),
            " WHERE m.project_id = ? AND m.category = ? AND m.category IN (?, ?)"
        );
        assert_eq!(filter.params().len(), 4);
    }

    #[test]
    fn empty_category_list_adds_nothing() {
        let mut filter = WhereClause::default();
        filter.categories(&[]);
        assert_eq!(filter.sql(), "");
    }
}
