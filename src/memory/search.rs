//! Read path: keyword search and context assembly.
//!
//! A keyword query is answered per store by one of two strategies, chosen by
//! [`plan_search`]: FTS5 BM25 ranking when the index exists and the sanitized
//! query is non-empty, otherwise a case-insensitive substring match. A full-text
//! query the engine rejects at run time is retried with the substring strategy.
//! Either way the caller only sees results, never the failure.

use rusqlite::types::Value;
use rusqlite::Connection;
use std::sync::Arc;

use crate::db;
use crate::error::Result;
use crate::memory::context::ContextPacker;
use crate::memory::scope::{select_memories, ScopedStores, WhereClause};
use crate::memory::types::{Category, ContextOptions, Memory, Scope, SearchOptions, MEMORY_COLUMNS};

/// Default `limit` for [`SearchService::search`].
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Why a query is answered by substring matching instead of the full-text index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// The store has no `memories_fts` table.
    IndexMissing,
    /// Sanitizing the query left no terms.
    EmptyExpression,
    /// The full-text engine returned an error for the expression.
    QueryRejected,
}

/// How a keyword query is answered against one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStrategy {
    /// FTS5 `MATCH` expression, ranked by BM25.
    FullText { expression: String },
    /// `LIKE` over title, content and tags; a row matches if any term does.
    Substring { terms: Vec<String>, reason: FallbackReason },
}

/// Pick the strategy for `query` against this store.
pub fn plan_search(conn: &Connection, query: &str) -> Result<SearchStrategy> {
    if !db::full_text_available(conn)? {
        return Ok(substring(query, FallbackReason::IndexMissing));
    }
    match sanitize_fts_query(query) {
        Some(expression) => Ok(SearchStrategy::FullText { expression }),
        None => Ok(substring(query, FallbackReason::EmptyExpression)),
    }
}

fn substring(query: &str, reason: FallbackReason) -> SearchStrategy {
    SearchStrategy::Substring {
        terms: substring_terms(query),
        reason,
    }
}

/// Turn free text into an FTS5 expression: quotes stripped, each whitespace-separated
/// term quoted as a phrase, terms joined with `OR`. `None` if nothing is left.
pub fn sanitize_fts_query(query: &str) -> Option<String> {
    let terms: Vec<String> = strip_quotes(query)
        .split_whitespace()
        .map(|word| format!("\"{word}\""))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

/// Terms for the substring strategy. A query made only of quotes is kept whole.
fn substring_terms(query: &str) -> Vec<String> {
    let terms: Vec<String> = strip_quotes(query)
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if terms.is_empty() {
        vec![query.trim().to_string()]
    } else {
        terms
    }
}

fn strip_quotes(query: &str) -> String {
    query.replace(['"', '\''], "")
}

/// Escape `LIKE` wildcards so user text matches literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// FTS5 BM25 keyword search, best match first.
fn full_text_search(
    conn: &Connection,
    expression: &str,
    filter: &WhereClause,
    limit: usize,
) -> rusqlite::Result<Vec<Memory>> {
    let extra = filter.sql().replacen(" WHERE ", " AND ", 1);
    let sql = format!(
        "SELECT {MEMORY_COLUMNS} FROM memories m \
         JOIN memories_fts ON m.rowid = memories_fts.rowid \
         WHERE memories_fts MATCH ?{extra} \
         ORDER BY bm25(memories_fts) LIMIT ?"
    );

    let mut params = Vec::with_capacity(filter.params().len() + 2);
    params.push(Value::Text(expression.to_string()));
    params.extend_from_slice(filter.params());
    params.push(Value::Integer(limit as i64));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params), Memory::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Substring search, ordered by importance then recency.
fn substring_search(
    conn: &Connection,
    terms: &[String],
    mut filter: WhereClause,
    limit: usize,
) -> Result<Vec<Memory>> {
    let mut alternatives = Vec::with_capacity(terms.len());
    let mut params = Vec::with_capacity(terms.len() * 3);
    for term in terms {
        alternatives.push(
            "m.title LIKE ? ESCAPE '\\' OR m.content LIKE ? ESCAPE '\\' OR m.tags LIKE ? ESCAPE '\\'",
        );
        let pattern = like_pattern(term);
        params.extend(std::iter::repeat(Value::Text(pattern)).take(3));
    }
    filter.push(format!("({})", alternatives.join(" OR ")), params);
    select_memories(conn, &filter, Some(limit))
}

/// Run `strategy` against one store, downgrading a rejected full-text query.
pub(crate) fn run_strategy(
    conn: &Connection,
    strategy: SearchStrategy,
    query: &str,
    filter: WhereClause,
    limit: usize,
) -> Result<Vec<Memory>> {
    match strategy {
        SearchStrategy::FullText { expression } => {
            match full_text_search(conn, &expression, &filter, limit) {
                Ok(rows) => Ok(rows),
                Err(e) => {
                    tracing::debug!(error = %e, reason = ?FallbackReason::QueryRejected, "full-text search fell back to substring match");
                    substring_search(conn, &substring_terms(query), filter, limit)
                }
            }
        }
        SearchStrategy::Substring { terms, reason } => {
            tracing::debug!(reason = ?reason, "using substring search");
            substring_search(conn, &terms, filter, limit)
        }
    }
}

pub struct SearchService {
    stores: Arc<ScopedStores>,
}

impl SearchService {
    pub fn new(stores: Arc<ScopedStores>) -> Self {
        Self { stores }
    }

    /// Keyword search across the requested (or every permitted) scope.
    ///
    /// Results are always ordered by importance then recency: full-text rank
    /// only decides which rows each store contributes.
    pub fn search(&self, options: &SearchOptions) -> Result<Vec<Memory>> {
        let limit = options.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        let query = options
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty());

        self.stores.fan_out(options.scope, limit, |scope, conn| {
            let mut filter = self.stores.base_filter(scope);
            filter.category(options.category);
            match query {
                Some(q) => {
                    let strategy = plan_search(conn, q)?;
                    run_strategy(conn, strategy, q, filter, limit)
                }
                None => select_memories(conn, &filter, Some(limit)),
            }
        })
    }

    /// Pack the most important memories into a text digest of at most
    /// `max_tokens * 4` characters. Project memories come before global ones.
    pub fn get_context(&self, options: &ContextOptions) -> Result<String> {
        let max_tokens = options
            .max_tokens
            .unwrap_or(self.stores.config().retrieval.max_context_tokens);
        let mut packer = ContextPacker::new(max_tokens);

        for scope in self.stores.permitted_scopes() {
            let candidates = self.context_candidates(scope, &options.categories)?;
            for memory in &candidates {
                if !packer.offer(memory) {
                    break;
                }
            }
            if packer.is_exhausted() {
                break;
            }
        }

        Ok(packer.finish())
    }

    fn context_candidates(&self, scope: Scope, categories: &[Category]) -> Result<Vec<Memory>> {
        self.stores.with_store(scope, |conn| {
            let mut filter = self.stores.base_filter(scope);
            filter.categories(categories);
            select_memories(conn, &filter, None)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_store;
    use rusqlite::params;

    fn insert(conn: &Connection, id: &str, title: &str, content: &str, tags: &str, importance: u8) {
        conn.execute(
            "INSERT INTO memories (id, project_id, scope, category, title, content, tags, importance, created_at, updated_at) \
             VALUES (?1, 'p', 'project', 'note', ?2, ?3, ?4, ?5, ?6, ?6)",
            params![id, title, content, tags, importance, crate::memory::types::now_timestamp()],
        )
        .unwrap();
    }

    fn ids(rows: &[Memory]) -> Vec<&str> {
        rows.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn test_sanitize_fts_query() {
        assert_eq!(
            sanitize_fts_query("database schema").as_deref(),
            Some("\"database\" OR \"schema\"")
        );
        assert_eq!(
            sanitize_fts_query("  \"quoted\"  it's ").as_deref(),
            Some("\"quoted\" OR \"its\"")
        );
        assert_eq!(sanitize_fts_query("\"\" ''"), None);
        assert_eq!(sanitize_fts_query("   "), None);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn plan_prefers_full_text_when_index_exists() {
        let conn = open_memory_store().unwrap();
        assert_eq!(
            plan_search(&conn, "rust").unwrap(),
            SearchStrategy::FullText {
                expression: "\"rust\"".into()
            }
        );
        assert!(matches!(
            plan_search(&conn, "\"\"").unwrap(),
            SearchStrategy::Substring {
                reason: FallbackReason::EmptyExpression,
                ..
            }
        ));
    }

    #[test]
    fn plan_falls_back_when_index_missing() {
        let conn = open_memory_store().unwrap();
        conn.execute_batch(
            "DROP TRIGGER memories_ai; DROP TRIGGER memories_ad; DROP TRIGGER memories_au;
             DROP TABLE memories_fts;",
        )
        .unwrap();
        assert_eq!(
            plan_search(&conn, "database schema").unwrap(),
            SearchStrategy::Substring {
                terms: vec!["database".into(), "schema".into()],
                reason: FallbackReason::IndexMissing,
            }
        );
    }

    #[test]
    fn full_text_matches_any_term_across_fields() {
        let conn = open_memory_store().unwrap();
        insert(&conn, "a", "Database layout", "tables", "[]", 3);
        insert(&conn, "b", "Naming", "snake_case everywhere", "[\"schema\"]", 3);
        insert(&conn, "c", "Unrelated", "nothing here", "[]", 3);

        let strategy = plan_search(&conn, "database schema").unwrap();
        let mut rows = run_strategy(&conn, strategy, "database schema", WhereClause::default(), 10).unwrap();
        rows.sort_by(|x, y| x.id.cmp(&y.id));
        assert_eq!(ids(&rows), vec!["a", "b"]);
    }

    #[test]
    fn rejected_expression_downgrades_to_substring() {
        let conn = open_memory_store().unwrap();
        insert(&conn, "a", "Retry policy", "exponential backoff", "[]", 3);

        // Not valid FTS5 syntax; the engine rejects it at run time.
        let strategy = SearchStrategy::FullText {
            expression: "AND OR (".into(),
        };
        let rows = run_strategy(&conn, strategy, "backoff", WhereClause::default(), 10).unwrap();
        assert_eq!(ids(&rows), vec!["a"]);
    }

    #[test]
    fn substring_is_case_insensitive_and_literal() {
        let conn = open_memory_store().unwrap();
        insert(&conn, "a", "Coverage", "keep it above 80%", "[]", 3);
        insert(&conn, "b", "Other", "keep it above 80 percent", "[]", 3);

        let rows = substring_search(&conn, &["COVERAGE".into()], WhereClause::default(), 10).unwrap();
        assert_eq!(ids(&rows), vec!["a"]);

        let rows = substring_search(&conn, &["80%".into()], WhereClause::default(), 10).unwrap();
        assert_eq!(ids(&rows), vec!["a"]);
    }

    #[test]
    fn substring_orders_by_priority() {
        let conn = open_memory_store().unwrap();
        insert(&conn, "low", "cache", "lru", "[]", 1);
        insert(&conn, "high", "cache", "ttl", "[]", 5);

        let rows = substring_search(&conn, &["cache".into()], WhereClause::default(), 10).unwrap();
        assert_eq!(ids(&rows), vec!["high", "low"]);
    }
}
