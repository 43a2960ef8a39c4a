//! Core memory type definitions.
//!
//! Defines [`Scope`] (which store a record lives in), [`Category`] (what kind of
//! knowledge it holds), [`Memory`] (a full record), and the input/option structs
//! taken by the memory and search services.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Which physical store a memory lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Visible only inside the project it was written from.
    Project,
    /// Shared across every project.
    Global,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Global => "global",
        }
    }

    /// The scope checked second when a lookup misses.
    pub fn other(&self) -> Scope {
        match self {
            Self::Project => Self::Global,
            Self::Global => Self::Project,
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" => Ok(Self::Project),
            "global" => Ok(Self::Global),
            _ => Err(format!("unknown scope: {s}")),
        }
    }
}

/// The five kinds of project knowledge a memory can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Architectural choices and their rationale.
    Decision,
    /// Code conventions and recurring idioms.
    Pattern,
    /// Domain knowledge and vocabulary.
    Concept,
    /// Free-form observations.
    Note,
    /// Work items.
    Task,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Self::Decision,
        Self::Pattern,
        Self::Concept,
        Self::Note,
        Self::Task,
    ];

    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decision => "decision",
            Self::Pattern => "pattern",
            Self::Concept => "concept",
            Self::Note => "note",
            Self::Task => "task",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "decision" => Ok(Self::Decision),
            "pattern" => Ok(Self::Pattern),
            "concept" => Ok(Self::Concept),
            "note" => Ok(Self::Note),
            "task" => Ok(Self::Task),
            _ => Err(format!("unknown category: {s}")),
        }
    }
}

/// A memory record, matching the `memories` table schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    /// UUID v4 primary key, unique across all stores.
    pub id: String,
    /// Owning project's identifier, or `"global"` for global-scope records.
    pub project_id: String,
    pub scope: Scope,
    pub category: Category,
    pub title: String,
    pub content: String,
    /// Insertion order is preserved; duplicates are allowed.
    pub tags: Vec<String>,
    /// 1–5, higher is more important.
    pub importance: u8,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
    /// ISO 8601 last-modification timestamp.
    pub updated_at: String,
}

/// Column list matching [`Memory::from_row`], qualified with the `m` alias.
pub(crate) const MEMORY_COLUMNS: &str = "m.id, m.project_id, m.scope, m.category, m.title, \
     m.content, m.tags, m.importance, m.created_at, m.updated_at";

impl Memory {
    /// Build a record from a row selected with [`MEMORY_COLUMNS`].
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let scope: String = row.get(2)?;
        let category: String = row.get(3)?;
        let tags: String = row.get(6)?;
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            scope: scope.parse().map_err(|e| conversion_error(2, e))?,
            category: category.parse().map_err(|e| conversion_error(3, e))?,
            title: row.get(4)?,
            content: row.get(5)?,
            tags: serde_json::from_str(&tags).map_err(|e| conversion_error(6, e.to_string()))?,
            importance: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, message.into())
}

/// Input for creating a memory. Unset fields take their defaults.
#[derive(Debug, Clone)]
pub struct CreateMemoryInput {
    pub category: Category,
    pub title: String,
    pub content: String,
    pub tags: Option<Vec<String>>,
    /// Defaults to the configured `default_importance`.
    pub importance: Option<u8>,
    /// Defaults to [`Scope::Project`].
    pub scope: Option<Scope>,
}

impl CreateMemoryInput {
    pub fn new(category: Category, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            category,
            title: title.into(),
            content: content.into(),
            tags: None,
            importance: None,
            scope: None,
        }
    }
}

/// Partial update. Only `Some` fields are written.
#[derive(Debug, Clone, Default)]
pub struct UpdateMemoryInput {
    pub id: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub importance: Option<u8>,
}

impl UpdateMemoryInput {
    pub fn has_changes(&self) -> bool {
        self.title.is_some()
            || self.content.is_some()
            || self.tags.is_some()
            || self.importance.is_some()
    }
}

/// Options for listing memories.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub category: Option<Category>,
    /// `None` means every scope the policy permits.
    pub scope: Option<Scope>,
    /// Defaults to 50.
    pub limit: Option<usize>,
}

/// Options for searching memories.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Keyword query; absent or blank behaves like a plain list.
    pub query: Option<String>,
    pub category: Option<Category>,
    pub scope: Option<Scope>,
    /// Defaults to 10.
    pub limit: Option<usize>,
}

/// Options for assembling a context digest.
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    /// Empty means every category.
    pub categories: Vec<Category>,
    /// Defaults to the configured `max_context_tokens`.
    pub max_tokens: Option<usize>,
}

/// Record counts for the current project and, when enabled, the global store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub project: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global: Option<u64>,
}

/// Current time as a fixed-width RFC 3339 string, so string order is time order.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// A timestamp strictly later than `previous`, normally the current time.
///
/// Compared at microsecond precision, the resolution timestamps are stored at.
pub fn next_timestamp(previous: &str) -> String {
    let now = Utc::now().timestamp_micros();
    let next = match DateTime::parse_from_rfc3339(previous) {
        Ok(prev) => now.max(prev.timestamp_micros() + 1),
        Err(_) => now,
    };
    DateTime::<Utc>::from_timestamp_micros(next)
        .unwrap_or_else(Utc::now)
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}
