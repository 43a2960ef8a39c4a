//! Error types for the memory core.
//!
//! Lookups on an absent id are not errors: they come back as `None` or `false`.

use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by the config manager, storage engine, and services.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// No configuration file has been saved yet.
    #[error("lumencore is not configured (no config at {}). Run `lumencore setup` first.", path.display())]
    NotConfigured { path: PathBuf },

    /// A global-scope write was attempted under the `project-only` policy.
    #[error("global memories are disabled. Run `lumencore setup --scope project-and-global` to enable them.")]
    ScopeDisabled,

    /// The store directory or file could not be created or opened.
    #[error("memory store unavailable at {}: {reason}", path.display())]
    StorageUnavailable { path: PathBuf, reason: String },

    /// A statement against an open store failed.
    #[error("memory store query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// The config file exists but could not be read or parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Filesystem error while writing configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MemoryError {
    /// Create a storage-unavailable error for `path`.
    pub fn storage_unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::StorageUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type for memory operations
pub type Result<T> = std::result::Result<T, MemoryError>;
