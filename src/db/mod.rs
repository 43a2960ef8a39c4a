//! Storage engine: one SQLite file per scope instance, opened once and cached.
//!
//! [`open_store`] creates the file, applies pragmas, and brings the schema up to
//! date. [`StoreRegistry`] hands out a single shared handle per canonical path,
//! because two independent connections to the same WAL-mode file are not safe here.

pub mod migrations;
pub mod schema;

use rusqlite::Connection;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{MemoryError, Result};

/// A cached, shareable connection to one store file.
pub type StoreHandle = Arc<Mutex<Connection>>;

/// Open (or create) the store at the given path with the schema initialized.
///
/// Any failure here is reported as [`MemoryError::StorageUnavailable`].
pub fn open_store(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| MemoryError::storage_unavailable(parent, e))?;
    }

    let conn = Connection::open(path).map_err(|e| MemoryError::storage_unavailable(path, e))?;

    prepare_connection(&conn).map_err(|e| MemoryError::storage_unavailable(path, e))?;

    tracing::debug!(path = %path.display(), "store opened");
    Ok(conn)
}

fn prepare_connection(conn: &Connection) -> rusqlite::Result<()> {
    // WAL lets readers proceed while a single writer holds the file
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    schema::init_schema(conn)?;
    migrations::run_migrations(conn)?;
    reindex_if_stale(conn)?;
    Ok(())
}

/// Rebuild the full-text index when it no longer covers every row, as happens
/// when a lost index is recreated empty. Returns whether a rebuild ran.
pub(crate) fn reindex_if_stale(conn: &Connection) -> rusqlite::Result<bool> {
    let (rows, indexed): (i64, i64) = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM memories), (SELECT COUNT(*) FROM memories_fts_docsize)",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    if rows == indexed {
        return Ok(false);
    }

    tracing::info!(rows, indexed, "full-text index out of date, rebuilding");
    conn.execute("INSERT INTO memories_fts(memories_fts) VALUES('rebuild')", [])?;
    Ok(true)
}

/// Open an in-memory store for testing.
#[cfg(test)]
pub(crate) fn open_memory_store() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    schema::init_schema(&conn)?;
    migrations::run_migrations(&conn)?;
    reindex_if_stale(&conn)?;
    Ok(conn)
}

/// Whether the full-text shadow index exists in this store.
pub fn full_text_available(conn: &Connection) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'memories_fts'",
        [],
        |row| row.get(0),
    )
}

/// Lock a store handle, treating a poisoned lock as an unavailable store.
pub fn lock(handle: &StoreHandle) -> Result<MutexGuard<'_, Connection>> {
    handle.lock().map_err(|e| {
        let path = e.get_ref().path().map(PathBuf::from).unwrap_or_default();
        MemoryError::storage_unavailable(path, "store lock poisoned")
    })
}

/// Process-wide map from store path to its open handle.
///
/// Owned by the composition root and passed by reference to the services.
/// [`close_all`](Self::close_all) must run before the data directory is deleted.
#[derive(Default)]
pub struct StoreRegistry {
    stores: Mutex<HashMap<PathBuf, StoreHandle>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached handle for `path`, opening the store on first use.
    pub fn acquire(&self, path: &Path) -> Result<StoreHandle> {
        let key = canonical_store_path(path)?;

        let mut stores = self.stores.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = stores.get(&key) {
            return Ok(Arc::clone(handle));
        }

        let handle: StoreHandle = Arc::new(Mutex::new(open_store(&key)?));
        stores.insert(key, Arc::clone(&handle));
        Ok(handle)
    }

    /// Close every cached handle. Returns how many stores were released.
    ///
    /// Handles still borrowed elsewhere are dropped from the registry and close
    /// when their last clone goes away.
    pub fn close_all(&self) -> usize {
        let drained: Vec<(PathBuf, StoreHandle)> = {
            let mut stores = self.stores.lock().unwrap_or_else(|e| e.into_inner());
            stores.drain().collect()
        };

        let count = drained.len();
        for (path, handle) in drained {
            match Arc::try_unwrap(handle) {
                Ok(mutex) => {
                    let conn = mutex.into_inner().unwrap_or_else(|e| e.into_inner());
                    if let Err((_, e)) = conn.close() {
                        tracing::warn!(path = %path.display(), error = %e, "failed to close store");
                    }
                }
                Err(_) => {
                    tracing::debug!(path = %path.display(), "store still in use; closing on last drop");
                }
            }
        }

        if count > 0 {
            tracing::info!(stores = count, "closed memory stores");
        }
        count
    }

    /// Number of stores currently open.
    pub fn len(&self) -> usize {
        self.stores.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for StoreRegistry {
    fn drop(&mut self) {
        self.close_all();
    }
}

/// Create the parent directory and resolve it, so that equivalent spellings of
/// one path share a handle.
fn canonical_store_path(path: &Path) -> Result<PathBuf> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| MemoryError::storage_unavailable(path, "store path has no file name"))?;

    std::fs::create_dir_all(parent).map_err(|e| MemoryError::storage_unavailable(parent, e))?;
    let parent = std::fs::canonicalize(parent).map_err(|e| MemoryError::storage_unavailable(parent, e))?;
    Ok(parent.join(file_name))
}
