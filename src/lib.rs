//! Persistent project memory for AI coding agents, served over MCP.
//!
//! LumenCore keeps short structured notes (decisions, patterns, concepts, notes,
//! tasks) in SQLite so an agent can recall them in later sessions. Every project
//! gets its own store file; an optional global store is shared by all projects.
//!
//! | Category | Holds |
//! |----------|-------|
//! | **decision** | Architectural choices |
//! | **pattern** | Code conventions |
//! | **concept** | Domain knowledge |
//! | **note** | Observations |
//! | **task** | Work items |
//!
//! # Architecture
//!
//! - **Storage**: one SQLite file per scope, with an FTS5 shadow index kept in sync by triggers
//! - **Search**: BM25 keyword search, falling back to substring matching when FTS5 is unusable
//! - **Context**: greedy packing of the most important memories into a character budget
//! - **Transport**: MCP over stdio
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from a TOML file and environment variables
//! - [`db`]: Store files, schema, migrations, and the shared handle registry
//! - [`error`]: The [`MemoryError`] type returned by every library operation
//! - [`memory`]: Memory CRUD, keyword search, and context assembly
//! - [`paths`]: Project identity and store file locations

pub mod config;
pub mod db;
pub mod error;
pub mod memory;
pub mod paths;

pub use error::{MemoryError, Result};
