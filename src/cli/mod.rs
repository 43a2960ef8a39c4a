//! Terminal subcommands: `setup`, `status`, and `reset`.

pub mod reset;
pub mod setup;
pub mod status;

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Env var naming the project to serve when no path argument is given.
pub const PROJECT_ENV: &str = "LUMENCORE_PROJECT";

/// Project path for `serve`: the argument, then `$LUMENCORE_PROJECT`, then the
/// project root enclosing the current directory.
pub fn resolve_project_path(arg: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = arg {
        return Ok(path);
    }
    if let Some(path) = std::env::var_os(PROJECT_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    Ok(lumencore::paths::find_project_root(&cwd))
}
