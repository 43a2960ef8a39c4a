//! Project identity and store locations.
//!
//! Each project gets its own store under `{data_dir}/projects/{project_id}/memories.db`;
//! global memories live in `{data_dir}/global/memories.db`.

use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};

/// Literal `project_id` stored on global-scope records.
pub const GLOBAL_PROJECT_ID: &str = "global";

const STORE_FILE: &str = "memories.db";

/// Files or directories whose presence marks a project root.
const PROJECT_MARKERS: &[&str] = &[
    ".git",
    "package.json",
    "Cargo.toml",
    "go.mod",
    "pyproject.toml",
    ".lumencore",
];

/// Derive the stable 16-hex-character identifier for a project path.
///
/// The path is made absolute and lexically normalised first, so `./a/../b` and
/// `/cwd/b` map to the same id. Symlinks are not resolved.
pub fn project_id(project_path: &Path) -> String {
    let normalized = normalize(project_path);
    let digest = Sha256::digest(normalized.to_string_lossy().as_bytes());
    digest[..8].iter().fold(String::with_capacity(16), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

pub fn project_db_path(data_dir: &Path, project_path: &Path) -> PathBuf {
    data_dir
        .join("projects")
        .join(project_id(project_path))
        .join(STORE_FILE)
}

pub fn global_db_path(data_dir: &Path) -> PathBuf {
    data_dir.join("global").join(STORE_FILE)
}

/// Walk upward from `start` until a directory containing a project marker is found.
/// Falls back to `start` itself.
pub fn find_project_root(start: &Path) -> PathBuf {
    let start = normalize(start);
    for dir in start.ancestors() {
        if dir.parent().is_none() {
            break;
        }
        if PROJECT_MARKERS.iter().any(|m| dir.join(m).exists()) {
            return dir.to_path_buf();
        }
    }
    start
}

/// Absolute path with `.` and `..` components removed.
fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
