#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use lumencore::config::{LumenConfig, ScopePolicy};
use lumencore::db::StoreRegistry;
use lumencore::memory::types::{Category, CreateMemoryInput, Memory, Scope};
use lumencore::memory::MemoryCore;
use tempfile::TempDir;

/// A data directory, a registry, and services bound to one project inside a temp dir.
pub struct TestEnv {
    pub dir: TempDir,
    pub registry: Arc<StoreRegistry>,
    pub config: Arc<LumenConfig>,
    pub project: PathBuf,
    pub core: MemoryCore,
}

impl TestEnv {
    pub fn data_dir(&self) -> PathBuf {
        self.config.resolved_data_dir()
    }

    /// Services for another project sharing this env's data dir and registry.
    pub fn sibling(&self, name: &str) -> MemoryCore {
        MemoryCore::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.config),
            &self.dir.path().join(name),
        )
    }
}

/// Fresh environment with the given scope policy.
pub fn test_env(policy: ScopePolicy) -> TestEnv {
    let dir = TempDir::new().unwrap();
    let mut config = LumenConfig::default();
    config.storage.data_dir = dir.path().join("data").to_string_lossy().into_owned();
    config.storage.memory_scope = policy;
    let config = Arc::new(config);

    let registry = Arc::new(StoreRegistry::new());
    let project = dir.path().join("project");
    let core = MemoryCore::new(Arc::clone(&registry), Arc::clone(&config), &project);

    TestEnv {
        dir,
        registry,
        config,
        project,
        core,
    }
}

/// Create a memory with an explicit importance and scope.
pub fn remember(
    core: &MemoryCore,
    category: Category,
    title: &str,
    content: &str,
    importance: u8,
    scope: Scope,
) -> Memory {
    let mut input = CreateMemoryInput::new(category, title, content);
    input.importance = Some(importance);
    input.scope = Some(scope);
    core.memories.create(input).unwrap()
}

pub fn titles(memories: &[Memory]) -> Vec<&str> {
    memories.iter().map(|m| m.title.as_str()).collect()
}
