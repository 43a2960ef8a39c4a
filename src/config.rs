use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::error::{MemoryError, Result};

/// Config file format version written by this binary.
pub const CONFIG_VERSION: u32 = 1;

/// Which scopes the memory core may read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScopePolicy {
    /// Only the current project's store is used.
    ProjectOnly,
    /// The project store plus the shared global store.
    ProjectAndGlobal,
}

impl ScopePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectOnly => "project-only",
            Self::ProjectAndGlobal => "project-and-global",
        }
    }

    pub fn allows_global(&self) -> bool {
        matches!(self, Self::ProjectAndGlobal)
    }
}

impl std::fmt::Display for ScopePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScopePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "project-only" => Ok(Self::ProjectOnly),
            "project-and-global" => Ok(Self::ProjectAndGlobal),
            _ => Err(format!("unknown memory scope policy: {s}")),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LumenConfig {
    pub version: u32,
    pub storage: StorageConfig,
    pub memory: MemoryConfig,
    pub retrieval: RetrievalConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
    pub memory_scope: ScopePolicy,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MemoryConfig {
    pub default_importance: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub max_context_tokens: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

impl Default for LumenConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: StorageConfig::default(),
            memory: MemoryConfig::default(),
            retrieval: RetrievalConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().into_owned(),
            memory_scope: ScopePolicy::ProjectOnly,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            default_importance: 3,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 4000,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

/// Returns the platform data directory for stores, e.g. `~/.local/share/lumencore`.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_default()
        .join("lumencore")
}

/// Returns the platform config directory, e.g. `~/.config/lumencore`.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_default()
        .join("lumencore")
}

/// Returns the default config file path: `<config_dir>/lumencore/config.toml`
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

impl LumenConfig {
    /// Resolve the data directory, expanding `~` if needed.
    pub fn resolved_data_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.data_dir)
    }

    pub fn scope_policy(&self) -> ScopePolicy {
        self.storage.memory_scope
    }

    /// Apply LUMENCORE_DATA_DIR, LUMENCORE_SCOPE and LUMENCORE_LOG_LEVEL as
    /// resolved by `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("LUMENCORE_DATA_DIR") {
            self.storage.data_dir = val;
        }
        if let Some(val) = lookup("LUMENCORE_SCOPE") {
            match val.parse() {
                Ok(policy) => self.storage.memory_scope = policy,
                Err(e) => tracing::warn!(error = %e, "ignoring LUMENCORE_SCOPE"),
            }
        }
        if let Some(val) = lookup("LUMENCORE_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Loads, caches, saves, and resets the on-disk configuration.
///
/// The first successful [`load`](Self::load) is cached for the life of the manager;
/// only [`save`](Self::save) and [`reset`](Self::reset) replace or clear it.
pub struct ConfigManager {
    path: PathBuf,
    cached: Mutex<Option<Arc<LumenConfig>>>,
    env: fn(&str) -> Option<String>,
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

impl ConfigManager {
    /// Manager for the default config location.
    pub fn new() -> Self {
        Self::with_path(default_config_path())
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: Mutex::new(None),
            env: process_env,
        }
    }

    /// Read overrides from `env` instead of the process environment.
    pub fn with_env(mut self, env: fn(&str) -> Option<String>) -> Self {
        self.env = env;
        self
    }

    /// Log level to start logging with. Read before [`load`](Self::load) so that
    /// load is logged too; never migrates, caches or fails.
    pub fn log_level(&self) -> String {
        if let Some(level) = (self.env)("LUMENCORE_LOG_LEVEL") {
            return level;
        }
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|contents| toml::from_str::<LumenConfig>(&contents).ok())
            .map(|config| config.server.log_level)
            .unwrap_or_else(|| ServerConfig::default().log_level)
    }

    pub fn config_path(&self) -> &Path {
        &self.path
    }

    pub fn is_configured(&self) -> bool {
        self.path.exists()
    }

    /// Load the config file, then apply env var overrides.
    ///
    /// Fails with [`MemoryError::NotConfigured`] if no config has ever been saved.
    /// Files written by an older version are merged over defaults and re-saved.
    pub fn load(&self) -> Result<Arc<LumenConfig>> {
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(config) = cached.as_ref() {
            return Ok(Arc::clone(config));
        }

        if !self.is_configured() {
            return Err(MemoryError::NotConfigured {
                path: self.path.clone(),
            });
        }

        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| MemoryError::config(format!("failed to read {}: {e}", self.path.display())))?;
        let mut config: LumenConfig = toml::from_str(&contents)
            .map_err(|e| MemoryError::config(format!("failed to parse {}: {e}", self.path.display())))?;

        if config.version < CONFIG_VERSION {
            info!(from = config.version, to = CONFIG_VERSION, "migrating config file");
            config.version = CONFIG_VERSION;
            self.write(&config)?;
        }

        config.apply_overrides(self.env);
        let config = Arc::new(config);
        *cached = Some(Arc::clone(&config));
        Ok(config)
    }

    /// Write `config` to disk and make it the cached config. Env overrides apply
    /// to the cached copy only, as they would on a fresh load.
    pub fn save(&self, config: &LumenConfig) -> Result<()> {
        self.write(config)?;
        let mut effective = config.clone();
        effective.apply_overrides(self.env);
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        *cached = Some(Arc::new(effective));
        Ok(())
    }

    /// Delete the config file (if any) and drop the cached config.
    pub fn reset(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        *cached = None;
        Ok(())
    }

    fn write(&self, config: &LumenConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(config)
            .map_err(|e| MemoryError::config(format!("failed to serialize config: {e}")))?;
        std::fs::write(&self.path, contents)?;
        info!(path = %self.path.display(), "config saved");
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = LumenConfig::default();
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.storage.memory_scope, ScopePolicy::ProjectOnly);
        assert_eq!(config.memory.default_importance, 3);
        assert_eq!(config.retrieval.max_context_tokens, 4000);
        assert_eq!(config.server.log_level, "info");
        assert!(config.storage.data_dir.ends_with("lumencore"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
version = 1

[storage]
data_dir = "/tmp/lumen-data"
memory_scope = "project-and-global"

[memory]
default_importance = 4
"#;
        let config: LumenConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.storage.data_dir, "/tmp/lumen-data");
        assert_eq!(config.storage.memory_scope, ScopePolicy::ProjectAndGlobal);
        assert_eq!(config.memory.default_importance, 4);
        // defaults still apply for unset fields
        assert_eq!(config.retrieval.max_context_tokens, 4000);
    }

    #[test]
    fn overrides_apply() {
        let mut config = LumenConfig::default();
        config.apply_overrides(|key| match key {
            "LUMENCORE_DATA_DIR" => Some("/tmp/override".into()),
            "LUMENCORE_SCOPE" => Some("project-and-global".into()),
            "LUMENCORE_LOG_LEVEL" => Some("trace".into()),
            _ => None,
        });

        assert_eq!(config.storage.data_dir, "/tmp/override");
        assert_eq!(config.storage.memory_scope, ScopePolicy::ProjectAndGlobal);
        assert_eq!(config.server.log_level, "trace");
    }

    #[test]
    fn bad_scope_override_is_ignored() {
        let mut config = LumenConfig::default();
        config.apply_overrides(|key| (key == "LUMENCORE_SCOPE").then(|| "everything".into()));
        assert_eq!(config.storage.memory_scope, ScopePolicy::ProjectOnly);
    }

    #[test]
    fn load_without_file_is_not_configured() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("config.toml"));
        assert!(!manager.is_configured());
        assert!(matches!(
            manager.load(),
            Err(MemoryError::NotConfigured { .. })
        ));
    }

    #[test]
    fn save_then_load_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = LumenConfig::default();
        config.storage.memory_scope = ScopePolicy::ProjectAndGlobal;
        config.memory.default_importance = 5;
        ConfigManager::with_path(&path).save(&config).unwrap();

        // A fresh manager has no cache and must read the file.
        let manager = ConfigManager::with_path(&path);
        let loaded = manager.load().unwrap();
        assert_eq!(loaded.storage.memory_scope, ScopePolicy::ProjectAndGlobal);
        assert_eq!(loaded.memory.default_importance, 5);
    }

    #[test]
    fn load_is_cached_until_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let manager = ConfigManager::with_path(&path);
        manager.save(&LumenConfig::default()).unwrap();

        let first = manager.load().unwrap();
        std::fs::write(&path, "this is = not [valid toml").unwrap();
        let second = manager.load().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        manager.reset().unwrap();
        assert!(!path.exists());
        assert!(matches!(
            manager.load(),
            Err(MemoryError::NotConfigured { .. })
        ));
    }

    #[test]
    fn old_version_is_migrated_and_resaved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "version = 0\n[memory]\ndefault_importance = 2\n").unwrap();

        let manager = ConfigManager::with_path(&path);
        let config = manager.load().unwrap();
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.memory.default_importance, 2);

        let on_disk: LumenConfig =
            toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.version, CONFIG_VERSION);
    }

    #[test]
    fn save_caches_config_with_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let manager = ConfigManager::with_path(&path)
            .with_env(|key| (key == "LUMENCORE_DATA_DIR").then(|| "/tmp/override".into()));

        manager.save(&LumenConfig::default()).unwrap();
        assert_eq!(manager.load().unwrap().storage.data_dir, "/tmp/override");

        let on_disk: LumenConfig =
            toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.storage.data_dir, LumenConfig::default().storage.data_dir);
    }

    #[test]
    fn log_level_is_read_without_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let manager = ConfigManager::with_path(&path).with_env(|_| None);
        assert_eq!(manager.log_level(), "info");

        std::fs::write(&path, "version = 0\n[server]\nlog_level = \"debug\"\n").unwrap();
        assert_eq!(manager.log_level(), "debug");
        // Left for load to migrate
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("version = 0"));

        let manager = ConfigManager::with_path(&path)
            .with_env(|key| (key == "LUMENCORE_LOG_LEVEL").then(|| "trace".into()));
        assert_eq!(manager.log_level(), "trace");
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[storage\n").unwrap();
        let manager = ConfigManager::with_path(&path);
        assert!(matches!(manager.load(), Err(MemoryError::Config(_))));
    }
}
