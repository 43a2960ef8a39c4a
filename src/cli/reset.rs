//! CLI `reset` command: delete every store and the configuration.

use anyhow::{Context, Result};

use lumencore::config::{default_config_dir, ConfigManager};
use lumencore::db::StoreRegistry;

/// Delete the data directory and config file. Does nothing without `force`.
pub fn reset(manager: &ConfigManager, registry: &StoreRegistry, force: bool) -> Result<()> {
    if !manager.is_configured() {
        println!("LumenCore is not configured. Nothing to reset.");
        return Ok(());
    }

    if !force {
        println!("WARNING: This will permanently delete ALL LumenCore memories and configuration.");
        println!("Run with --force to confirm.");
        return Ok(());
    }

    let config = manager.load()?;
    let data_dir = config.resolved_data_dir();

    // Store files must be closed before their directory goes away
    registry.close_all();

    if data_dir.exists() {
        std::fs::remove_dir_all(&data_dir)
            .with_context(|| format!("failed to delete data directory: {}", data_dir.display()))?;
        println!("Deleted data directory: {}", data_dir.display());
    }

    manager.reset()?;
    println!("Deleted configuration: {}", manager.config_path().display());

    // Leave the config directory only if something else lives there
    let config_dir = default_config_dir();
    if manager.config_path().parent() == Some(config_dir.as_path()) {
        let is_empty = std::fs::read_dir(&config_dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if is_empty {
            std::fs::remove_dir(&config_dir).ok();
        }
    }

    println!("Reset complete. Run `lumencore setup` to reconfigure.");
    Ok(())
}
