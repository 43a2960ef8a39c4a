use anyhow::Result;
use std::sync::Arc;

use lumencore::config::ConfigManager;
use lumencore::db::StoreRegistry;
use lumencore::memory::MemoryCore;

/// Print the configuration and memory counts for the project enclosing the
/// current directory.
pub fn status(manager: &ConfigManager, registry: &Arc<StoreRegistry>) -> Result<()> {
    println!("LumenCore Status");
    println!("{}", "=".repeat(40));

    if !manager.is_configured() {
        println!("  Status:              not configured");
        println!();
        println!("Run `lumencore setup` to configure LumenCore.");
        return Ok(());
    }

    let config = manager.load()?;
    println!("  Status:              configured");
    println!("  Config file:         {}", manager.config_path().display());
    println!("  Memory scope:        {}", config.storage.memory_scope);
    println!("  Data directory:      {}", config.resolved_data_dir().display());
    println!("  Default importance:  {}", config.memory.default_importance);
    println!("  Max context tokens:  {}", config.retrieval.max_context_tokens);
    println!();

    let project_path = super::resolve_project_path(None)?;
    let core = MemoryCore::new(Arc::clone(registry), Arc::clone(&config), &project_path);
    let stats = core.memories.get_stats()?;

    println!("Memory Statistics:");
    println!("  Current project:     {}", project_path.display());
    println!("  Project memories:    {}", stats.project);
    if let Some(global) = stats.global {
        println!("  Global memories:     {global}");
    }

    registry.close_all();
    Ok(())
}
