//! CLI `setup` command: write the configuration file from flags.

use anyhow::{ensure, Context, Result};

use lumencore::config::{ConfigManager, LumenConfig, ScopePolicy};

/// Flag values for `setup`; anything left `None` keeps its default.
pub struct SetupArgs {
    pub scope: Option<ScopePolicy>,
    pub data_dir: Option<String>,
    pub importance: Option<u8>,
    pub max_context_tokens: Option<usize>,
    pub force: bool,
}

/// Build a config from defaults plus `args` and save it.
///
/// An existing config is left alone unless `force` is set.
pub fn setup(manager: &ConfigManager, args: SetupArgs) -> Result<()> {
    if manager.is_configured() && !args.force {
        println!(
            "LumenCore is already configured at {}.",
            manager.config_path().display()
        );
        println!("Run with --force to overwrite it.");
        return Ok(());
    }

    let config = build_config(args)?;

    let data_dir = config.resolved_data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;
    manager.save(&config)?;

    println!("Configuration Summary");
    println!("{}", "=".repeat(40));
    println!("  Memory scope:        {}", config.storage.memory_scope);
    println!("  Data directory:      {}", data_dir.display());
    println!("  Default importance:  {}", config.memory.default_importance);
    println!("  Max context tokens:  {}", config.retrieval.max_context_tokens);
    println!();
    println!("Configuration saved to {}", manager.config_path().display());
    println!("Register the server with your MCP client as: lumencore serve");
    Ok(())
}

fn build_config(args: SetupArgs) -> Result<LumenConfig> {
    let mut config = LumenConfig::default();
    if let Some(scope) = args.scope {
        config.storage.memory_scope = scope;
    }
    if let Some(data_dir) = args.data_dir {
        ensure!(!data_dir.trim().is_empty(), "data directory must not be empty");
        config.storage.data_dir = data_dir;
    }
    if let Some(importance) = args.importance {
        ensure!((1..=5).contains(&importance), "importance must be between 1 and 5");
        config.memory.default_importance = importance;
    }
    if let Some(tokens) = args.max_context_tokens {
        ensure!(tokens > 0, "max context tokens must be positive");
        config.retrieval.max_context_tokens = tokens;
    }
    Ok(config)
}
