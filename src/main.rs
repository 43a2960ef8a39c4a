mod cli;
mod server;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use lumencore::config::{ConfigManager, ScopePolicy};
use lumencore::db::StoreRegistry;

#[derive(Parser)]
#[command(name = "lumencore", version, about = "Persistent project memory for AI coding agents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio transport)
    Serve {
        /// Project to serve memories for (default: $LUMENCORE_PROJECT, then the enclosing project root)
        project_path: Option<PathBuf>,
    },
    /// Write the configuration file
    Setup {
        /// Which stores are in play: project-only or project-and-global
        #[arg(long)]
        scope: Option<ScopePolicy>,
        /// Directory holding the store files
        #[arg(long)]
        data_dir: Option<String>,
        /// Importance given to memories created without one (1-5)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        importance: Option<u8>,
        /// Default token budget for get_context
        #[arg(long)]
        max_context_tokens: Option<usize>,
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },
    /// Show configuration and memory counts for the current project
    Status,
    /// Delete all stored memories and the configuration
    Reset {
        /// Confirm the deletion
        #[arg(long, short)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let manager = ConfigManager::new();
    let registry = Arc::new(StoreRegistry::new());

    // Logging starts before the first config load so the load is logged.
    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(manager.log_level()).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { project_path } => {
            let config = manager.load()?;
            let project_path = cli::resolve_project_path(project_path)?;
            server::serve_stdio(config, registry, project_path).await?;
        }
        Command::Setup {
            scope,
            data_dir,
            importance,
            max_context_tokens,
            force,
        } => {
            cli::setup::setup(
                &manager,
                cli::setup::SetupArgs {
                    scope,
                    data_dir,
                    importance,
                    max_context_tokens,
                    force,
                },
            )?;
        }
        Command::Status => {
            cli::status::status(&manager, &registry)?;
        }
        Command::Reset { force } => {
            cli::reset::reset(&manager, &registry, force)?;
        }
    }

    Ok(())
}
