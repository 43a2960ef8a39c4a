//! MCP server initialization for the stdio transport.
//!
//! [`serve_stdio`] wires the store registry, the memory services, and the MCP tool
//! handler into a running server, and closes every store on the way out.

use anyhow::Result;
use rmcp::ServiceExt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use lumencore::config::LumenConfig;
use lumencore::db::StoreRegistry;
use lumencore::memory::MemoryCore;

use crate::tools::LumenTools;

/// Start the MCP server over stdio for the project at `project_path`.
///
/// Returns when the client disconnects, or on Ctrl-C or SIGTERM.
pub async fn serve_stdio(
    config: Arc<LumenConfig>,
    registry: Arc<StoreRegistry>,
    project_path: PathBuf,
) -> Result<()> {
    tracing::info!(
        project = %project_path.display(),
        scope = %config.storage.memory_scope,
        data_dir = %config.resolved_data_dir().display(),
        "starting LumenCore MCP server on stdio"
    );

    let core = Arc::new(MemoryCore::new(Arc::clone(&registry), config, &project_path));
    let tools = LumenTools::new(core);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    // Dropping the running service on a shutdown signal cancels it
    let waiting = async move { server.waiting().await.map(|_| ()).map_err(anyhow::Error::from) };
    run_until_shutdown(waiting, shutdown_signal(), &registry).await
}

/// Drive `waiting` until it finishes or `shutdown` fires, then close every
/// store whichever way the server stopped.
async fn run_until_shutdown<W, S>(waiting: W, shutdown: S, registry: &StoreRegistry) -> Result<()>
where
    W: Future<Output = Result<()>>,
    S: Future<Output = std::io::Result<&'static str>>,
{
    let outcome = tokio::select! {
        result = waiting => result,
        signal = shutdown => signal.map(|name| {
            tracing::info!(signal = name, "shutdown signal received");
        }).map_err(anyhow::Error::from),
    };

    let closed = registry.close_all();
    tracing::info!(closed, "MCP server shut down");
    outcome
}

/// Resolve on Ctrl-C or, on Unix, SIGTERM. Yields the signal's name.
#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|_| "interrupt"),
        _ = terminate.recv() => Ok("terminate"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|_| "interrupt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn stores_are_closed_when_a_signal_stops_the_server() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::new();
        registry.acquire(&dir.path().join("memories.db")).unwrap();
        assert_eq!(registry.len(), 1);

        let never_done = std::future::pending::<Result<()>>();
        run_until_shutdown(never_done, async { Ok("terminate") }, &registry)
            .await
            .unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn stores_are_closed_when_the_client_disconnects() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::new();
        registry.acquire(&dir.path().join("memories.db")).unwrap();

        let failed = async { Err(anyhow::anyhow!("transport closed")) };
        let never_signalled = std::future::pending::<std::io::Result<&'static str>>();
        let err = run_until_shutdown(failed, never_signalled, &registry)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "transport closed");
        assert!(registry.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn sigterm_triggers_shutdown() {
        let listener = tokio::spawn(shutdown_signal());
        // Give the handler time to register before signalling
        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let name = tokio::time::timeout(Duration::from_secs(5), listener)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(name, "terminate");
    }
}
