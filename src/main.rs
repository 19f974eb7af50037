use std::sync::Arc;

use anyhow::Result;
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use tracing_subscriber::EnvFilter;

use staysync::config::{find_config_path, load_config};
use staysync::engine::StayEngine;
use staysync::mcp::server::StaySyncMcpServer;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to stderr (stdout is reserved for MCP JSON-RPC)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Starting staysync server");

    let config_path = find_config_path();
    let config = load_config(&config_path)?;

    let engine = Arc::new(StayEngine::from_config(&config).await?);
    let server = StaySyncMcpServer::new(engine);

    // Start MCP server over stdio
    let service = server.serve(stdio()).await?;
    service.waiting().await?;

    tracing::info!("staysync server stopped");
    Ok(())
}
