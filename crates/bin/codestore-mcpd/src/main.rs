//! Daemon entry point for the codestore MCP server.
//!
//! Loads configuration from the environment, builds the shared codestore
//! handle once, and serves the MCP protocol over stdio and/or streamable HTTP.

mod bootstrap;
mod config;

use std::sync::Arc;

use codestore_core::control::Codestore;
use codestore_mcp::server::{McpHttpServerConfig, serve_stdio, serve_streamable_http};
use tracing::info;

use crate::bootstrap::{BootstrapError, build_codestore};
use crate::config::CodestoreConfig;

#[tokio::main]
async fn main() -> Result<(), BootstrapError> {
    init_tracing();
    let config = CodestoreConfig::from_args()?;
    info!(?config, "starting codestore-mcpd");

    let codestore: Arc<dyn Codestore> = build_codestore(&config).await?;

    let http = config.mcp_serve.then(|| {
        let codestore = Arc::clone(&codestore);
        let http_config = McpHttpServerConfig::new(config.mcp_http_addr);
        tokio::spawn(async move { serve_streamable_http(codestore, http_config).await })
    });

    if config.enable_stdio {
        serve_stdio(codestore).await?;
    } else if let Some(http) = http {
        http.await??;
    }
    Ok(())
}

/// Logs go to stderr so the stdio transport owns stdout.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
