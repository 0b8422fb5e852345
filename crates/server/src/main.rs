//! sw-cache server entry point.
//!
//! Boots the strategy engine (config, SQLite store, reqwest transport), runs
//! install and activation, then serves MCP over stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use swcache_client::{Engine, FetchClient, FetchConfig};
use swcache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(origin = %config.origin, version = %config.version, db = %config.db_path.display(), "starting sw-cache on stdio transport");

    let db = CacheDb::open(&config.db_path).await?;
    let transport = FetchClient::new(FetchConfig::from(&config))?;
    let engine = Arc::new(Engine::new(config, Arc::new(db), Arc::new(transport))?);

    let install = engine.on_install().await;
    if !install.is_complete() {
        tracing::warn!(failed = ?install.failed, "precache incomplete");
    }
    engine.on_activate().await;

    let handler = handler::SwCacheServer::new(engine);
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;

    Ok(())
}
