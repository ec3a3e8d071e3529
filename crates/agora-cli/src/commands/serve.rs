//! Serve command - run the HTTP API
//!
//! Usage:
//! ```bash
//! agora serve
//! agora serve --port 9000 --database-url sqlite://agora.db
//! ```

use anyhow::{Context, Result};
use clap::Args;
use std::net::SocketAddr;
use std::time::Duration;

use agora_api::{AgoraServer, ServerConfig};
use agora_llm::LlmConfig;
use agora_runtime::RuntimeConfig;

/// Arguments for the serve command
#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on (overrides AGORA_PORT / PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite URL for session storage (in memory when unset)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Request timeout in seconds (overrides AGORA_TIMEOUT_SECS)
    #[arg(long)]
    timeout_secs: Option<u64>,
}

/// Run the serve command
pub async fn run(args: ServeArgs) -> Result<()> {
    let mut config = ServerConfig::from_env();
    if let Some(port) = args.port {
        config.addr = SocketAddr::from(([0, 0, 0, 0], port));
    }
    if let Some(url) = args.database_url.filter(|u| !u.is_empty()) {
        config.database_url = Some(url);
    }
    if let Some(secs) = args.timeout_secs {
        config.timeout = Duration::from_secs(secs);
    }

    let llm = LlmConfig::from_env().context("Invalid LLM configuration")?;
    let runtime = RuntimeConfig::from_env().context("Invalid runtime configuration")?;
    tracing::info!(provider = ?llm.provider, scorer = ?llm.scorer, "Starting Agora API");

    let server = AgoraServer::new(config, llm, runtime)
        .await
        .context("Failed to initialize server")?;
    server.run().await.context("Server failed")?;
    Ok(())
}
