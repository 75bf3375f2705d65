//! Shard remote server binary

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shard::LocalStore;
use shard_server::{app, ServerState};

/// Serve blocks and manifests for shard clients
#[derive(Debug, Parser)]
#[command(name = "shard-server", version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8000")]
    addr: SocketAddr,

    /// Storage root directory
    #[arg(long, default_value = "server_storage")]
    root: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("shard_server=info,tower_http=info")),
        )
        .init();

    let store = LocalStore::new(&args.root);
    store
        .init()
        .with_context(|| format!("failed to initialize storage at {}", args.root.display()))?;

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("failed to bind {}", args.addr))?;
    info!(addr = %args.addr, root = %args.root.display(), "shard-server listening");

    axum::serve(listener, app(ServerState::new(store)))
        .await
        .context("server error")?;
    Ok(())
}
