use anyhow::{Context, Result};
use clap::Parser;
use meshroom_relay::{RelayService, router};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Signaling relay for meshroom sessions.
#[derive(Parser)]
#[command(name = "meshroom-relay", version)]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cli.bind))?;
    info!("Relay listening on ws://{}/ws", cli.bind);

    axum::serve(listener, router(RelayService::new()))
        .await
        .context("Relay server stopped")?;
    Ok(())
}
