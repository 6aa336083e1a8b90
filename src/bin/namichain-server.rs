#![forbid(unsafe_code)]
//! NamiChain HTTP service: serves the ledger and the mining contract.

use clap::Parser;
use namichain::api::run_api_server;
use namichain::config::load_config_from;
use namichain::node::Node;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
    /// Port to listen on (overrides config and the PORT variable)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config_from(&cli.config)?;

    let port = match cli.port {
        Some(port) => port,
        None => std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(config.server.port),
    };
    let addr: SocketAddr = format!("{}:{}", config.server.host, port).parse()?;

    let node = Arc::new(Node::init(&config)?);
    info!(blocks = node.height().await, "starting NamiChain server");

    run_api_server(node.clone(), addr, async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown requested"),
            Err(e) => {
                error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        }
    })
    .await?;

    node.save().await?;
    info!("chain saved, bye");
    Ok(())
}
