#![forbid(unsafe_code)]
//! Mines one block directly into the local chain file, without a server.

use clap::Parser;
use namichain::blockchain::current_timestamp;
use namichain::config::load_config_from;
use namichain::miner::mine_block;
use namichain::persistence::{load_blockchain, FileStore, Persistence};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
    /// Chain file to extend (overrides storage.path)
    #[arg(long)]
    chain: Option<PathBuf>,
    /// Writes to include, as KEY=VALUE
    #[arg(long = "set", value_name = "KEY=VALUE")]
    writes: Vec<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config_from(&cli.config)?;
    let store = FileStore::new(
        cli.chain
            .unwrap_or_else(|| PathBuf::from(&config.storage.path)),
    );

    let mut chain = load_blockchain(&store, config.ledger.fresh_chain())?;
    for write in &cli.writes {
        let (key, value) = write
            .split_once('=')
            .ok_or_else(|| format!("expected KEY=VALUE, got `{}`", write))?;
        chain.enqueue(key, value)?;
    }

    // Keep the header timestamp ahead of the tip.
    let timestamp = current_timestamp().max(chain.top().header.timestamp.saturating_add(1));
    let template = chain.build_template(timestamp);
    let target = chain.current_target();
    info!(
        height = chain.height(),
        txs = template.tx_count(),
        %target,
        "mining block"
    );

    let started = Instant::now();
    let block = mine_block(template, &target)?;
    let elapsed = started.elapsed();
    let hash = block.hash_hex();
    let nonce = block.header.nonce;

    chain.apply_block(block)?;
    store.save_chain(chain.blocks())?;

    println!("Block #{} mined", chain.height() - 1);
    println!("  hash:    {}", hash);
    println!("  nonce:   {}", nonce);
    println!("  time:    {:.3}s", elapsed.as_secs_f64());
    println!("  saved:   {}", store.path().display());
    Ok(())
}
