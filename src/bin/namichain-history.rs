#![forbid(unsafe_code)]
//! Prints the blocks of a local chain file, or the history of one key.

use chrono::{DateTime, Utc};
use clap::Parser;
use namichain::config::load_config_from;
use namichain::persistence::{load_blockchain, FileStore};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
    /// Chain file to read (overrides storage.path)
    #[arg(long)]
    chain: Option<PathBuf>,
    /// Only show blocks that write this key
    #[arg(long)]
    key: Option<String>,
    /// Also list each block's transactions
    #[arg(short, long)]
    verbose: bool,
}

fn format_timestamp(ts: u32) -> String {
    DateTime::<Utc>::from_timestamp(ts as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config_from(&cli.config)?;
    let store = FileStore::new(
        cli.chain
            .unwrap_or_else(|| PathBuf::from(&config.storage.path)),
    );
    let chain = load_blockchain(&store, config.ledger.fresh_chain())?;

    println!("Chain: {}", store.path().display());
    println!("Blocks: {}", chain.height());
    println!();

    let mut shown = 0;
    for (height, block) in chain.blocks().iter().enumerate() {
        if let Some(key) = &cli.key {
            if block.get(key).is_none() {
                continue;
            }
        }
        shown += 1;

        println!("#{:<6} {}", height, block.hash_hex());
        println!("        prev:  {}", hex::encode(block.header.prev_hash));
        println!("        time:  {}", format_timestamp(block.header.timestamp));
        println!("        nonce: {}", block.header.nonce);
        println!("        txs:   {}", block.tx_count());

        for tx in block.transactions() {
            let matches_key = cli.key.as_deref().map_or(true, |k| k == tx.key());
            if cli.verbose || (cli.key.is_some() && matches_key) {
                println!("          {} = {}", tx.key(), tx.value());
            }
        }
    }

    if let Some(key) = &cli.key {
        match chain.get(key) {
            Ok(value) => println!("\n{} = {} ({} block(s))", key, value, shown),
            Err(_) => println!("\n{} has never been written", key),
        }
    }
    Ok(())
}
