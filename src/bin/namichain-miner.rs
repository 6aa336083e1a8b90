#![forbid(unsafe_code)]
//! Remote miner for NamiChain.
//!
//! Polls the server for a mining template, searches for a nonce off the async
//! runtime and submits the sealed block. In tester mode every round also
//! writes random keys and, once they are mined, reads a sample back.

use clap::Parser;
use namichain::blockchain::MiningTemplate;
use namichain::client::ApiClient;
use namichain::config::load_config_from;
use namichain::error::ChainError;
use namichain::miner::{mine_range, mine_range_parallel, SearchOutcome};
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const TEST_STRING_LEN: usize = 10;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
    /// Server URL (overrides miner.server_url)
    #[arg(long)]
    server: Option<String>,
    /// Search threads (overrides miner.threads)
    #[arg(long)]
    threads: Option<usize>,
    /// Random keys written per round (overrides miner.test_keys)
    #[arg(long)]
    test_keys: Option<usize>,
    /// Exit after one block has been accepted
    #[arg(long)]
    once: bool,
}

struct Miner {
    client: ApiClient,
    pool: Option<rayon::ThreadPool>,
    stop: Arc<AtomicBool>,
}

/// Runs the nonce search on a blocking worker so the runtime keeps
/// servicing the shutdown signal.
async fn solve(miner: Arc<Miner>, template: MiningTemplate) -> Result<SearchOutcome, ChainError> {
    tokio::task::spawn_blocking(move || {
        let MiningTemplate { block, target } = template;
        match &miner.pool {
            Some(pool) => {
                pool.install(|| mine_range_parallel(block, &target, 0..=u32::MAX, &miner.stop))
            }
            None => mine_range(block, &target, 0..=u32::MAX, &miner.stop),
        }
    })
    .await
    .map_err(|e| ChainError::ApiError(format!("search task failed: {}", e)))
}

fn random_string(rng: &mut impl Rng) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(TEST_STRING_LEN)
        .map(char::from)
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config_from(&cli.config)?.miner;
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    if let Some(threads) = cli.threads {
        config.threads = threads;
    }
    if let Some(test_keys) = cli.test_keys {
        config.test_keys = test_keys;
    }

    let pool = if config.threads > 1 {
        Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(config.threads)
                .build()?,
        )
    } else {
        None
    };

    let miner = Arc::new(Miner {
        client: ApiClient::new(&config.server_url)?,
        pool,
        stop: Arc::new(AtomicBool::new(false)),
    });

    let stop = miner.stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            stop.store(true, Ordering::Relaxed);
        }
    });

    info!(
        server = %miner.client.base_url(),
        threads = config.threads,
        test_keys = config.test_keys,
        "miner starting"
    );

    let poll_interval = Duration::from_secs(config.poll_interval_secs);
    let mut rng = rand::thread_rng();
    // Keys written by this miner whose block has been accepted.
    let mut confirmed: HashMap<String, String> = HashMap::new();

    while !miner.stop.load(Ordering::Relaxed) {
        let mut written = Vec::with_capacity(config.test_keys);
        for _ in 0..config.test_keys {
            let (key, value) = (random_string(&mut rng), random_string(&mut rng));
            miner.client.set(&key, &value).await?;
            written.push((key, value));
        }
        if !written.is_empty() {
            info!(count = written.len(), "added random keys");
        }

        let template = match miner.client.get_mining_template().await {
            Ok(template) => template,
            Err(e) => {
                warn!(error = %e, "could not fetch template");
                tokio::time::sleep(poll_interval).await;
                continue;
            }
        };
        if template.block.tx_count() == 0 {
            tokio::time::sleep(poll_interval).await;
            continue;
        }
        info!(
            txs = template.block.tx_count(),
            target = %template.target,
            "got block template"
        );

        let started = Instant::now();
        let block = match solve(miner.clone(), template).await? {
            SearchOutcome::Found(block) => block,
            SearchOutcome::Exhausted => {
                warn!("nonce space exhausted, fetching a fresh template");
                continue;
            }
            SearchOutcome::Stopped { .. } => break,
        };
        info!(
            nonce = block.header.nonce,
            hash = %block.hash_hex(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "found winning nonce"
        );

        match miner.client.submit_block(&block).await {
            Ok(()) => info!("block accepted"),
            Err(ChainError::InvalidBlock(reason)) => {
                warn!(%reason, "block rejected, retrying with a fresh template");
                continue;
            }
            Err(e) => return Err(e.into()),
        }
        confirmed.extend(written);

        if config.test_keys > 0 {
            let keys: Vec<&String> = confirmed.keys().collect();
            for key in keys.choose_multiple(&mut rng, config.test_keys) {
                let expected = &confirmed[*key];
                match miner.client.get(key).await {
                    Ok(value) if &value == expected => {}
                    Ok(value) => {
                        error!(%key, %expected, got = %value, "stored value mismatch");
                        return Err(format!("key {} holds the wrong value", key).into());
                    }
                    Err(ChainError::KeyNotFound(_)) => {
                        error!(%key, "key should be stored but isn't");
                        return Err(format!("key {} is missing", key).into());
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            info!("key trialing success");
        }

        if cli.once {
            break;
        }
    }

    info!("miner stopped");
    Ok(())
}
