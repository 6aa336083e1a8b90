//! Configuration management for NamiChain

use crate::blockchain::{Blockchain, Network};
use crate::error::ChainError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub miner: MinerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_chain_path")]
    pub path: String,
    /// Save the whole chain after every accepted block.
    #[serde(default = "default_true")]
    pub autosave: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub network: Network,
    /// Reject blocks whose `tx_hash` does not match their transactions.
    #[serde(default)]
    pub verify_tx_hash: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinerConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// 0 or 1 searches on the calling thread; more uses a rayon pool.
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Random keys written (and later read back) per round in tester mode.
    #[serde(default)]
    pub test_keys: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_chain_path(),
            autosave: true,
        }
    }
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            threads: default_threads(),
            poll_interval_secs: default_poll_interval(),
            test_keys: 0,
        }
    }
}

impl LedgerConfig {
    /// A genesis-only chain carrying these options.
    pub fn fresh_chain(&self) -> Blockchain {
        Blockchain::new(self.network).with_tx_hash_verification(self.verify_tx_hash)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_chain_path() -> String {
    "./data/_blockchain_nami.bin".to_string()
}

fn default_true() -> bool {
    true
}

fn default_server_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_threads() -> usize {
    1
}

fn default_poll_interval() -> u64 {
    2
}

pub fn load_config() -> Result<Config, ChainError> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

/// Reads `path`, falling back to defaults when the file is absent or empty.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let config_str = fs::read_to_string(path.as_ref()).unwrap_or_default();
    let config = parse_config(&config_str)?;
    Ok(config)
}

pub fn parse_config(config_str: &str) -> Result<Config, ChainError> {
    let config: Config = if config_str.trim().is_empty() {
        Config::default()
    } else {
        toml::from_str(config_str).map_err(|e| ChainError::ConfigError(e.to_string()))?
    };

    // Validate critical values
    if config.storage.path.is_empty() {
        return Err(ChainError::ConfigError(
            "storage.path must be set in config.toml".to_string(),
        ));
    }

    if config.miner.server_url.is_empty() {
        return Err(ChainError::ConfigError(
            "miner.server_url must be set in config.toml".to_string(),
        ));
    }

    Ok(config)
}
