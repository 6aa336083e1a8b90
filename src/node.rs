//! Server-side owner of the ledger.
//!
//! The chain and its pending queue sit behind a single `RwLock`. Writers
//! (`set`, `submit_block`) hold the write lock across validation, append,
//! queue drain and autosave; readers share the read lock.

use crate::blockchain::{Block, Blockchain, KeyStatus, MiningTemplate};
use crate::config::Config;
use crate::error::ChainError;
use crate::persistence::{load_blockchain, FileStore, Persistence};
use crate::transaction::Transaction;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Number of recent block hashes reported by [`Node::summary`].
pub const SUMMARY_BLOCKS: usize = 10;

#[derive(Debug, Clone, serde::Serialize)]
pub struct ChainSummary {
    pub block_count: usize,
    /// Newest first.
    pub last_blocks: Vec<String>,
    pub unconfirmed_txs: Vec<Transaction>,
}

#[derive(Clone)]
pub struct Node {
    blockchain: Arc<RwLock<Blockchain>>,
    persistence: Arc<dyn Persistence>,
    autosave: bool,
}

impl Node {
    pub fn new(blockchain: Blockchain, persistence: Arc<dyn Persistence>, autosave: bool) -> Self {
        Self {
            blockchain: Arc::new(RwLock::new(blockchain)),
            persistence,
            autosave,
        }
    }

    /// Opens the configured chain file. A stored chain that fails to decode or
    /// validate is returned as an error; it is never partially loaded.
    pub fn init(config: &Config) -> Result<Self, ChainError> {
        let store = FileStore::new(&config.storage.path);
        info!(path = %store.path().display(), network = ?config.ledger.network, "loading chain");
        let chain = load_blockchain(&store, config.ledger.fresh_chain())?;
        info!(blocks = chain.height(), "chain ready");
        Ok(Self::new(chain, Arc::new(store), config.storage.autosave))
    }

    pub fn blockchain(&self) -> Arc<RwLock<Blockchain>> {
        self.blockchain.clone()
    }

    pub async fn height(&self) -> usize {
        self.blockchain.read().await.height()
    }

    pub async fn get(&self, key: &str) -> Result<String, ChainError> {
        self.blockchain.read().await.get(key).map(str::to_string)
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), ChainError> {
        self.blockchain.write().await.enqueue(key, value)
    }

    pub async fn check(&self, key: &str) -> KeyStatus {
        self.blockchain.read().await.key_status(key)
    }

    pub async fn mining_template(&self) -> MiningTemplate {
        self.blockchain.read().await.mining_template()
    }

    /// Decodes and appends a solved block, returning its hash.
    ///
    /// With autosave on, a failed save is returned to the caller. The block
    /// stays appended in memory and the next successful save rewrites the file.
    pub async fn submit_block(&self, bytes: &[u8]) -> Result<String, ChainError> {
        let block = Block::decode(bytes)?;
        let hash = block.hash_hex();

        let mut chain = self.blockchain.write().await;
        chain.apply_block(block)?;

        if self.autosave {
            if let Err(e) = self.persistence.save_chain(chain.blocks()) {
                warn!(error = %e, %hash, "autosave failed");
                return Err(e);
            }
        }
        Ok(hash)
    }

    pub async fn save(&self) -> Result<(), ChainError> {
        let chain = self.blockchain.read().await;
        self.persistence.save_chain(chain.blocks())
    }

    pub async fn block(&self, hash_hex: &str) -> Result<Block, ChainError> {
        self.blockchain.read().await.block_by_hash(hash_hex).cloned()
    }

    pub async fn summary(&self) -> ChainSummary {
        let chain = self.blockchain.read().await;
        ChainSummary {
            block_count: chain.height(),
            last_blocks: chain
                .blocks()
                .iter()
                .rev()
                .take(SUMMARY_BLOCKS)
                .map(Block::hash_hex)
                .collect(),
            unconfirmed_txs: chain.mempool().transactions().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Network;
    use crate::persistence::InMemoryPersistence;

    fn regtest_node(store: &InMemoryPersistence) -> Node {
        Node::new(Blockchain::new(Network::Regtest), Arc::new(store.clone()), true)
    }

    #[tokio::test]
    async fn test_set_mine_submit_get() {
        let store = InMemoryPersistence::new();
        let node = regtest_node(&store);

        node.set("a", "1").await.unwrap();
        assert_eq!(node.check("a").await, KeyStatus::Queued);
        assert!(matches!(node.get("a").await, Err(ChainError::KeyNotFound(_))));

        let template = node.mining_template().await;
        let hash = node.submit_block(&template.block.encode()).await.unwrap();

        assert_eq!(node.get("a").await.unwrap(), "1");
        assert_eq!(node.check("a").await, KeyStatus::Included);
        assert_eq!(node.block(&hash).await.unwrap(), template.block);

        // Autosave persisted both blocks.
        assert_eq!(store.load_chain().unwrap().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_block_leaves_state_alone() {
        let store = InMemoryPersistence::new();
        let node = regtest_node(&store);
        node.set("a", "1").await.unwrap();

        let mut block = node.mining_template().await.block;
        block.header.prev_hash = [3u8; 32];
        let err = node.submit_block(&block.encode()).await.unwrap_err();
        assert_eq!(err, ChainError::InvalidBlock("prev_hash mismatch".to_string()));

        let summary = node.summary().await;
        assert_eq!(summary.block_count, 1);
        assert_eq!(summary.unconfirmed_txs.len(), 1);
        assert_eq!(store.load_chain().unwrap(), None);
    }

    #[tokio::test]
    async fn test_autosave_failure_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        // A directory cannot be opened as the chain file.
        let store = FileStore::new(dir.path());
        let node = Node::new(Blockchain::new(Network::Regtest), Arc::new(store), true);
        node.set("a", "1").await.unwrap();

        let template = node.mining_template().await;
        let err = node.submit_block(&template.block.encode()).await.unwrap_err();
        assert!(matches!(err, ChainError::IoError(_)));

        // Accepted in memory all the same.
        assert_eq!(node.height().await, 2);
        assert_eq!(node.get("a").await.unwrap(), "1");
    }

    #[tokio::test]
    async fn test_summary_lists_newest_first() {
        let store = InMemoryPersistence::new();
        let node = regtest_node(&store);
        for i in 0..12 {
            node.set(&format!("k{}", i), "v").await.unwrap();
            let template = node.mining_template().await;
            node.submit_block(&template.block.encode()).await.unwrap();
        }
        let summary = node.summary().await;
        assert_eq!(summary.block_count, 13);
        assert_eq!(summary.last_blocks.len(), SUMMARY_BLOCKS);

        let chain = node.blockchain();
        let chain = chain.read().await;
        assert_eq!(summary.last_blocks[0], chain.top().hash_hex());
    }
}
