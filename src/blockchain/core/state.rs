use crate::codec::hash_from_hex;
use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::transaction::Transaction;
use tracing::{debug, info};

use super::chain::{Block, BlockHeader, Network};
use super::target::CompareTarget;
use super::validation::{target_of, validate_linkage, validate_pow, validate_tx_hash};

/// Where a key currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Included,
    Queued,
    NotFound,
}

/// A candidate block handed to miners, together with the target it must meet
/// (already in comparison order).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiningTemplate {
    pub block: Block,
    pub target: CompareTarget,
}

/// The ledger: an append-only block list plus the pending queue. Both are only
/// mutated through `&mut self`, so callers serialize writers by wrapping the
/// whole value in one lock.
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    mempool: Mempool,
    network: Network,
    verify_tx_hash: bool,
}

impl Blockchain {
    /// A chain holding only the genesis block of `network`.
    pub fn new(network: Network) -> Self {
        let mut chain = Self::empty(network);
        chain.install_genesis();
        chain
    }

    fn empty(network: Network) -> Self {
        Blockchain {
            blocks: Vec::new(),
            mempool: Mempool::new(),
            network,
            verify_tx_hash: false,
        }
    }

    /// Opt into checking each block's `tx_hash` against its transactions.
    pub fn with_tx_hash_verification(mut self, enabled: bool) -> Self {
        self.verify_tx_hash = enabled;
        self
    }

    /// Rebuilds a chain from persisted blocks, re-running every append check.
    /// Strict `tx_hash` verification is not applied to the replayed history.
    pub fn restore(network: Network, blocks: Vec<Block>) -> Result<Self, ChainError> {
        let mut chain = Self::empty(network);
        let mut iter = blocks.into_iter();
        match iter.next() {
            Some(first) if &first == chain.network.genesis() => chain.install_genesis(),
            Some(first) => {
                return Err(ChainError::CorruptChain(format!(
                    "first block {} is not the {:?} genesis",
                    first.hash_hex(),
                    chain.network
                )))
            }
            None => return Err(ChainError::CorruptChain("no blocks stored".to_string())),
        }

        for (height, block) in iter.enumerate() {
            chain.apply_block(block).map_err(|e| {
                ChainError::CorruptChain(format!("block {} rejected: {}", height + 1, e))
            })?;
        }
        Ok(chain)
    }

    fn install_genesis(&mut self) {
        if self.blocks.is_empty() {
            self.blocks.push(self.network.genesis().clone());
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn verifies_tx_hash(&self) -> bool {
        self.verify_tx_hash
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn height(&self) -> usize {
        self.blocks.len()
    }

    pub fn top(&self) -> &Block {
        // install_genesis runs in every constructor
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    /// Target the next block must meet, derived from the current top.
    pub fn current_target(&self) -> CompareTarget {
        target_of(self.top())
    }

    pub fn block_by_hash(&self, hash_hex: &str) -> Result<&Block, ChainError> {
        let hash =
            hash_from_hex(hash_hex).map_err(|_| ChainError::BlockNotFound(hash_hex.to_string()))?;
        self.blocks
            .iter()
            .find(|b| b.hash() == hash)
            .ok_or_else(|| ChainError::BlockNotFound(hash_hex.to_string()))
    }

    /// Validates `block` against the current top and appends it. On error the
    /// chain and the mempool are left untouched.
    pub fn apply_block(&mut self, block: Block) -> Result<(), ChainError> {
        let top = self.top();
        validate_linkage(top, &block)?;
        validate_pow(top, &block)?;
        if self.verify_tx_hash {
            validate_tx_hash(&block)?;
        }

        let removed = self.mempool.remove_included(block.transactions());
        info!(
            hash = %block.hash_hex(),
            height = self.blocks.len(),
            txs = block.tx_count(),
            drained = removed,
            "block.accepted"
        );
        self.blocks.push(block);
        Ok(())
    }

    pub fn apply_raw_block(&mut self, bytes: &[u8]) -> Result<(), ChainError> {
        let block = Block::decode(bytes)?;
        self.apply_block(block)
    }

    pub fn enqueue(&mut self, key: &str, value: &str) -> Result<(), ChainError> {
        let tx = Transaction::new(key, value)?;
        debug!(key, value, "mempool.enqueue");
        self.mempool.push(tx);
        Ok(())
    }

    pub fn queued_digest(&self) -> [u8; 32] {
        self.mempool.digest()
    }

    /// Candidate block on top of the current tip carrying the whole queue.
    pub fn build_template(&self, timestamp: u32) -> Block {
        let header = BlockHeader {
            timestamp,
            prev_hash: self.top().hash(),
            target: self.network.template_target(),
            tx_hash: self.queued_digest(),
            nonce: 0,
        };
        Block::from_slice(header, self.mempool.transactions())
    }

    pub fn mining_template(&self) -> MiningTemplate {
        MiningTemplate {
            block: self.build_template(current_timestamp()),
            target: self.current_target(),
        }
    }

    /// Value from the earliest block holding `key`. Queued writes are not visible.
    pub fn get(&self, key: &str) -> Result<&str, ChainError> {
        self.blocks
            .iter()
            .find_map(|b| b.get(key))
            .ok_or_else(|| ChainError::KeyNotFound(key.to_string()))
    }

    pub fn key_status(&self, key: &str) -> KeyStatus {
        if self.get(key).is_ok() {
            KeyStatus::Included
        } else if self.mempool.contains_key(key) {
            KeyStatus::Queued
        } else {
            KeyStatus::NotFound
        }
    }
}

/// Seconds since the unix epoch, clamped into the header's 32-bit field.
pub fn current_timestamp() -> u32 {
    chrono::Utc::now().timestamp().clamp(0, u32::MAX as i64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::core::chain::{tx_digest, FIXED_TARGET};
    use crate::codec::hash_from_hex;

    const MAINNET_NONCE: u32 = 798_816;

    fn tx(k: &str, v: &str) -> Transaction {
        Transaction::new(k, v).unwrap()
    }

    /// Second block on mainnet with a nonce found offline for this exact header.
    fn mainnet_block(nonce: u32) -> Block {
        let txs = vec![tx("a", "1")];
        let header = BlockHeader {
            timestamp: 1_700_000_000,
            prev_hash: Network::Mainnet.genesis().hash(),
            target: FIXED_TARGET,
            tx_hash: tx_digest(&txs),
            nonce,
        };
        Block::new(header, txs)
    }

    fn seal_regtest(chain: &Blockchain) -> Block {
        // Regtest targets are all-0xff so the template is already valid.
        chain.build_template(1_700_000_000)
    }

    #[test]
    fn test_new_chain_holds_genesis() {
        let chain = Blockchain::new(Network::Mainnet);
        assert_eq!(chain.height(), 1);
        assert_eq!(chain.top(), Network::Mainnet.genesis());
        assert_eq!(chain.get("Welcome to Nami Blockchain"), Ok("@tuankiet65_nicememe"));
    }

    #[test]
    fn test_current_target_is_reversed_header_target() {
        let chain = Blockchain::new(Network::Mainnet);
        let mut be = [0u8; 32];
        be[2] = 0x10;
        assert_eq!(chain.current_target().as_be_bytes(), &be);
    }

    #[test]
    fn test_mainnet_block_with_valid_nonce_is_accepted() {
        let mut chain = Blockchain::new(Network::Mainnet);
        chain.enqueue("a", "1").unwrap();
        let block = mainnet_block(MAINNET_NONCE);
        assert_eq!(
            block.hash(),
            hash_from_hex("000000bf546f5877da07f8f3a3ad08b0dc6253a9fef9196d88740e15d998c3d3")
                .unwrap()
        );

        chain.apply_block(block).unwrap();
        assert_eq!(chain.height(), 2);
        assert!(chain.mempool().is_empty());
        assert_eq!(chain.get("a"), Ok("1"));
    }

    #[test]
    fn test_hash_above_target_is_rejected() {
        let mut chain = Blockchain::new(Network::Mainnet);
        chain.enqueue("a", "1").unwrap();
        let err = chain.apply_block(mainnet_block(0)).unwrap_err();
        assert_eq!(err, ChainError::InvalidBlock("hash exceeds target".to_string()));
        assert_eq!(chain.height(), 1);
        assert_eq!(chain.mempool().len(), 1);
    }

    #[test]
    fn test_prev_hash_mismatch_is_rejected() {
        let mut chain = Blockchain::new(Network::Regtest);
        let mut block = seal_regtest(&chain);
        block.header.prev_hash = [1u8; 32];
        let err = chain.apply_block(block).unwrap_err();
        assert_eq!(err, ChainError::InvalidBlock("prev_hash mismatch".to_string()));
        assert_eq!(chain.height(), 1);
    }

    #[test]
    fn test_tx_hash_is_trusted_by_default() {
        let mut chain = Blockchain::new(Network::Regtest);
        chain.enqueue("k", "v").unwrap();
        let mut block = seal_regtest(&chain);
        block.header.tx_hash = [9u8; 32];
        assert!(chain.apply_block(block).is_ok());
    }

    #[test]
    fn test_strict_mode_rejects_forged_tx_hash() {
        let mut chain = Blockchain::new(Network::Regtest).with_tx_hash_verification(true);
        chain.enqueue("k", "v").unwrap();
        let mut forged = seal_regtest(&chain);
        forged.header.tx_hash = [9u8; 32];
        assert_eq!(
            chain.apply_block(forged).unwrap_err(),
            ChainError::InvalidBlock("tx_hash mismatch".to_string())
        );

        let honest = seal_regtest(&chain);
        chain.apply_block(honest).unwrap();
        assert_eq!(chain.height(), 2);
    }

    #[test]
    fn test_template_reflects_tip_and_queue_without_side_effects() {
        let mut chain = Blockchain::new(Network::Mainnet);
        chain.enqueue("a", "1").unwrap();
        chain.enqueue("b", "2").unwrap();

        let template = chain.build_template(123);
        assert_eq!(template.header.timestamp, 123);
        assert_eq!(template.header.prev_hash, chain.top().hash());
        assert_eq!(template.header.target, FIXED_TARGET);
        assert_eq!(template.header.nonce, 0);
        assert_eq!(template.header.tx_hash, chain.queued_digest());
        assert_eq!(template.transactions(), chain.mempool().transactions());

        assert_eq!(chain.build_template(123), template);
        assert_eq!(chain.height(), 1);
        assert_eq!(chain.mempool().len(), 2);
    }

    #[test]
    fn test_block_keeps_target_constant_across_heights() {
        let mut chain = Blockchain::new(Network::Regtest);
        for i in 0..3 {
            chain.enqueue(&format!("k{}", i), "v").unwrap();
            let block = seal_regtest(&chain);
            assert_eq!(block.header.target, Network::Regtest.template_target());
            chain.apply_block(block).unwrap();
        }
        assert_eq!(chain.height(), 4);
    }

    #[test]
    fn test_get_prefers_earliest_block() {
        let mut chain = Blockchain::new(Network::Regtest);
        chain.enqueue("dup", "first").unwrap();
        chain.apply_block(seal_regtest(&chain)).unwrap();
        chain.enqueue("dup", "second").unwrap();
        chain.apply_block(seal_regtest(&chain)).unwrap();
        assert_eq!(chain.get("dup"), Ok("first"));
    }

    #[test]
    fn test_key_status_and_queued_invisibility() {
        let mut chain = Blockchain::new(Network::Regtest);
        chain.enqueue("q", "1").unwrap();
        assert_eq!(chain.key_status("q"), KeyStatus::Queued);
        assert_eq!(chain.get("q"), Err(ChainError::KeyNotFound("q".to_string())));
        assert_eq!(chain.key_status("missing"), KeyStatus::NotFound);

        chain.apply_block(seal_regtest(&chain)).unwrap();
        assert_eq!(chain.key_status("q"), KeyStatus::Included);
    }

    #[test]
    fn test_enqueue_rejects_long_values() {
        let mut chain = Blockchain::new(Network::Regtest);
        assert!(matches!(
            chain.enqueue("k", &"v".repeat(33)),
            Err(ChainError::ValueTooLong { .. })
        ));
        assert!(chain.mempool().is_empty());
    }

    #[test]
    fn test_apply_raw_block_reports_codec_errors() {
        let mut chain = Blockchain::new(Network::Regtest);
        let mut bytes = seal_regtest(&chain).encode();
        bytes[0] = 0;
        assert!(matches!(
            chain.apply_raw_block(&bytes),
            Err(ChainError::Codec(_))
        ));
        assert_eq!(chain.height(), 1);
    }

    #[test]
    fn test_block_by_hash() {
        let chain = Blockchain::new(Network::Mainnet);
        let genesis_hex = chain.top().hash_hex();
        assert_eq!(chain.block_by_hash(&genesis_hex).unwrap(), chain.top());
        assert!(matches!(
            chain.block_by_hash(&"ab".repeat(32)),
            Err(ChainError::BlockNotFound(_))
        ));
        assert!(matches!(
            chain.block_by_hash("not-hex"),
            Err(ChainError::BlockNotFound(_))
        ));
    }

    #[test]
    fn test_restore_replays_checks() {
        let mut chain = Blockchain::new(Network::Regtest);
        chain.enqueue("a", "1").unwrap();
        chain.apply_block(seal_regtest(&chain)).unwrap();

        let restored = Blockchain::restore(Network::Regtest, chain.blocks().to_vec()).unwrap();
        assert_eq!(restored.blocks(), chain.blocks());
        assert!(restored.mempool().is_empty());

        assert!(matches!(
            Blockchain::restore(Network::Mainnet, chain.blocks().to_vec()),
            Err(ChainError::CorruptChain(_))
        ));

        let mut broken = chain.blocks().to_vec();
        broken[1].header.prev_hash = [0u8; 32];
        assert!(matches!(
            Blockchain::restore(Network::Regtest, broken),
            Err(ChainError::CorruptChain(_))
        ));
    }
}
