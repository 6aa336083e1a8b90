//! Chain persistence for NamiChain
//!
//! The on-disk format is a single file: a little-endian `u32` block count,
//! then for every block its encoded length (`u32`, little-endian) followed by
//! the block encoding. Writes are not atomic; a crash mid-save can leave a
//! truncated file, which the next load reports as [`ChainError::CorruptChain`].

use crate::blockchain::{Block, Blockchain};
use crate::codec::ByteReader;
use crate::error::ChainError;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Abstraction for persistence backends.
pub trait Persistence: Send + Sync {
    fn save_chain(&self, blocks: &[Block]) -> Result<(), ChainError>;

    /// `Ok(None)` when nothing has been stored yet.
    fn load_chain(&self) -> Result<Option<Vec<Block>>, ChainError>;
}

/// Serializes `blocks` into the chain file layout.
pub fn encode_chain(blocks: &[Block]) -> Vec<u8> {
    let total: usize = blocks.iter().map(|b| 4 + b.size()).sum();
    let mut out = Vec::with_capacity(4 + total);
    out.extend_from_slice(&(blocks.len() as u32).to_le_bytes());
    for block in blocks {
        let bytes = block.encode();
        out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(&bytes);
    }
    out
}

/// Parses the chain file layout. Any truncation, decode failure or trailing
/// garbage aborts the whole load.
pub fn decode_chain(bytes: &[u8]) -> Result<Vec<Block>, ChainError> {
    let mut reader = ByteReader::new(bytes);
    let count = reader
        .read_u32_le()
        .map_err(|e| ChainError::CorruptChain(format!("block count: {}", e)))?;

    let mut blocks = Vec::new();
    for i in 0..count {
        let len = reader
            .read_u32_le()
            .map_err(|e| ChainError::CorruptChain(format!("length of block {}: {}", i, e)))?;
        let raw = reader
            .take(len as usize)
            .map_err(|e| ChainError::CorruptChain(format!("block {}: {}", i, e)))?;
        let block = Block::decode(raw)
            .map_err(|e| ChainError::CorruptChain(format!("block {}: {}", i, e)))?;
        blocks.push(block);
    }

    if reader.remaining() != 0 {
        return Err(ChainError::CorruptChain(format!(
            "{} trailing bytes after {} blocks",
            reader.remaining(),
            count
        )));
    }
    Ok(blocks)
}

/// Single-file backend.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Persistence for FileStore {
    fn save_chain(&self, blocks: &[Block]) -> Result<(), ChainError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut writer = BufWriter::new(File::create(&self.path)?);
        writer.write_all(&encode_chain(blocks))?;
        writer.flush()?;
        info!(path = %self.path.display(), blocks = blocks.len(), "chain.saved");
        Ok(())
    }

    fn load_chain(&self) -> Result<Option<Vec<Block>>, ChainError> {
        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let blocks = decode_chain(&bytes)?;
        info!(path = %self.path.display(), blocks = blocks.len(), "chain.loaded");
        Ok(Some(blocks))
    }
}

/// Simple in-memory persistence implementation useful for tests and ephemeral runs.
#[derive(Clone, Default)]
pub struct InMemoryPersistence {
    bytes: Arc<Mutex<Option<Vec<u8>>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Persistence for InMemoryPersistence {
    fn save_chain(&self, blocks: &[Block]) -> Result<(), ChainError> {
        let mut slot = self
            .bytes
            .lock()
            .map_err(|_| ChainError::IoError("Mutex poisoned".to_string()))?;
        *slot = Some(encode_chain(blocks));
        Ok(())
    }

    fn load_chain(&self) -> Result<Option<Vec<Block>>, ChainError> {
        let slot = self
            .bytes
            .lock()
            .map_err(|_| ChainError::IoError("Mutex poisoned".to_string()))?;
        slot.as_deref().map(decode_chain).transpose()
    }
}

/// Loads the stored chain into `fresh` (a genesis-only chain carrying the
/// desired options). With nothing stored, `fresh` is returned as is.
pub fn load_blockchain(
    persistence: &dyn Persistence,
    fresh: Blockchain,
) -> Result<Blockchain, ChainError> {
    match persistence.load_chain()? {
        None => {
            info!("no stored chain, starting from genesis");
            Ok(fresh)
        }
        Some(blocks) => {
            let network = fresh.network();
            let strict = fresh.verifies_tx_hash();
            Blockchain::restore(network, blocks).map(|c| c.with_tx_hash_verification(strict))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Network;
    use tempfile::TempDir;

    fn regtest_chain(extra_blocks: usize) -> Blockchain {
        let mut chain = Blockchain::new(Network::Regtest);
        for i in 0..extra_blocks {
            chain.enqueue(&format!("key{}", i), "value").unwrap();
            let block = chain.build_template(1_700_000_000 + i as u32);
            chain.apply_block(block).unwrap();
        }
        chain
    }

    #[test]
    fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("chain.bin"));
        let chain = regtest_chain(3);

        store.save_chain(chain.blocks()).unwrap();
        let loaded = store.load_chain().unwrap().unwrap();
        assert_eq!(loaded, chain.blocks());

        let restored = load_blockchain(&store, Blockchain::new(Network::Regtest)).unwrap();
        assert_eq!(restored.height(), 4);
        assert_eq!(restored.get("key2"), Ok("value"));
    }

    #[test]
    fn test_missing_file_yields_genesis() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("absent.bin"));
        assert_eq!(store.load_chain().unwrap(), None);

        let chain = load_blockchain(&store, Blockchain::new(Network::Mainnet)).unwrap();
        assert_eq!(chain.height(), 1);
        assert_eq!(chain.top(), Network::Mainnet.genesis());
    }

    #[test]
    fn test_layout_matches_format() {
        let genesis = Network::Mainnet.genesis().clone();
        let bytes = encode_chain(std::slice::from_ref(&genesis));
        assert_eq!(&bytes[0..4], &1u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &188u32.to_le_bytes());
        assert_eq!(&bytes[8..], genesis.encode().as_slice());
    }

    #[test]
    fn test_truncated_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chain.bin");
        let bytes = encode_chain(regtest_chain(2).blocks());
        fs::write(&path, &bytes[..bytes.len() - 10]).unwrap();

        let err = FileStore::new(&path).load_chain().unwrap_err();
        assert!(matches!(err, ChainError::CorruptChain(_)));
    }

    #[test]
    fn test_corrupt_block_aborts_load() {
        let mut bytes = encode_chain(regtest_chain(1).blocks());
        // Signature of the second block.
        let second = 4 + 4 + 188 + 4 + 1;
        bytes[second] = b'x';
        assert!(matches!(decode_chain(&bytes), Err(ChainError::CorruptChain(_))));
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let mut bytes = encode_chain(regtest_chain(0).blocks());
        bytes.push(0);
        assert!(matches!(decode_chain(&bytes), Err(ChainError::CorruptChain(_))));
    }

    #[test]
    fn test_in_memory_backend() {
        let store = InMemoryPersistence::new();
        assert_eq!(store.load_chain().unwrap(), None);
        let chain = regtest_chain(2);
        store.save_chain(chain.blocks()).unwrap();
        assert_eq!(store.load_chain().unwrap().unwrap(), chain.blocks());
    }

    #[test]
    fn test_stored_chain_for_other_network_is_rejected() {
        let store = InMemoryPersistence::new();
        store.save_chain(regtest_chain(1).blocks()).unwrap();
        assert!(matches!(
            load_blockchain(&store, Blockchain::new(Network::Mainnet)),
            Err(ChainError::CorruptChain(_))
        ));
    }
}
