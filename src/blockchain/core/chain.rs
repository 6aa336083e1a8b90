use crate::codec::{ByteReader, Sha256Hash};
use crate::error::CodecError;
use crate::transaction::{Transaction, TX_SIZE};
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};

use super::target::Target;

/// Leading magic bytes of every encoded block.
pub const SIGNATURE: &[u8; 10] = b"TUANKIET^%";

/// timestamp + prev_hash + target + tx_hash + nonce, no padding.
pub const HEADER_SIZE: usize = 4 + 32 + 32 + 32 + 4;

/// Bytes preceding the transaction list: signature, size, header, tx_count.
pub const BLOCK_PREFIX_SIZE: usize = SIGNATURE.len() + 4 + HEADER_SIZE + 4;

/// Consensus target stamped into every template: 0x00001000 followed by zeros.
pub const FIXED_TARGET: Target = Target::from_le_bytes({
    let mut le = [0u8; 32];
    le[29] = 0x10;
    le
});

pub const GENESIS_TIMESTAMP: u32 = 1_534_613_194;
pub const GENESIS_NONCE: u32 = 0x6969_6969;
pub const GENESIS_KEY: &str = "Welcome to Nami Blockchain";
pub const GENESIS_VALUE: &str = "@tuankiet65_nicememe";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub timestamp: u32,
    pub prev_hash: Sha256Hash,
    pub target: Target,
    pub tx_hash: Sha256Hash,
    pub nonce: u32,
}

impl BlockHeader {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.timestamp.to_le_bytes());
        out[4..36].copy_from_slice(&self.prev_hash);
        out[36..68].copy_from_slice(self.target.as_le_bytes());
        out[68..100].copy_from_slice(&self.tx_hash);
        out[100..104].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() != HEADER_SIZE {
            return Err(CodecError::SizeMismatch {
                declared: HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        Self::read_from(&mut ByteReader::new(bytes))
    }

    fn read_from(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(BlockHeader {
            timestamp: reader.read_u32_le()?,
            prev_hash: reader.read_array32()?,
            target: Target::from_le_bytes(reader.read_array32()?),
            tx_hash: reader.read_array32()?,
            nonce: reader.read_u32_le()?,
        })
    }

    pub fn hash(&self) -> Sha256Hash {
        Sha256::digest(self.encode()).into()
    }
}

/// A sealed (or candidate) block. The transaction list is owned by the block;
/// `size` and `tx_count` are always derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Block {
            header,
            transactions,
        }
    }

    /// Builds a block holding its own copy of `transactions`.
    pub fn from_slice(header: BlockHeader, transactions: &[Transaction]) -> Self {
        Self::new(header, transactions.to_vec())
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn tx_count(&self) -> u32 {
        self.transactions.len() as u32
    }

    /// Total encoded length in bytes.
    pub fn size(&self) -> usize {
        BLOCK_PREFIX_SIZE + self.transactions.len() * TX_SIZE
    }

    /// Chained hash: the digest of the header only.
    pub fn hash(&self) -> Sha256Hash {
        self.header.hash()
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }

    /// Value of the first transaction in this block whose key matches.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.transactions
            .iter()
            .find(|tx| tx.key() == key)
            .map(|tx| tx.value())
    }

    pub fn encode(&self) -> Vec<u8> {
        let size = self.size();
        let mut out = Vec::with_capacity(size);
        out.extend_from_slice(SIGNATURE);
        out.extend_from_slice(&(size as u32).to_le_bytes());
        out.extend_from_slice(&self.header.encode());
        out.extend_from_slice(&self.tx_count().to_le_bytes());
        for tx in &self.transactions {
            tx.encode_into(&mut out);
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = ByteReader::new(bytes);

        if reader.take(SIGNATURE.len())? != SIGNATURE {
            return Err(CodecError::InvalidSignature);
        }

        let declared = reader.read_u32_le()? as usize;
        if declared != bytes.len() {
            return Err(CodecError::SizeMismatch {
                declared,
                actual: bytes.len(),
            });
        }

        let header = BlockHeader::read_from(&mut reader)?;
        let tx_count = reader.read_u32_le()?;

        let expected = (tx_count as usize)
            .checked_mul(TX_SIZE)
            .and_then(|n| n.checked_add(BLOCK_PREFIX_SIZE))
            .unwrap_or(usize::MAX);
        if expected != declared {
            return Err(CodecError::LengthMismatch {
                tx_count,
                expected,
                actual: declared,
            });
        }

        let mut transactions = Vec::with_capacity(tx_count as usize);
        for _ in 0..tx_count {
            transactions.push(Transaction::read_from(&mut reader)?);
        }

        Ok(Block {
            header,
            transactions,
        })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.encode())
    }

    pub fn from_hex(s: &str) -> Result<Self, CodecError> {
        let bytes = crate::codec::from_hex(s)?;
        Self::decode(&bytes)
    }
}

/// Digest committed to by a header's `tx_hash`: SHA-256 over the concatenated
/// transaction encodings, or over 32 zero bytes for an empty list.
pub fn tx_digest(transactions: &[Transaction]) -> Sha256Hash {
    let mut hasher = Sha256::new();
    if transactions.is_empty() {
        hasher.update([0u8; 32]);
    } else {
        for tx in transactions {
            hasher.update(tx.encode());
        }
    }
    hasher.finalize().into()
}

/// Which fixed genesis and template target a ledger runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    /// Same genesis fields but an all-`0xff` target, so any nonce seals a block.
    Regtest,
}

static MAINNET_GENESIS: Lazy<Block> = Lazy::new(|| genesis_block(FIXED_TARGET));
static REGTEST_GENESIS: Lazy<Block> = Lazy::new(|| genesis_block(Target::from_le_bytes([0xff; 32])));

fn genesis_block(target: Target) -> Block {
    let tx = Transaction::new(GENESIS_KEY, GENESIS_VALUE)
        .expect("genesis transaction fits the slot");
    let transactions = vec![tx];
    let header = BlockHeader {
        timestamp: GENESIS_TIMESTAMP,
        prev_hash: [0u8; 32],
        target,
        tx_hash: tx_digest(&transactions),
        nonce: GENESIS_NONCE,
    };
    Block::new(header, transactions)
}

impl Network {
    pub fn genesis(&self) -> &'static Block {
        match self {
            Network::Mainnet => &MAINNET_GENESIS,
            Network::Regtest => &REGTEST_GENESIS,
        }
    }

    /// Target written into every mining template. Constant for the lifetime of
    /// the chain; there is no retargeting.
    pub fn template_target(&self) -> Target {
        match self {
            Network::Mainnet => FIXED_TARGET,
            Network::Regtest => Target::from_le_bytes([0xff; 32]),
        }
    }
}
