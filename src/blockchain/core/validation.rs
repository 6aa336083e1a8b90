use crate::error::ChainError;
use tracing::debug;

use super::chain::{tx_digest, Block};
use super::target::CompareTarget;

/// Target a successor of `block` has to meet. Read from the block itself so a
/// retargeting rule only has to change what gets written into headers.
pub fn target_of(block: &Block) -> CompareTarget {
    block.header.target.to_compare()
}

pub fn validate_linkage(top: &Block, candidate: &Block) -> Result<(), ChainError> {
    if candidate.header.prev_hash != top.hash() {
        debug!(
            expected = %hex::encode(top.hash()),
            got = %hex::encode(candidate.header.prev_hash),
            "block.reject.linkage"
        );
        return Err(ChainError::InvalidBlock("prev_hash mismatch".to_string()));
    }
    Ok(())
}

pub fn validate_pow(top: &Block, candidate: &Block) -> Result<(), ChainError> {
    let target = target_of(top);
    if !target.is_met_by(&candidate.hash()) {
        debug!(
            hash = %candidate.hash_hex(),
            target = %target,
            "block.reject.pow"
        );
        return Err(ChainError::InvalidBlock("hash exceeds target".to_string()));
    }
    Ok(())
}

/// Only enforced in strict mode; by default a header's `tx_hash` is trusted as supplied.
pub fn validate_tx_hash(candidate: &Block) -> Result<(), ChainError> {
    if tx_digest(candidate.transactions()) != candidate.header.tx_hash {
        return Err(ChainError::InvalidBlock("tx_hash mismatch".to_string()));
    }
    Ok(())
}
