//! Proof-of-work nonce search.
//!
//! The search walks nonces in ascending order so that, for a fixed header and
//! target, the winning nonce is always the lowest one. It never mutates shared
//! state; callers hand in a template and get a sealed block back.

use crate::blockchain::{Block, CompareTarget, HEADER_SIZE};
use crate::error::ChainError;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};

/// How many nonces are tried between polls of the stop flag.
pub const STOP_CHECK_INTERVAL: u64 = 1 << 16;

/// Nonces handed to one rayon task by the parallel search.
const PARALLEL_CHUNK: u64 = 1 << 20;

const NONCE_OFFSET: usize = HEADER_SIZE - 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(Block),
    /// Every nonce in the range was tried without meeting the target.
    Exhausted,
    /// The stop flag was raised; `resume_from` is the first nonce not yet tried.
    Stopped { resume_from: u32 },
}

enum Scan {
    Found(u32),
    Exhausted,
    Stopped(u32),
}

pub fn meets_target(block: &Block, target: &CompareTarget) -> bool {
    target.is_met_by(&block.hash())
}

/// Searches the whole nonce space of `template`.
pub fn mine_block(template: Block, target: &CompareTarget) -> Result<Block, ChainError> {
    let never = AtomicBool::new(false);
    match mine_range(template, target, 0..=u32::MAX, &never) {
        SearchOutcome::Found(block) => Ok(block),
        SearchOutcome::Exhausted | SearchOutcome::Stopped { .. } => Err(ChainError::NoSolutionFound),
    }
}

/// Searches `nonces` in ascending order, polling `stop` every
/// [`STOP_CHECK_INTERVAL`] attempts.
pub fn mine_range(
    mut template: Block,
    target: &CompareTarget,
    nonces: RangeInclusive<u32>,
    stop: &AtomicBool,
) -> SearchOutcome {
    let header = template.header.encode();
    match scan(header, target, nonces, stop) {
        Scan::Found(nonce) => {
            template.header.nonce = nonce;
            SearchOutcome::Found(template)
        }
        Scan::Exhausted => SearchOutcome::Exhausted,
        Scan::Stopped(next) => SearchOutcome::Stopped { resume_from: next },
    }
}

/// Parallel variant of [`mine_range`]. Chunks are searched on the rayon pool
/// and the leftmost hit wins, so the result matches the sequential search.
/// A stopped parallel search does not track partial progress: `resume_from`
/// is the start of `nonces`.
pub fn mine_range_parallel(
    mut template: Block,
    target: &CompareTarget,
    nonces: RangeInclusive<u32>,
    stop: &AtomicBool,
) -> SearchOutcome {
    let (start, end) = (*nonces.start() as u64, *nonces.end() as u64);
    if start > end {
        return SearchOutcome::Exhausted;
    }
    let header = template.header.encode();
    let chunks = ((end - start) / PARALLEL_CHUNK + 1) as usize;

    let found = (0..chunks).into_par_iter().find_map_first(|i| {
        let lo = start + i as u64 * PARALLEL_CHUNK;
        let hi = (lo + PARALLEL_CHUNK - 1).min(end);
        match scan(header, target, lo as u32..=hi as u32, stop) {
            Scan::Found(nonce) => Some(nonce),
            Scan::Exhausted | Scan::Stopped(_) => None,
        }
    });

    match found {
        Some(nonce) => {
            template.header.nonce = nonce;
            SearchOutcome::Found(template)
        }
        None if stop.load(Ordering::Relaxed) => SearchOutcome::Stopped {
            resume_from: start as u32,
        },
        None => SearchOutcome::Exhausted,
    }
}

fn scan(
    mut header: [u8; HEADER_SIZE],
    target: &CompareTarget,
    nonces: RangeInclusive<u32>,
    stop: &AtomicBool,
) -> Scan {
    let first = *nonces.start() as u64;
    for nonce in nonces {
        if (nonce as u64 - first) % STOP_CHECK_INTERVAL == 0 && stop.load(Ordering::Relaxed) {
            return Scan::Stopped(nonce);
        }
        header[NONCE_OFFSET..].copy_from_slice(&nonce.to_le_bytes());
        let hash: [u8; 32] = Sha256::digest(header).into();
        if target.is_met_by(&hash) {
            return Scan::Found(nonce);
        }
    }
    Scan::Exhausted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{tx_digest, BlockHeader, Network, FIXED_TARGET};
    use crate::transaction::Transaction;

    const WINNING_NONCE: u32 = 798_816;

    fn mainnet_template() -> Block {
        let txs = vec![Transaction::new("a", "1").unwrap()];
        let header = BlockHeader {
            timestamp: 1_700_000_000,
            prev_hash: Network::Mainnet.genesis().hash(),
            target: FIXED_TARGET,
            tx_hash: tx_digest(&txs),
            nonce: 0,
        };
        Block::new(header, txs)
    }

    #[test]
    fn test_max_target_is_met_at_nonce_zero() {
        let mined = mine_block(mainnet_template(), &CompareTarget::MAX).unwrap();
        assert_eq!(mined.header.nonce, 0);
    }

    #[test]
    fn test_finds_lowest_winning_nonce() {
        let stop = AtomicBool::new(false);
        let target = FIXED_TARGET.to_compare();
        match mine_range(mainnet_template(), &target, 798_000..=800_000, &stop) {
            SearchOutcome::Found(block) => {
                assert_eq!(block.header.nonce, WINNING_NONCE);
                assert!(meets_target(&block, &target));
            }
            other => panic!("expected a solution, got {:?}", other),
        }
    }

    #[test]
    fn test_exhaustion_is_reported() {
        let stop = AtomicBool::new(false);
        let target = FIXED_TARGET.to_compare();
        assert_eq!(
            mine_range(mainnet_template(), &target, 0..=5_000, &stop),
            SearchOutcome::Exhausted
        );

        let impossible = CompareTarget::from_be_bytes([0u8; 32]);
        assert_eq!(
            mine_range(mainnet_template(), &impossible, 10..=20, &stop),
            SearchOutcome::Exhausted
        );
    }

    #[test]
    fn test_stop_flag_interrupts_search() {
        let stop = AtomicBool::new(true);
        let target = FIXED_TARGET.to_compare();
        assert_eq!(
            mine_range(mainnet_template(), &target, 500..=u32::MAX, &stop),
            SearchOutcome::Stopped { resume_from: 500 }
        );
        assert_eq!(
            mine_range_parallel(mainnet_template(), &target, 500..=u32::MAX, &stop),
            SearchOutcome::Stopped { resume_from: 500 }
        );
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let stop = AtomicBool::new(false);
        let target = FIXED_TARGET.to_compare();
        let parallel = mine_range_parallel(mainnet_template(), &target, 0..=1_000_000, &stop);
        let sequential = mine_range(mainnet_template(), &target, 790_000..=1_000_000, &stop);
        assert_eq!(parallel, sequential);
        match parallel {
            SearchOutcome::Found(block) => assert_eq!(block.header.nonce, WINNING_NONCE),
            other => panic!("expected a solution, got {:?}", other),
        }
    }

    #[test]
    fn test_single_nonce_range() {
        let stop = AtomicBool::new(false);
        let target = FIXED_TARGET.to_compare();
        assert!(matches!(
            mine_range(mainnet_template(), &target, WINNING_NONCE..=WINNING_NONCE, &stop),
            SearchOutcome::Found(_)
        ));
        assert!(matches!(
            mine_range_parallel(mainnet_template(), &target, WINNING_NONCE..=WINNING_NONCE, &stop),
            SearchOutcome::Found(_)
        ));
    }
}
