//! Pending (unconfirmed) transaction queue.
//!
//! Entries keep their arrival order, which is the order they are copied into
//! mining templates and hashed into the template's `tx_hash`.

use crate::blockchain::tx_digest;
use crate::codec::Sha256Hash;
use crate::transaction::Transaction;
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct Mempool {
    queue: Vec<Transaction>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tx: Transaction) {
        self.queue.push(tx);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.queue
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.queue.iter().any(|tx| tx.key() == key)
    }

    /// Drops every queued entry equal to one of `included`. Returns how many
    /// entries were removed.
    pub fn remove_included(&mut self, included: &[Transaction]) -> usize {
        if included.is_empty() {
            return 0;
        }
        let included: HashSet<&Transaction> = included.iter().collect();
        let before = self.queue.len();
        self.queue.retain(|tx| !included.contains(tx));
        before - self.queue.len()
    }

    /// `tx_hash` a template built from the current queue would carry.
    pub fn digest(&self) -> Sha256Hash {
        tx_digest(&self.queue)
    }
}
