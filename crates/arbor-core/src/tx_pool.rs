//! Staging area for transactions not yet included in any accepted block.
//!
//! Insertion is unconditional: no validation happens here, and the only
//! duplicate rule is identity by txid (re-adding a transaction replaces it in
//! place). Validation happens when a producer assembles a block.

use std::collections::{HashMap, HashSet};

use crate::error::TransactionError;
use crate::types::{Block, Hash256, Transaction};

/// Unvalidated transactions keyed by txid, iterated in first-insertion order.
#[derive(Debug, Clone, Default)]
pub struct TransactionPool {
    entries: HashMap<Hash256, Transaction>,
    order: Vec<Hash256>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a transaction. Returns its txid.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<Hash256, TransactionError> {
        let txid = tx.txid()?;
        if self.entries.insert(txid, tx).is_none() {
            self.order.push(txid);
        }
        Ok(txid)
    }

    pub fn remove_transaction(&mut self, txid: &Hash256) -> Option<Transaction> {
        let tx = self.entries.remove(txid)?;
        self.order.retain(|id| id != txid);
        Some(tx)
    }

    pub fn get(&self, txid: &Hash256) -> Option<&Transaction> {
        self.entries.get(txid)
    }

    pub fn contains(&self, txid: &Hash256) -> bool {
        self.entries.contains_key(txid)
    }

    /// Staged transactions in the order they were first added.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.order
            .iter()
            .filter_map(|txid| self.entries.get(txid).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every staged transaction that `block` includes.
    ///
    /// Returns the number removed. Conflicting spends that were not included
    /// stay staged; the next block assembly filters them out.
    pub fn remove_confirmed(&mut self, block: &Block) -> usize {
        let confirmed: HashSet<Hash256> = block
            .transactions
            .iter()
            .filter_map(|tx| tx.txid().ok())
            .collect();
        let before = self.entries.len();
        self.entries.retain(|txid, _| !confirmed.contains(txid));
        self.order.retain(|txid| !confirmed.contains(txid));
        before - self.entries.len()
    }
}
