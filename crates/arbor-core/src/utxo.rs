//! Unspent transaction output pool.
//!
//! Each chain node owns an independent [`UtxoPool`]. Branches never share a
//! pool: a node derives its pool by cloning its parent's and applying its
//! block, so a mutation on one branch can never leak into another.

use std::collections::HashMap;

use crate::error::TransactionError;
use crate::types::{Hash256, OutPoint, Transaction, TxOutput};

/// Mapping from spendable outpoint to the output it identifies.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UtxoPool {
    utxos: HashMap<OutPoint, TxOutput>,
}

impl UtxoPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an output, replacing any existing entry at `outpoint`.
    pub fn add_output(&mut self, outpoint: OutPoint, output: TxOutput) {
        self.utxos.insert(outpoint, output);
    }

    /// Remove a spent output. Returns `None` if it was not present.
    pub fn remove_output(&mut self, outpoint: &OutPoint) -> Option<TxOutput> {
        self.utxos.remove(outpoint)
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.utxos.contains_key(outpoint)
    }

    pub fn get_output(&self, outpoint: &OutPoint) -> Option<&TxOutput> {
        self.utxos.get(outpoint)
    }

    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }

    /// All spendable outpoints, in no particular order.
    pub fn outpoints(&self) -> Vec<OutPoint> {
        self.utxos.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OutPoint, &TxOutput)> {
        self.utxos.iter()
    }

    /// Outputs owned by `pubkey_hash`, sorted by outpoint.
    pub fn owned_by(&self, pubkey_hash: &Hash256) -> Vec<(OutPoint, TxOutput)> {
        let mut owned: Vec<_> = self
            .utxos
            .iter()
            .filter(|(_, out)| out.pubkey_hash == *pubkey_hash)
            .map(|(op, out)| (op.clone(), out.clone()))
            .collect();
        owned.sort_by(|a, b| a.0.cmp(&b.0));
        owned
    }

    /// Sum of all unspent values. Returns `None` on overflow.
    pub fn total_value(&self) -> Option<u64> {
        self.utxos
            .values()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }

    /// Register every output of a reward transaction.
    ///
    /// Coinbase outputs have no spendable inputs backing them and are added
    /// unconditionally. Returns the number of outputs registered.
    pub fn add_coinbase(&mut self, coinbase: &Transaction) -> Result<usize, TransactionError> {
        self.add_outputs(coinbase)
    }

    /// Register every output of `tx` under its txid.
    pub(crate) fn add_outputs(&mut self, tx: &Transaction) -> Result<usize, TransactionError> {
        let txid = tx.txid()?;
        for (index, output) in tx.outputs.iter().enumerate() {
            self.add_output(OutPoint::new(txid, index as u64), output.clone());
        }
        Ok(tx.outputs.len())
    }
}
