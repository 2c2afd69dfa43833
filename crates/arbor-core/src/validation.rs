//! Transaction validation and application against a UTXO pool.
//!
//! [`TxHandler`] owns a working pool. [`TxHandler::is_valid_tx`] checks one
//! transaction against the pool as it currently stands, and
//! [`TxHandler::handle_txs`] walks a batch in order, applying each valid
//! transaction before checking the next. Transactions that fail leave the
//! working pool untouched.
//!
//! A transaction is valid iff:
//! - every input references an output present in the working pool
//! - no outpoint is spent twice within the transaction
//! - every input is authorized for the owner of the output it spends
//! - total input value covers total output value (the difference is a fee)
//!
//! Output values are unsigned, so they are never negative. Sums are checked
//! and overflow makes the transaction invalid.

use std::collections::HashSet;

use tracing::trace;

use crate::error::TransactionError;
use crate::traits::InputVerifier;
use crate::types::{OutPoint, Transaction};
use crate::utxo::UtxoPool;

/// Summary of a successfully validated transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTransaction {
    /// Total value of all spent inputs.
    pub total_input: u64,
    /// Total value of all created outputs.
    pub total_output: u64,
    /// Implicit fee (`total_input - total_output`).
    pub fee: u64,
}

/// Validates and applies transactions against a working UTXO pool.
pub struct TxHandler<'v, V: InputVerifier> {
    pool: UtxoPool,
    verifier: &'v V,
}

impl<'v, V: InputVerifier> TxHandler<'v, V> {
    /// Take ownership of a working pool. Callers clone the base pool first.
    pub fn new(pool: UtxoPool, verifier: &'v V) -> Self {
        Self { pool, verifier }
    }

    /// The working pool, reflecting every transaction applied so far.
    pub fn pool(&self) -> &UtxoPool {
        &self.pool
    }

    pub fn into_pool(self) -> UtxoPool {
        self.pool
    }

    /// Check one transaction against the current working pool.
    pub fn is_valid_tx(&self, tx: &Transaction) -> Result<ValidatedTransaction, TransactionError> {
        let mut seen = HashSet::with_capacity(tx.inputs.len());
        let mut total_input: u64 = 0;

        for (i, input) in tx.inputs.iter().enumerate() {
            if input.previous_output.is_null() {
                return Err(TransactionError::NullOutpointInRegularTx(i));
            }

            let utxo = self.pool.get_output(&input.previous_output).ok_or_else(|| {
                TransactionError::UnknownUtxo(input.previous_output.to_string())
            })?;

            if !seen.insert(&input.previous_output) {
                return Err(TransactionError::DuplicateInput(
                    input.previous_output.to_string(),
                ));
            }

            self.verifier
                .verify_input(tx, i, &utxo.pubkey_hash)
                .map_err(|_| TransactionError::InvalidSignature { index: i })?;

            total_input = total_input
                .checked_add(utxo.value)
                .ok_or(TransactionError::ValueOverflow)?;
        }

        let total_output = tx
            .total_output_value()
            .ok_or(TransactionError::ValueOverflow)?;

        if total_input < total_output {
            return Err(TransactionError::InsufficientFunds {
                have: total_input,
                need: total_output,
            });
        }

        Ok(ValidatedTransaction {
            total_input,
            total_output,
            fee: total_input - total_output,
        })
    }

    /// Spend a transaction's inputs and register its outputs.
    ///
    /// Does not validate; call [`is_valid_tx`](Self::is_valid_tx) first.
    pub fn apply(&mut self, tx: &Transaction) -> Result<(), TransactionError> {
        // Compute the txid before touching the pool so a failure leaves no trace.
        let txid = tx.txid()?;
        for input in &tx.inputs {
            self.pool.remove_output(&input.previous_output);
        }
        for (index, output) in tx.outputs.iter().enumerate() {
            self.pool.add_output(OutPoint::new(txid, index as u64), output.clone());
        }
        Ok(())
    }

    /// Validate and apply a batch in order, returning the accepted subsequence.
    ///
    /// Each transaction is judged against the pool as left by the ones
    /// accepted before it, so a later transaction may spend an earlier one's
    /// outputs but not the reverse, and the first of two conflicting spends wins.
    pub fn handle_txs(&mut self, txs: &[Transaction]) -> Vec<Transaction> {
        let mut accepted = Vec::with_capacity(txs.len());
        for (position, tx) in txs.iter().enumerate() {
            let outcome = self.is_valid_tx(tx).and_then(|_| self.apply(tx));
            match outcome {
                Ok(()) => accepted.push(tx.clone()),
                Err(e) => trace!(position, error = %e, "transaction rejected"),
            }
        }
        accepted
    }
}

/// Apply `txs` to a copy of `base`, returning the accepted transactions and
/// the resulting pool. `base` is left untouched.
pub fn apply_transactions<V: InputVerifier>(
    base: &UtxoPool,
    txs: &[Transaction],
    verifier: &V,
) -> (Vec<Transaction>, UtxoPool) {
    let mut handler = TxHandler::new(base.clone(), verifier);
    let accepted = handler.handle_txs(txs);
    (accepted, handler.into_pool())
}
