//! Block assembly from the staged transaction pool.
//!
//! [`BlockProducer`] builds a block on the current best node: it filters the
//! staged transactions through the validator against the best node's pool,
//! adds a coinbase paying the producer, and submits the result to the block
//! tree. Included transactions leave the pool only once the block is accepted.

use tracing::{debug, info};

use crate::chain::BlockChain;
use crate::error::TransactionError;
use crate::traits::InputVerifier;
use crate::types::{Block, Hash256, Transaction};
use crate::validation::apply_transactions;

/// Assembles and submits blocks paying rewards to one owner.
#[derive(Debug, Clone)]
pub struct BlockProducer {
    reward_to: Hash256,
}

impl BlockProducer {
    pub fn new(reward_to: Hash256) -> Self {
        Self { reward_to }
    }

    pub fn reward_to(&self) -> Hash256 {
        self.reward_to
    }

    /// Build a block on the best node without submitting it.
    ///
    /// Staged transactions that are invalid against the best pool, or that
    /// conflict with an earlier staged transaction, are left out.
    pub fn assemble<V: InputVerifier>(
        &self,
        chain: &BlockChain<V>,
        timestamp: u64,
    ) -> Result<Block, TransactionError> {
        let parent = chain.best_node();
        let staged = chain.transaction_pool().transactions();
        let (included, _) = apply_transactions(parent.utxo_pool(), &staged, chain.verifier());
        debug!(
            staged = staged.len(),
            included = included.len(),
            height = parent.height() + 1,
            "assembled block"
        );

        let coinbase = Transaction::coinbase(
            chain.config().coinbase_reward,
            self.reward_to,
            parent.height() + 1,
        );
        Block::new(Some(parent.hash()), coinbase, included, timestamp)
    }

    /// Assemble a block on the best node and submit it.
    ///
    /// Returns the block if it was accepted. Its transactions are then removed
    /// from the staging pool.
    pub fn create_block<V: InputVerifier>(
        &self,
        chain: &mut BlockChain<V>,
        timestamp: u64,
    ) -> Option<Block> {
        let block = self.assemble(chain, timestamp).ok()?;
        if !chain.add_block(block.clone()) {
            return None;
        }
        let removed = chain.transaction_pool_mut().remove_confirmed(&block);
        info!(block = %block.hash().short(), txs = removed, "produced block");
        Some(block)
    }

    /// Forward a block received from elsewhere.
    pub fn process_block<V: InputVerifier>(chain: &mut BlockChain<V>, block: Block) -> bool {
        chain.add_block(block)
    }

    /// Forward a transaction received from elsewhere to the staging pool.
    pub fn process_tx<V: InputVerifier>(
        chain: &mut BlockChain<V>,
        tx: Transaction,
    ) -> Result<Hash256, TransactionError> {
        chain.add_transaction(tx)
    }
}
