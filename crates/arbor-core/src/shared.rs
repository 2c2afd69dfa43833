//! Thread-safe handle over a [`BlockChain`].
//!
//! Block admission holds one exclusive lock across every admission step, so
//! concurrent submitters are linearized. Incoming transactions go to a
//! separate staging pool with its own lock and are moved into the chain's
//! pool by [`SharedChain::drain_pool_into_chain`].
//!
//! Lock order is staging pool, then chain. No method takes them the other way.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::chain::{BlockAdmission, BlockChain, ChainNode};
use crate::error::{BlockRejection, TransactionError};
use crate::producer::BlockProducer;
use crate::traits::{Ed25519Verifier, InputVerifier};
use crate::tx_pool::TransactionPool;
use crate::types::{Block, Hash256, Transaction};
use crate::utxo::UtxoPool;

/// Cloneable handle; every clone refers to the same block tree.
pub struct SharedChain<V: InputVerifier = Ed25519Verifier> {
    chain: Arc<Mutex<BlockChain<V>>>,
    staging: Arc<Mutex<TransactionPool>>,
}

impl<V: InputVerifier> Clone for SharedChain<V> {
    fn clone(&self) -> Self {
        Self {
            chain: Arc::clone(&self.chain),
            staging: Arc::clone(&self.staging),
        }
    }
}

impl<V: InputVerifier> SharedChain<V> {
    pub fn new(chain: BlockChain<V>) -> Self {
        Self {
            chain: Arc::new(Mutex::new(chain)),
            staging: Arc::new(Mutex::new(TransactionPool::new())),
        }
    }

    pub fn add_block(&self, block: Block) -> bool {
        self.chain.lock().add_block(block)
    }

    pub fn try_add_block(&self, block: Block) -> Result<BlockAdmission, BlockRejection> {
        self.chain.lock().try_add_block(block)
    }

    pub fn max_height_block(&self) -> Block {
        self.chain.lock().max_height_block().clone()
    }

    pub fn max_height_utxo_pool(&self) -> UtxoPool {
        self.chain.lock().max_height_utxo_pool().clone()
    }

    pub fn max_height(&self) -> u64 {
        self.chain.lock().max_height()
    }

    /// The best node as of the call. Stays valid after later admissions prune it.
    pub fn best_node(&self) -> Arc<ChainNode> {
        Arc::clone(self.chain.lock().best_node())
    }

    /// Stage a transaction without touching the chain lock.
    pub fn stage_transaction(&self, tx: Transaction) -> Result<Hash256, TransactionError> {
        self.staging.lock().add_transaction(tx)
    }

    pub fn staged_len(&self) -> usize {
        self.staging.lock().len()
    }

    /// Move every staged transaction into the chain's pool. Returns how many moved.
    pub fn drain_pool_into_chain(&self) -> usize {
        let mut staging = self.staging.lock();
        let mut chain = self.chain.lock();
        Self::drain_locked(&mut staging, &mut chain)
    }

    /// Drain the staging pool, then assemble and submit a block, atomically.
    pub fn produce_block(&self, producer: &BlockProducer, timestamp: u64) -> Option<Block> {
        let mut staging = self.staging.lock();
        let mut chain = self.chain.lock();
        Self::drain_locked(&mut staging, &mut chain);
        drop(staging);
        producer.create_block(&mut chain, timestamp)
    }

    /// Run `f` with exclusive access to the block tree.
    pub fn with_chain<R>(&self, f: impl FnOnce(&mut BlockChain<V>) -> R) -> R {
        f(&mut self.chain.lock())
    }

    fn drain_locked(staging: &mut TransactionPool, chain: &mut BlockChain<V>) -> usize {
        let staged = staging.transactions();
        let mut moved = 0;
        for tx in staged {
            // txids were computed on the way in, so this cannot fail here.
            if chain.add_transaction(tx).is_ok() {
                moved += 1;
            }
        }
        *staging = TransactionPool::new();
        if moved > 0 {
            debug!(moved, "staged transactions moved to chain pool");
        }
        moved
    }
}
