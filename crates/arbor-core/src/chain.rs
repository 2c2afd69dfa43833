//! Block tree with per-branch UTXO pools and height-based fork choice.
//!
//! [`BlockChain`] keeps a bounded window of recent blocks as immutable
//! [`ChainNode`]s keyed by block hash. Each node records its parent's hash
//! (not a pointer), its height, and the UTXO pool that results from applying
//! its block to the parent's pool.
//!
//! # Admission
//!
//! [`BlockChain::try_add_block`] admits a block iff:
//! 1. it names a parent hash,
//! 2. that parent is still retained,
//! 3. every one of its transactions is valid, in order, against the parent's pool,
//! 4. its height is above `best_height - cut_off_age`.
//!
//! The coinbase outputs are then added to the resulting pool and the node is
//! stored. The best node changes only when the new height is strictly greater,
//! so the first block seen at a height keeps priority.
//!
//! Resubmitting a stored block is a no-op success while its height is still
//! above the stale threshold, and a `StaleHeight` rejection once it is not.
//!
//! # Retention
//!
//! At most `cut_off_age + 1` nodes are kept (see
//! [`ChainConfig::max_nodes`]). When an admission pushes the
//! table over that limit, the node with the smallest `(height, hash)` is
//! evicted: among several nodes at minimum height, the lowest block hash goes
//! first. The best node is never evicted.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, info, trace};

use crate::config::ChainConfig;
use crate::constants::GENESIS_HEIGHT;
use crate::error::{ArborError, BlockRejection, TransactionError};
use crate::traits::{Ed25519Verifier, InputVerifier};
use crate::tx_pool::TransactionPool;
use crate::types::{Block, Hash256, Transaction};
use crate::utxo::UtxoPool;
use crate::validation::apply_transactions;

/// A block plus the ledger state it implies. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct ChainNode {
    block: Block,
    hash: Hash256,
    parent: Option<Hash256>,
    height: u64,
    utxo_pool: UtxoPool,
}

impl ChainNode {
    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn hash(&self) -> Hash256 {
        self.hash
    }

    /// Parent block hash. `None` only for genesis. The parent may have been pruned.
    pub fn parent(&self) -> Option<Hash256> {
        self.parent
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    /// Outputs spendable after this block.
    pub fn utxo_pool(&self) -> &UtxoPool {
        &self.utxo_pool
    }
}

/// Outcome of a successful [`BlockChain::try_add_block`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockAdmission {
    pub hash: Hash256,
    pub height: u64,
    /// The block became the new best node.
    pub new_best: bool,
    /// Node pruned to stay within the retention limit.
    pub evicted: Option<Hash256>,
    /// The block was already stored; nothing changed.
    pub already_known: bool,
}

/// Retained block tree, best-node pointer, and transaction staging pool.
///
/// Not thread-safe; use [`SharedChain`](crate::shared::SharedChain) when
/// several threads admit blocks.
pub struct BlockChain<V: InputVerifier = Ed25519Verifier> {
    nodes: HashMap<Hash256, Arc<ChainNode>>,
    /// Eviction order: smallest `(height, hash)` first.
    by_height: BTreeSet<(u64, Hash256)>,
    best: Arc<ChainNode>,
    tx_pool: TransactionPool,
    config: ChainConfig,
    verifier: V,
}

impl BlockChain<Ed25519Verifier> {
    /// Start a block tree from `genesis` with default parameters and Ed25519 authorization.
    pub fn new(genesis: Block) -> Result<Self, ArborError> {
        Self::with_config(genesis, ChainConfig::default(), Ed25519Verifier)
    }
}

impl<V: InputVerifier> BlockChain<V> {
    /// Start a block tree from `genesis`.
    ///
    /// Genesis is trusted: only its coinbase outputs seed the initial pool.
    /// Its parent hash and regular transactions are not consulted.
    pub fn with_config(genesis: Block, config: ChainConfig, verifier: V) -> Result<Self, ArborError> {
        config.validate()?;

        let mut utxo_pool = UtxoPool::new();
        utxo_pool.add_coinbase(&genesis.coinbase)?;

        let hash = genesis.hash();
        let node = Arc::new(ChainNode {
            block: genesis,
            hash,
            parent: None,
            height: GENESIS_HEIGHT,
            utxo_pool,
        });

        let mut nodes = HashMap::new();
        nodes.insert(hash, Arc::clone(&node));
        let mut by_height = BTreeSet::new();
        by_height.insert((GENESIS_HEIGHT, hash));

        info!(genesis = %hash.short(), cut_off_age = config.cut_off_age, "block tree initialized");

        Ok(Self {
            nodes,
            by_height,
            best: node,
            tx_pool: TransactionPool::new(),
            config,
            verifier,
        })
    }

    /// Block at the tip of the highest branch.
    pub fn max_height_block(&self) -> &Block {
        &self.best.block
    }

    /// UTXO pool after the best block.
    pub fn max_height_utxo_pool(&self) -> &UtxoPool {
        &self.best.utxo_pool
    }

    pub fn max_height(&self) -> u64 {
        self.best.height
    }

    pub fn best_node(&self) -> &Arc<ChainNode> {
        &self.best
    }

    pub fn transaction_pool(&self) -> &TransactionPool {
        &self.tx_pool
    }

    pub fn transaction_pool_mut(&mut self) -> &mut TransactionPool {
        &mut self.tx_pool
    }

    /// Stage a transaction for a future block. No validation happens here.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<Hash256, TransactionError> {
        self.tx_pool.add_transaction(tx)
    }

    /// Admit a block, reporting only whether it was accepted.
    pub fn add_block(&mut self, block: Block) -> bool {
        self.try_add_block(block).is_ok()
    }

    /// Admit a block, reporting why it was rejected.
    pub fn try_add_block(&mut self, block: Block) -> Result<BlockAdmission, BlockRejection> {
        let hash = block.hash();
        let result = self.admit(block, hash);
        if let Err(reason) = &result {
            debug!(block = %hash.short(), %reason, "block rejected");
        }
        result
    }

    fn admit(&mut self, block: Block, hash: Hash256) -> Result<BlockAdmission, BlockRejection> {
        let prev_hash = block.prev_hash().ok_or(BlockRejection::MissingParentHash)?;

        let parent = self
            .nodes
            .get(&prev_hash)
            .cloned()
            .ok_or_else(|| BlockRejection::UnknownParent(prev_hash.to_string()))?;

        let stale_below = self.best.height.saturating_sub(self.config.cut_off_age);

        if let Some(existing) = self.nodes.get(&hash) {
            if existing.height <= stale_below {
                return Err(BlockRejection::StaleHeight {
                    proposed: existing.height,
                    best: self.best.height,
                });
            }
            return Ok(BlockAdmission {
                hash,
                height: existing.height,
                new_best: false,
                evicted: None,
                already_known: true,
            });
        }

        let (accepted, mut utxo_pool) =
            apply_transactions(&parent.utxo_pool, &block.transactions, &self.verifier);
        if accepted.len() != block.transactions.len() {
            return Err(BlockRejection::InvalidTransactions {
                accepted: accepted.len(),
                proposed: block.transactions.len(),
            });
        }

        let height = parent.height + 1;
        if height <= stale_below {
            return Err(BlockRejection::StaleHeight {
                proposed: height,
                best: self.best.height,
            });
        }

        utxo_pool
            .add_coinbase(&block.coinbase)
            .map_err(BlockRejection::Coinbase)?;

        let node = Arc::new(ChainNode {
            block,
            hash,
            parent: Some(prev_hash),
            height,
            utxo_pool,
        });
        self.nodes.insert(hash, Arc::clone(&node));
        self.by_height.insert((height, hash));

        let new_best = height > self.best.height;
        if new_best {
            let reorg = self.best.hash != prev_hash;
            self.best = node;
            info!(block = %hash.short(), height, reorg, "new best block");
        } else {
            debug!(block = %hash.short(), height, best = self.best.height, "side branch extended");
        }

        let evicted = self.evict_if_full();

        Ok(BlockAdmission {
            hash,
            height,
            new_best,
            evicted,
            already_known: false,
        })
    }

    /// Drop the lowest node once the table exceeds its retention limit.
    fn evict_if_full(&mut self) -> Option<Hash256> {
        if self.nodes.len() <= self.config.max_nodes() {
            return None;
        }
        let best = self.best.hash;
        let victim = self
            .by_height
            .iter()
            .find(|(_, hash)| *hash != best)
            .copied()?;
        self.by_height.remove(&victim);
        self.nodes.remove(&victim.1);
        trace!(block = %victim.1.short(), height = victim.0, "pruned chain node");
        Some(victim.1)
    }

    pub fn node(&self, hash: &Hash256) -> Option<&Arc<ChainNode>> {
        self.nodes.get(hash)
    }

    pub fn contains_block(&self, hash: &Hash256) -> bool {
        self.nodes.contains_key(hash)
    }

    /// Number of retained nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: genesis or its descendants are always retained.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Height of the lowest retained node.
    pub fn min_height(&self) -> u64 {
        self.by_height.first().map_or(self.best.height, |(h, _)| *h)
    }

    /// Retained nodes ordered by `(height, hash)`.
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<ChainNode>> {
        self.by_height.iter().filter_map(|(_, hash)| self.nodes.get(hash))
    }

    /// Walk from `hash` towards genesis through retained nodes.
    pub fn ancestors(&self, hash: Hash256) -> impl Iterator<Item = &Arc<ChainNode>> {
        std::iter::successors(self.nodes.get(&hash), move |node| {
            node.parent.and_then(|p| self.nodes.get(&p))
        })
    }

    /// Retained hashes of the best branch, best block first.
    pub fn main_chain(&self) -> Vec<Hash256> {
        self.ancestors(self.best.hash).map(|n| n.hash).collect()
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn verifier(&self) -> &V {
        &self.verifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::COIN;
    use crate::crypto::{sign_all_inputs, KeyPair};
    use crate::traits::AcceptAllVerifier;
    use crate::error::ConfigError;
    use crate::types::{OutPoint, TxOutput};

    fn miner() -> KeyPair {
        KeyPair::from_secret_bytes([0x4D; 32])
    }

    fn pkh(seed: u8) -> Hash256 {
        Hash256([seed; 32])
    }

    fn genesis() -> Block {
        Block::new(None, Transaction::coinbase(25 * COIN, miner().pubkey_hash(), 1), vec![], 0)
            .unwrap()
    }

    /// Empty block on `parent` at `height`; `salt` separates siblings.
    fn child(parent: Hash256, height: u64, salt: u8) -> Block {
        Block::new(
            Some(parent),
            Transaction::coinbase(25 * COIN, pkh(salt), height),
            vec![],
            salt as u64,
        )
        .unwrap()
    }

    fn loose_chain() -> BlockChain<AcceptAllVerifier> {
        BlockChain::with_config(genesis(), ChainConfig::default(), AcceptAllVerifier).unwrap()
    }

    /// Extend the best tip `n` times, returning the hashes added.
    fn extend_best<V: InputVerifier>(chain: &mut BlockChain<V>, n: usize) -> Vec<Hash256> {
        let mut added = Vec::new();
        for _ in 0..n {
            let tip = chain.best_node().hash();
            let block = child(tip, chain.max_height() + 1, 0);
            added.push(block.hash());
            assert!(chain.add_block(block));
        }
        added
    }

    #[test]
    fn genesis_is_best_with_coinbase_pool() {
        let g = genesis();
        let chain = BlockChain::new(g.clone()).unwrap();
        assert_eq!(chain.max_height_block(), &g);
        assert_eq!(chain.max_height(), GENESIS_HEIGHT);
        assert_eq!(chain.len(), 1);

        let cb_txid = g.coinbase.txid().unwrap();
        let pool = chain.max_height_utxo_pool();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get_output(&OutPoint::new(cb_txid, 0)).unwrap().value, 25 * COIN);
    }

    #[test]
    fn zero_cut_off_config_rejected() {
        let cfg = ChainConfig { cut_off_age: 0, ..ChainConfig::default() };
        assert!(BlockChain::with_config(genesis(), cfg, AcceptAllVerifier).is_err());
    }

    #[test]
    fn narrow_retention_config_rejected() {
        let cfg = ChainConfig { retention_limit: Some(4), ..ChainConfig::default() };
        assert!(matches!(
            BlockChain::with_config(genesis(), cfg, AcceptAllVerifier),
            Err(ArborError::Config(ConfigError::RetentionBelowWindow { limit: 4, required: 11 }))
        ));
    }

    #[test]
    fn valid_extension_becomes_best() {
        let g = genesis();
        let mut chain = BlockChain::new(g.clone()).unwrap();
        let spent = OutPoint::new(g.coinbase.txid().unwrap(), 0);

        let mut pay = Transaction::new(
            vec![spent.clone()],
            vec![TxOutput { value: 20 * COIN, pubkey_hash: pkh(0xBB) }],
        );
        sign_all_inputs(&mut pay, &miner()).unwrap();
        let pay_txid = pay.txid().unwrap();
        let cb = Transaction::coinbase(25 * COIN, pkh(0xCC), 2);
        let cb_txid = cb.txid().unwrap();
        let block = Block::new(Some(g.hash()), cb, vec![pay], 1).unwrap();

        let admission = chain.try_add_block(block.clone()).unwrap();
        assert!(admission.new_best);
        assert_eq!(admission.height, 2);
        assert_eq!(chain.max_height_block(), &block);

        let pool = chain.max_height_utxo_pool();
        assert!(!pool.contains(&spent));
        assert!(pool.contains(&OutPoint::new(pay_txid, 0)));
        assert!(pool.contains(&OutPoint::new(cb_txid, 0)));
        assert_eq!(pool.len(), 2);

        // Parent state is untouched.
        assert!(chain.node(&g.hash()).unwrap().utxo_pool().contains(&spent));
    }

    #[test]
    fn missing_parent_hash_rejected() {
        let mut chain = loose_chain();
        let orphan = Block::new(None, Transaction::coinbase(1, pkh(1), 2), vec![], 5).unwrap();
        assert_eq!(chain.try_add_block(orphan), Err(BlockRejection::MissingParentHash));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn unknown_parent_rejected() {
        let mut chain = loose_chain();
        let block = child(pkh(0xEE), 2, 1);
        assert!(matches!(
            chain.try_add_block(block),
            Err(BlockRejection::UnknownParent(_))
        ));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn invalid_transaction_rejects_whole_block() {
        let g = genesis();
        let mut chain = BlockChain::new(g.clone()).unwrap();
        let spent = OutPoint::new(g.coinbase.txid().unwrap(), 0);

        let mut good = Transaction::new(
            vec![spent],
            vec![TxOutput { value: COIN, pubkey_hash: pkh(2) }],
        );
        sign_all_inputs(&mut good, &miner()).unwrap();
        let bogus = Transaction::new(
            vec![OutPoint::new(pkh(0x99), 0)],
            vec![TxOutput { value: 1, pubkey_hash: pkh(2) }],
        );
        let block = Block::new(
            Some(g.hash()),
            Transaction::coinbase(25 * COIN, pkh(3), 2),
            vec![good, bogus],
            1,
        )
        .unwrap();

        assert_eq!(
            chain.try_add_block(block),
            Err(BlockRejection::InvalidTransactions { accepted: 1, proposed: 2 })
        );
        assert_eq!(chain.max_height(), 1);
        assert_eq!(chain.max_height_utxo_pool().len(), 1);
    }

    #[test]
    fn double_spend_across_transactions_rejected() {
        let g = genesis();
        let mut chain = BlockChain::new(g.clone()).unwrap();
        let before = chain.max_height_utxo_pool().clone();
        let spent = OutPoint::new(g.coinbase.txid().unwrap(), 0);

        let mut a = Transaction::new(
            vec![spent.clone()],
            vec![TxOutput { value: COIN, pubkey_hash: pkh(2) }],
        );
        let mut b = Transaction::new(
            vec![spent],
            vec![TxOutput { value: 2 * COIN, pubkey_hash: pkh(3) }],
        );
        sign_all_inputs(&mut a, &miner()).unwrap();
        sign_all_inputs(&mut b, &miner()).unwrap();
        let block = Block::new(Some(g.hash()), Transaction::coinbase(1, pkh(4), 2), vec![a, b], 1)
            .unwrap();

        assert!(!chain.add_block(block));
        assert_eq!(chain.max_height_utxo_pool(), &before);
    }

    #[test]
    fn first_seen_keeps_priority_at_equal_height() {
        let mut chain = loose_chain();
        let g = chain.best_node().hash();
        let first = child(g, 2, 1);
        let second = child(g, 2, 2);

        assert!(chain.try_add_block(first.clone()).unwrap().new_best);
        let admission = chain.try_add_block(second.clone()).unwrap();
        assert!(!admission.new_best);
        assert_eq!(chain.max_height_block(), &first);
        assert!(chain.contains_block(&second.hash()));

        // The side branch overtakes once it is strictly higher.
        let third = child(second.hash(), 3, 3);
        assert!(chain.try_add_block(third.clone()).unwrap().new_best);
        assert_eq!(chain.max_height_block(), &third);
    }

    #[test]
    fn branches_keep_isolated_pools() {
        let mut chain = loose_chain();
        let g = chain.best_node().hash();
        let left = child(g, 2, 1);
        let right = child(g, 2, 2);
        let left_cb = OutPoint::new(left.coinbase.txid().unwrap(), 0);
        chain.add_block(left.clone());
        chain.add_block(right.clone());

        assert!(chain.node(&left.hash()).unwrap().utxo_pool().contains(&left_cb));
        assert!(!chain.node(&right.hash()).unwrap().utxo_pool().contains(&left_cb));
    }

    /// Retention window wide enough to keep parents that are past the cut-off.
    fn wide_chain(cut_off_age: u64) -> BlockChain<AcceptAllVerifier> {
        let cfg = ChainConfig {
            cut_off_age,
            retention_limit: Some(64),
            ..ChainConfig::default()
        };
        BlockChain::with_config(genesis(), cfg, AcceptAllVerifier).unwrap()
    }

    #[test]
    fn stale_height_rejected_at_cut_off() {
        let mut chain = wide_chain(10);
        let g = chain.best_node().hash();
        let hashes = extend_best(&mut chain, 11);
        assert_eq!(chain.max_height(), 12);
        let len = chain.len();

        // Parent at height 1 proposes height 2 <= 12 - 10.
        assert_eq!(
            chain.try_add_block(child(g, 2, 9)),
            Err(BlockRejection::StaleHeight { proposed: 2, best: 12 })
        );
        assert_eq!(chain.len(), len);

        // Parent at height 2 proposes height 3 > 12 - 10.
        assert!(chain.add_block(child(hashes[0], 3, 8)));
    }

    #[test]
    fn resubmitted_block_past_cut_off_is_stale() {
        let mut chain = wide_chain(10);
        let g = chain.best_node().hash();
        extend_best(&mut chain, 1);
        let early = child(g, 2, 9);
        assert!(chain.add_block(early.clone()));
        assert_ne!(chain.best_node().hash(), early.hash());
        extend_best(&mut chain, 10);
        assert_eq!(chain.max_height(), 12);
        assert!(chain.contains_block(&early.hash()));
        let len = chain.len();

        assert_eq!(
            chain.try_add_block(early.clone()),
            Err(BlockRejection::StaleHeight { proposed: 2, best: 12 })
        );
        assert!(!chain.add_block(early));
        assert_eq!(chain.len(), len);
    }

    #[test]
    fn stale_check_uses_configured_cut_off() {
        let mut chain = wide_chain(2);
        let g = chain.best_node().hash();
        let hashes = extend_best(&mut chain, 3); // best height 4

        assert_eq!(
            chain.try_add_block(child(g, 2, 5)),
            Err(BlockRejection::StaleHeight { proposed: 2, best: 4 })
        );
        assert!(chain.add_block(child(hashes[0], 3, 6)));
    }

    #[test]
    fn default_window_prunes_before_blocks_go_stale() {
        let mut chain = loose_chain();
        let g = chain.best_node().hash();
        extend_best(&mut chain, 10); // best height 11, 11 nodes

        // Still above the cut-off, so the fork is admitted and genesis is pruned.
        let admission = chain.try_add_block(child(g, 2, 7)).unwrap();
        assert_eq!(admission.evicted, Some(g));
    }

    #[test]
    fn retention_never_exceeds_limit() {
        let mut chain = loose_chain();
        for _ in 0..30 {
            extend_best(&mut chain, 1);
            assert!(chain.len() <= chain.config().max_nodes());
        }
        assert_eq!(chain.len(), 11);
        assert_eq!(chain.min_height(), chain.max_height() - 10);
        assert_eq!(chain.main_chain().len(), 11);
    }

    #[test]
    fn eviction_takes_lowest_hash_among_min_height() {
        let cfg = ChainConfig { cut_off_age: 3, ..ChainConfig::default() };
        let mut chain = BlockChain::with_config(genesis(), cfg, AcceptAllVerifier).unwrap();
        let g = chain.best_node().hash();
        let a = child(g, 2, 1);
        let b = child(g, 2, 2);
        let c = child(g, 2, 3);
        for block in [&a, &b, &c] {
            assert!(chain.add_block(block.clone()));
        }
        assert_eq!(chain.len(), 4);

        // Fifth node pushes genesis (height 1) out.
        let admission = chain.try_add_block(child(a.hash(), 3, 4)).unwrap();
        assert_eq!(admission.evicted, Some(g));

        // Next eviction picks the lowest hash among the three height-2 siblings.
        let mut siblings = vec![a.hash(), b.hash(), c.hash()];
        siblings.sort();
        let admission = chain.try_add_block(child(a.hash(), 3, 5)).unwrap();
        assert_eq!(admission.evicted, Some(siblings[0]));
        assert!(!chain.contains_block(&siblings[0]));
    }

    #[test]
    fn pruned_parent_rejects_children() {
        let mut chain = loose_chain();
        let g = chain.best_node().hash();
        extend_best(&mut chain, 11);
        assert!(!chain.contains_block(&g));
        assert!(matches!(
            chain.try_add_block(child(g, 2, 9)),
            Err(BlockRejection::UnknownParent(_))
        ));
    }

    #[test]
    fn resubmitted_block_is_a_noop() {
        let mut chain = loose_chain();
        let g = chain.best_node().hash();
        let block = child(g, 2, 1);
        chain.add_block(block.clone());
        let before = chain.len();

        let admission = chain.try_add_block(block).unwrap();
        assert!(admission.already_known);
        assert!(!admission.new_best);
        assert_eq!(chain.len(), before);
    }

    #[test]
    fn best_node_is_never_evicted() {
        let mut chain = loose_chain();
        extend_best(&mut chain, 25);
        let best = chain.best_node().hash();
        assert!(chain.contains_block(&best));
        assert_eq!(chain.main_chain()[0], best);
    }

    #[test]
    fn add_transaction_stages_without_validation() {
        let mut chain = loose_chain();
        let tx = Transaction::new(
            vec![OutPoint::new(pkh(0x77), 0)],
            vec![TxOutput { value: 1, pubkey_hash: pkh(1) }],
        );
        let txid = chain.add_transaction(tx).unwrap();
        assert!(chain.transaction_pool().contains(&txid));
    }
}
