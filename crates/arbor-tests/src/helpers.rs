//! Shared test helpers for the integration suites.

use arbor_core::chain::BlockChain;
use arbor_core::config::ChainConfig;
use arbor_core::constants::COIN;
use arbor_core::crypto::{sign_all_inputs, KeyPair};
use arbor_core::traits::AcceptAllVerifier;
use arbor_core::types::{Block, Hash256, OutPoint, Transaction, TxOutput};

/// Simple pubkey hash from a seed byte.
pub fn pkh(seed: u8) -> Hash256 {
    Hash256([seed; 32])
}

/// Deterministic keypair from a seed byte.
pub fn keypair(seed: u8) -> KeyPair {
    KeyPair::from_secret_bytes([seed; 32])
}

/// Genesis block paying 25 COIN to `owner`.
pub fn genesis_to(owner: Hash256) -> Block {
    Block::new(None, Transaction::coinbase(25 * COIN, owner, 1), vec![], 0).unwrap()
}

/// Child of `parent` at `height`. `tag` picks the coinbase owner, so siblings
/// with different tags have different hashes.
pub fn child(parent: Hash256, height: u64, tag: u8, txs: Vec<Transaction>) -> Block {
    Block::new(
        Some(parent),
        Transaction::coinbase(COIN, pkh(tag), height),
        txs,
        height,
    )
    .unwrap()
}

/// Block tree that skips signature checks, with the given cut-off and retention.
pub fn unsigned_chain(
    genesis: Block,
    cut_off_age: u64,
    retention_limit: Option<usize>,
) -> BlockChain<AcceptAllVerifier> {
    let config = ChainConfig { cut_off_age, retention_limit, ..ChainConfig::default() };
    BlockChain::with_config(genesis, config, AcceptAllVerifier).unwrap()
}

/// Unsigned spend of `inputs` into `(value, owner)` outputs.
pub fn spend(inputs: Vec<OutPoint>, outputs: Vec<(u64, Hash256)>) -> Transaction {
    Transaction::new(
        inputs,
        outputs
            .into_iter()
            .map(|(value, pubkey_hash)| TxOutput { value, pubkey_hash })
            .collect(),
    )
}

/// Spend signed by `kp` for every input.
pub fn signed_spend(kp: &KeyPair, inputs: Vec<OutPoint>, outputs: Vec<(u64, Hash256)>) -> Transaction {
    let mut tx = spend(inputs, outputs);
    sign_all_inputs(&mut tx, kp).unwrap();
    tx
}

/// Outpoint of output `index` of `tx`.
pub fn outpoint(tx: &Transaction, index: u64) -> OutPoint {
    OutPoint::new(tx.txid().unwrap(), index)
}
