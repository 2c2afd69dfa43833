//! Error types for Arbor.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("unknown or spent UTXO: {0}")] UnknownUtxo(String),
    #[error("insufficient funds: have {have}, need {need}")] InsufficientFunds { have: u64, need: u64 },
    #[error("invalid signature on input {index}")] InvalidSignature { index: usize },
    #[error("duplicate input: {0}")] DuplicateInput(String),
    #[error("value overflow")] ValueOverflow,
    #[error("serialization: {0}")] Serialization(String),
    #[error("null outpoint in non-coinbase input {0}")] NullOutpointInRegularTx(usize),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature verification failed")] VerificationFailed,
    #[error("pubkey hash does not match expected")] PubkeyHashMismatch,
    #[error("input index out of bounds: {index} >= {len}")] InputIndexOutOfBounds { index: usize, len: usize },
}

/// Reason a block was not admitted to the block tree.
///
/// [`BlockChain::add_block`](crate::chain::BlockChain::add_block) collapses
/// every variant into `false`; [`try_add_block`](crate::chain::BlockChain::try_add_block)
/// reports which one applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockRejection {
    #[error("block has no parent hash")] MissingParentHash,
    #[error("unknown or pruned parent: {0}")] UnknownParent(String),
    #[error("only {accepted} of {proposed} transactions are valid")] InvalidTransactions { accepted: usize, proposed: usize },
    #[error("stale height {proposed}: best height is {best}")] StaleHeight { proposed: u64, best: u64 },
    #[error("coinbase: {0}")] Coinbase(TransactionError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cut_off_age must be at least 1")] ZeroCutOffAge,
    #[error("cut_off_age {0} too large")] CutOffAgeTooLarge(u64),
    #[error("retention_limit {limit} below the {required} nodes cut_off_age needs")] RetentionBelowWindow { limit: usize, required: usize },
}

#[derive(Error, Debug)]
pub enum ArborError {
    #[error(transparent)] Transaction(#[from] TransactionError),
    #[error(transparent)] Config(#[from] ConfigError),
}
