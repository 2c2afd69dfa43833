//! Ledger types: transactions, blocks, outpoints.
//!
//! All monetary values are in base units (1 ARB = 10^8 units).
//! All numeric fields use u64.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::constants::PROTOCOL_VERSION;
use crate::error::TransactionError;
use crate::merkle;

/// A 32-byte hash value.
///
/// Used for transaction IDs (BLAKE3), block hashes (double SHA-256),
/// owner credentials and merkle roots (BLAKE3).
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash (32 zero bytes). Used for coinbase previous outpoints.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// First eight hex characters, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Identifies a spendable output: the creating transaction plus output index.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
pub struct OutPoint {
    /// Transaction ID containing the referenced output.
    pub txid: Hash256,
    /// Index of the output within the transaction.
    pub index: u64,
}

impl OutPoint {
    pub fn new(txid: Hash256, index: u64) -> Self {
        Self { txid, index }
    }

    /// The null outpoint, used for coinbase transaction inputs.
    pub fn null() -> Self {
        Self {
            txid: Hash256::ZERO,
            index: u64::MAX,
        }
    }

    /// Check if this is the null outpoint (coinbase marker).
    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.index == u64::MAX
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// A transaction input, spending a previous output.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxInput {
    /// The outpoint being spent. Null outpoint for coinbase.
    pub previous_output: OutPoint,
    /// Ed25519 signature (64 bytes). Height marker for coinbase inputs.
    pub signature: Vec<u8>,
    /// Ed25519 public key (32 bytes). Empty for coinbase inputs.
    pub public_key: Vec<u8>,
}

impl TxInput {
    /// An unsigned input spending `previous_output`.
    pub fn unsigned(previous_output: OutPoint) -> Self {
        Self {
            previous_output,
            signature: Vec::new(),
            public_key: Vec::new(),
        }
    }
}

/// A transaction output, creating a new UTXO.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxOutput {
    /// Value in base units.
    pub value: u64,
    /// BLAKE3 hash of the owner's Ed25519 public key.
    pub pubkey_hash: Hash256,
}

/// A transaction transferring value between owners.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    /// Protocol version.
    pub version: u64,
    /// Inputs consuming previous outputs.
    pub inputs: Vec<TxInput>,
    /// New outputs created by this transaction.
    pub outputs: Vec<TxOutput>,
    /// Free-form ordering field. Coinbases carry their block height here.
    pub lock_time: u64,
}

impl Transaction {
    /// An unsigned transaction spending `inputs` into `outputs`.
    pub fn new(inputs: Vec<OutPoint>, outputs: Vec<TxOutput>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            inputs: inputs.into_iter().map(TxInput::unsigned).collect(),
            outputs,
            lock_time: 0,
        }
    }

    /// Build a reward transaction paying `value` to `pubkey_hash`.
    ///
    /// The height is committed in both the input data and `lock_time`, so
    /// coinbases at different heights always have distinct txids.
    pub fn coinbase(value: u64, pubkey_hash: Hash256, height: u64) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            inputs: vec![TxInput {
                previous_output: OutPoint::null(),
                signature: height.to_le_bytes().to_vec(),
                public_key: vec![],
            }],
            outputs: vec![TxOutput { value, pubkey_hash }],
            lock_time: height,
        }
    }

    /// Compute the transaction ID (BLAKE3 hash of the canonical encoding).
    ///
    /// Uses bincode with standard config for deterministic serialization.
    pub fn txid(&self) -> Result<Hash256, TransactionError> {
        let encoded = bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| TransactionError::Serialization(e.to_string()))?;
        Ok(Hash256(blake3::hash(&encoded).into()))
    }

    /// Check if this is a coinbase transaction (single input with null outpoint).
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    /// Sum of all output values. Returns None on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }
}

/// Block header linking a block to its parent.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct BlockHeader {
    /// Protocol version.
    pub version: u64,
    /// Hash of the parent block. `None` only for genesis.
    pub prev_hash: Option<Hash256>,
    /// BLAKE3 merkle root over the coinbase and block transactions.
    pub merkle_root: Hash256,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Producer-chosen nonce, lets otherwise identical blocks differ.
    pub nonce: u64,
}

impl BlockHeader {
    /// Header size in bytes when serialized for hashing
    /// (3 u64 fields + presence byte + 2 * 32-byte hashes).
    const HASH_SIZE: usize = 3 * 8 + 1 + 2 * 32;

    /// Compute the block header hash (double SHA-256).
    ///
    /// Fixed byte layout: version || has_parent || prev_hash || merkle_root ||
    /// timestamp || nonce, all little-endian. A missing parent hashes as a
    /// zero presence byte followed by 32 zero bytes.
    pub fn hash(&self) -> Hash256 {
        let mut data = Vec::with_capacity(Self::HASH_SIZE);
        data.extend_from_slice(&self.version.to_le_bytes());
        match &self.prev_hash {
            Some(prev) => {
                data.push(1);
                data.extend_from_slice(prev.as_bytes());
            }
            None => {
                data.push(0);
                data.extend_from_slice(Hash256::ZERO.as_bytes());
            }
        }
        data.extend_from_slice(self.merkle_root.as_bytes());
        data.extend_from_slice(&self.timestamp.to_le_bytes());
        data.extend_from_slice(&self.nonce.to_le_bytes());
        let first = Sha256::digest(&data);
        Hash256(Sha256::digest(first).into())
    }
}

/// A complete block: header, reward transaction, and ordered transactions.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Block {
    pub header: BlockHeader,
    /// Reward transaction. Its outputs are added without spend validation.
    pub coinbase: Transaction,
    /// Ordered list of regular transactions.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Assemble a block, committing to the coinbase and transactions in the
    /// header's merkle root.
    pub fn new(
        prev_hash: Option<Hash256>,
        coinbase: Transaction,
        transactions: Vec<Transaction>,
        timestamp: u64,
    ) -> Result<Self, TransactionError> {
        let mut txids = Vec::with_capacity(transactions.len() + 1);
        txids.push(coinbase.txid()?);
        for tx in &transactions {
            txids.push(tx.txid()?);
        }
        Ok(Self {
            header: BlockHeader {
                version: PROTOCOL_VERSION,
                prev_hash,
                merkle_root: merkle::merkle_root(&txids),
                timestamp,
                nonce: 0,
            },
            coinbase,
            transactions,
        })
    }

    /// Block identity, the header hash.
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    /// Claimed parent block, if any.
    pub fn prev_hash(&self) -> Option<Hash256> {
        self.header.prev_hash
    }
}
